//! Service-level handlers (key listing)

use crate::{ApiError, AppState};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Only keys starting with this string; absent lists everything
    pub prefix: Option<String>,
}

/// GET /?prefix=p - Union of keys across every listing tier
pub async fn list_keys(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<String>>, ApiError> {
    let prefix = params.prefix.unwrap_or_default();
    let keys = state.gateway.list(prefix.trim_start_matches('/')).await?;
    Ok(Json(keys))
}
