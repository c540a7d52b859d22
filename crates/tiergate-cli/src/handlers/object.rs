//! Per-key handlers: fetch, store, delete and exists

use crate::{ApiError, AppState, ErrorCode};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use md5::{Digest, Md5};
use std::sync::Arc;
use tiergate_core::StoreOutcome;
use tiergate_store::TierKey;

/// Header naming the tier that served or stored an object
pub const TIER_HEADER: &str = "x-tiergate-tier";

fn parse_key(raw: &str) -> Result<TierKey, ApiError> {
    Ok(TierKey::parse(raw)?)
}

fn with_tier_header(mut response: Response, tier: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(tier) {
        response.headers_mut().insert(TIER_HEADER, value);
    }
    response
}

/// Compare an optional `Content-MD5` header against the received body
pub fn verify_content_md5(headers: &HeaderMap, body: &[u8]) -> Result<(), ApiError> {
    let Some(md5_header) = headers.get("Content-MD5") else {
        return Ok(());
    };

    let expected = md5_header
        .to_str()
        .ok()
        .and_then(|v| general_purpose::STANDARD.decode(v.trim()).ok())
        .filter(|bytes| bytes.len() == 16)
        .ok_or_else(|| ApiError::new(ErrorCode::InvalidDigest, "Invalid Content-MD5"))?;

    let actual = hex::encode(Md5::digest(body));
    if actual != hex::encode(expected) {
        return Err(ApiError::new(
            ErrorCode::InvalidDigest,
            "The Content-MD5 you specified did not match what we received",
        ));
    }
    Ok(())
}

/// GET /{key} - Stream the object from the first tier holding it
pub async fn fetch_object(
    State(state): State<Arc<AppState>>,
    Path(raw_key): Path<String>,
) -> Result<Response, ApiError> {
    let key = parse_key(&raw_key)?;
    let fetched = state.gateway.fetch(&key).await?;

    let content_type = mime_guess::from_path(key.as_str()).first_or_octet_stream();
    let response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type.to_string())],
        Body::from_stream(fetched.body),
    )
        .into_response();

    Ok(with_tier_header(response, &fetched.tier))
}

/// PUT|POST /{key} - Store the body on the first writable tier
pub async fn store_object(
    State(state): State<Arc<AppState>>,
    Path(raw_key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let key = parse_key(&raw_key)?;
    verify_content_md5(&headers, &body)?;

    let response = match state.gateway.store(&key, body).await? {
        StoreOutcome::Stored { tier } => with_tier_header(StatusCode::OK.into_response(), &tier),
        StoreOutcome::NoWritableTier => StatusCode::OK.into_response(),
    };
    Ok(response)
}

/// DELETE /{key} - Remove the key according to the cascade semantics
pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    Path(raw_key): Path<String>,
) -> Result<Response, ApiError> {
    let key = parse_key(&raw_key)?;
    state.gateway.delete(&key).await?;
    Ok(StatusCode::OK.into_response())
}

/// HEAD /{key} - 200 when present, 404 when absent
pub async fn object_exists(
    State(state): State<Arc<AppState>>,
    Path(raw_key): Path<String>,
) -> Result<Response, ApiError> {
    let key = parse_key(&raw_key)?;
    if state.gateway.exists(&key).await? {
        Ok(StatusCode::OK.into_response())
    } else {
        Err(ApiError::new(
            ErrorCode::NoSuchKey,
            format!("key not found: {}", key),
        ))
    }
}

/// Per-key verbs addressed at the root path
pub async fn empty_key() -> ApiError {
    ApiError::new(ErrorCode::InvalidKey, "A key is required")
}

/// Any method the gateway does not route
pub async fn method_not_allowed() -> ApiError {
    ApiError::new(ErrorCode::MethodNotAllowed, "Method not allowed")
}
