//! # Tiergate Gateway
//!
//! HTTP front end for Tiergate tiered storage.
//!
//! This crate provides:
//! - **Verb routing**: GET fetches, PUT/POST stores, DELETE deletes, HEAD checks existence
//! - **Listing**: `GET /?prefix=` returns the union of keys as JSON
//! - **Error mapping**: Cascade outcomes to status codes with a plain-text body
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP Clients                      │
//! │                  (curl, browsers)                   │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────┐
//! │                  Tiergate Gateway                   │
//! ├─────────────────────────────────────────────────────┤
//! │  Request ID │ Access Log │ CORS │ Body Limit        │
//! ├─────────────────────────────────────────────────────┤
//! │                    Handlers                         │
//! ├─────────────────────────────────────────────────────┤
//! │                  tiergate-core                      │
//! │            (Gateway cascade, registry)              │
//! ├─────────────────────────────────────────────────────┤
//! │                 tiergate-store                      │
//! │              (Disk, B2, S3, Memory)                 │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::GatewayConfig;
pub use error::{ApiError, ErrorCode, ERROR_CODE_HEADER};
pub use handlers::TIER_HEADER;
pub use middleware::REQUEST_ID_HEADER;
pub use server::{run_server, run_server_with_shutdown};
pub use state::AppState;
