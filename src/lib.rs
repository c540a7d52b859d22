//! # Tiergate
//!
//! One HTTP storage interface over an ordered list of storage tiers.
//!
//! - [`store`]: the `StorageTier` trait and the disk, B2, S3 and memory tiers
//! - [`routing`]: tier configuration, the registry and the cascade gateway
//! - [`server`]: the axum front end behind the `tiergate` binary

pub use tiergate_cli as server;
pub use tiergate_core as routing;
pub use tiergate_store as store;
