//! # Tiergate Core
//!
//! Routing engine for the Tiergate storage gateway.
//!
//! This crate provides:
//! - **Tier configuration**: The JSON tier list and its legacy aliases
//! - **Tier registry**: The ordered, immutable set of constructed tiers
//! - **Gateway**: The cascade protocol deciding which tiers each verb touches
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            HTTP Front End               │
//! ├─────────────────────────────────────────┤
//! │     Gateway (cascade per verb)          │
//! ├─────────────────────────────────────────┤
//! │  TierRegistry  [t0, t1, ... tn-1]       │
//! ├─────────────────────────────────────────┤
//! │        StorageTier adapters             │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Cascade rules
//!
//! | Verb   | Tiers consulted                      | Outcome                          |
//! |--------|--------------------------------------|----------------------------------|
//! | fetch  | in order until one opens the key     | first hit, else last tier error  |
//! | store  | first writable tier only             | that tier's result, or no-op     |
//! | exists | see [`CascadeSemantics`]             | last tier decides, or OR         |
//! | delete | see [`CascadeSemantics`]             | first failure, or all attempted  |
//! | list   | every tier that supports listing     | sorted union                     |

pub mod config;
pub mod error;
pub mod gateway;
pub mod registry;

pub use config::{load_tier_configs, parse_tier_configs, TierConfig, TierMode};
pub use error::{CascadeError, CoreError, Result};
pub use gateway::{CascadeResult, CascadeSemantics, Fetched, Gateway, StoreOutcome, Verb};
pub use registry::{TierDescriptor, TierRegistry};
