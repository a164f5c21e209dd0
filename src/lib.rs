//! Screener Policy
//!
//! Tooling for the trading policy file: derives bearish screener URLs from
//! the bullish ones each sector carries, and verifies the policy's
//! integrity hash.

pub mod config;
pub mod derive;
pub mod filters;
pub mod policy;
pub mod signature;
pub mod types;

pub use config::{TransformConfig, Variant};
pub use policy::PolicyDocument;
pub use types::*;
