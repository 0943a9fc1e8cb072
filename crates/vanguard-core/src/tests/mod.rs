//! Cross-module scenario tests.
//!
//! - `determinism.rs`: same seed and inputs give identical broadcasts, and
//!   every replica converges on the authority's mirror
//! - `integration.rs`: end-to-end authority/replica scenarios
//! - `helpers.rs`: session setup and factory functions

mod helpers;

pub use helpers::*;
