//! Metrics for the strongbox credential vault.
//!
//! Only the `metrics` crate facade is used here. Nothing is recorded until the
//! host process installs a recorder, so library callers pay nothing by default.
//!
//! ```rust,ignore
//! use strongbox_metrics::{counter, vault};
//!
//! counter!(vault::DECRYPT_REQUESTS_TOTAL).increment(1);
//! ```

mod definitions;

pub use definitions::*;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
