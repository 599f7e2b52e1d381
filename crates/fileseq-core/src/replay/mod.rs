//! Ordered re-delivery of a sequence's stored items.
//!
//! Replay only reads item rows, so it can be re-run against a completed
//! sequence after a crash; the cost of a retry is duplicate delivery.

pub mod executor;
pub mod report;

pub use executor::ReplayExecutor;
pub use report::{DeliveryFailure, ReplayReport};
