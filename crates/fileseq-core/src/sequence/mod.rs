//! Per-user sequence lifecycle.
//!
//! ## State Transitions
//!
//! ```text
//! NoOpenSequence --start--> SequenceOpen --submit_item--> SequenceOpen
//! SequenceOpen --end (close, replay)--> NoOpenSequence
//! ```
//!
//! The state is never cached: it is whatever `find_open_sequence` returns.

pub mod kind;
pub mod manager;

pub use kind::MediaKind;
pub use manager::{Outcome, SequenceManager};
