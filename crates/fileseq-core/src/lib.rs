//! # fileseq Core Library
//!
//! Per-user file sequencing: a user opens a sequence, submits media items,
//! and on closing the sequence the stored items are replayed to the user in
//! exactly the order they were submitted.
//!
//! ## Architecture
//!
//! - **Storage**: SQLite database owning users, sequences and ordered items,
//!   with atomic position assignment and a single-open-sequence guard
//! - **Sequence Manager**: state machine derived entirely from storage
//! - **Replay**: ordered, partial-failure-tolerant re-delivery
//! - **Transport**: trait implemented by the surrounding chat adapter
//!
//! ## Key Components
//!
//! - [`Database`]: Storage engine
//! - [`SequenceManager`]: Lifecycle state machine and event boundary
//! - [`ReplayExecutor`]: Ordered delivery of stored items
//! - [`Transport`]: Outbound delivery seam
//! - [`Config`]: Service configuration

pub mod error;
pub mod events;
pub mod replay;
pub mod sequence;
pub mod storage;
pub mod transport;

pub use error::{ConfigError, CoreError, DatabaseError, DeliveryError, SequenceError};
pub use events::{Command, InboundEvent, OutboundCommand};
pub use replay::{DeliveryFailure, ReplayExecutor, ReplayReport};
pub use sequence::{MediaKind, Outcome, SequenceManager};
pub use storage::{Config, Database, FailureMode, ItemRetention, ReplayConfig};
pub use transport::{RecordingTransport, Transport};
