//! Replay outcome reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sequence::MediaKind;

/// A delivery the transport refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    pub position: i64,
    pub kind: MediaKind,
    pub payload_ref: String,
    /// Human-readable reason from the transport
    pub reason: String,
}

/// Result of one replay run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Correlates log lines of one run
    pub replay_id: Uuid,
    pub sequence_id: i64,
    pub executed_at: DateTime<Utc>,
    /// Items delivered successfully
    pub delivered: usize,
    pub failures: Vec<DeliveryFailure>,
    /// Items never attempted because replay stopped early
    pub skipped: usize,
}

impl ReplayReport {
    pub fn new(sequence_id: i64) -> Self {
        Self {
            replay_id: Uuid::new_v4(),
            sequence_id,
            executed_at: Utc::now(),
            delivered: 0,
            failures: Vec::new(),
            skipped: 0,
        }
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Total items the sequence held at replay time.
    pub fn total(&self) -> usize {
        self.delivered + self.failures.len() + self.skipped
    }

    /// True when every stored item reached the transport.
    pub fn fully_delivered(&self) -> bool {
        self.failures.is_empty() && self.skipped == 0
    }
}
