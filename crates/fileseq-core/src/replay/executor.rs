//! Replay execution.
//!
//! Delivers a sequence's items through the transport in ascending position
//! order and records per-item failures.

use crate::error::DatabaseError;
use crate::replay::report::{DeliveryFailure, ReplayReport};
use crate::storage::{Database, FailureMode, Item};
use crate::transport::Transport;

/// Drains a sequence's items into a transport.
pub struct ReplayExecutor<'a> {
    db: &'a Database,
    transport: &'a dyn Transport,
    failure_mode: FailureMode,
}

impl<'a> ReplayExecutor<'a> {
    pub fn new(db: &'a Database, transport: &'a dyn Transport) -> Self {
        Self {
            db,
            transport,
            failure_mode: FailureMode::BestEffort,
        }
    }

    pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }

    /// Replay every stored item of `sequence_id` into `chat_ref`.
    ///
    /// # Errors
    /// Only storage failures while reading the item list are returned;
    /// delivery failures are recorded in the report.
    pub fn replay(&self, sequence_id: i64, chat_ref: &str) -> Result<ReplayReport, DatabaseError> {
        let items = self.db.list_items_ordered(sequence_id)?;
        Ok(self.deliver_all(sequence_id, &items, chat_ref))
    }

    /// Deliver `items`, which must already be in position order.
    pub fn deliver_all(&self, sequence_id: i64, items: &[Item], chat_ref: &str) -> ReplayReport {
        let mut report = ReplayReport::new(sequence_id);
        tracing::info!(
            replay_id = %report.replay_id,
            sequence_id,
            items = items.len(),
            "replay started"
        );

        for (index, item) in items.iter().enumerate() {
            match self.transport.send_media(
                chat_ref,
                item.kind,
                &item.payload_ref,
                item.caption.as_deref(),
            ) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        replay_id = %report.replay_id,
                        sequence_id,
                        position = item.position,
                        error = %e,
                        "delivery failed"
                    );
                    report.failures.push(DeliveryFailure {
                        position: item.position,
                        kind: item.kind,
                        payload_ref: item.payload_ref.clone(),
                        reason: e.to_string(),
                    });
                    if self.failure_mode == FailureMode::StopOnFailure {
                        report.skipped = items.len() - index - 1;
                        break;
                    }
                }
            }
        }

        tracing::info!(
            replay_id = %report.replay_id,
            sequence_id,
            delivered = report.delivered,
            failed = report.failure_count(),
            skipped = report.skipped,
            "replay finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::OutboundCommand;
    use crate::sequence::MediaKind;
    use crate::transport::RecordingTransport;

    fn seeded(payloads: &[(&str, MediaKind)]) -> (Database, i64) {
        let db = Database::open_memory().unwrap();
        let user = db.resolve_or_create_user("u").unwrap();
        let seq = db.open_sequence(user).unwrap();
        for (payload, kind) in payloads {
            db.append_item(seq, *kind, payload, None).unwrap();
        }
        (db, seq)
    }

    fn payloads(transport: &RecordingTransport) -> Vec<String> {
        transport
            .sent_media()
            .into_iter()
            .filter_map(|c| match c {
                OutboundCommand::SendMedia { payload_ref, .. } => Some(payload_ref),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn replays_in_position_order() {
        let (db, seq) = seeded(&[
            ("A", MediaKind::Document),
            ("B", MediaKind::Video),
            ("C", MediaKind::Document),
        ]);
        let transport = RecordingTransport::new();
        let report = ReplayExecutor::new(&db, &transport).replay(seq, "chat").unwrap();
        assert_eq!(report.delivered, 3);
        assert!(report.fully_delivered());
        assert_eq!(payloads(&transport), vec!["A", "B", "C"]);
    }

    #[test]
    fn best_effort_continues_after_failure() {
        let (db, seq) = seeded(&[
            ("A", MediaKind::Document),
            ("B", MediaKind::Video),
            ("C", MediaKind::Audio),
        ]);
        let transport = RecordingTransport::new();
        transport.fail_payload("B");
        let report = ReplayExecutor::new(&db, &transport).replay(seq, "chat").unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].position, 2);
        assert_eq!(payloads(&transport), vec!["A", "C"]);
    }

    #[test]
    fn stop_on_failure_skips_the_rest() {
        let (db, seq) = seeded(&[
            ("A", MediaKind::Document),
            ("B", MediaKind::Video),
            ("C", MediaKind::Audio),
        ]);
        let transport = RecordingTransport::new();
        transport.fail_payload("B");
        let report = ReplayExecutor::new(&db, &transport)
            .with_failure_mode(FailureMode::StopOnFailure)
            .replay(seq, "chat")
            .unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(payloads(&transport), vec!["A"]);
    }

    #[test]
    fn empty_sequence_sends_nothing() {
        let (db, seq) = seeded(&[]);
        let transport = RecordingTransport::new();
        let report = ReplayExecutor::new(&db, &transport).replay(seq, "chat").unwrap();
        assert_eq!(report.total(), 0);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn replay_does_not_touch_items() {
        let (db, seq) = seeded(&[("A", MediaKind::Photo)]);
        let transport = RecordingTransport::new();
        let executor = ReplayExecutor::new(&db, &transport);
        executor.replay(seq, "chat").unwrap();
        executor.replay(seq, "chat").unwrap();
        assert_eq!(db.count_items(seq).unwrap(), 1);
        assert_eq!(payloads(&transport), vec!["A", "A"]);
    }
}
