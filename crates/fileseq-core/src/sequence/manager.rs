//! Sequence state machine.
//!
//! [`SequenceManager`] validates each inbound action against the user's
//! current state in storage, persists it, and orchestrates close + replay.
//! [`SequenceManager::handle`] is the boundary where every domain error
//! becomes an [`Outcome`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::kind::MediaKind;
use crate::error::{DatabaseError, SequenceError};
use crate::events::{Command, InboundEvent};
use crate::replay::{ReplayExecutor, ReplayReport};
use crate::storage::{
    Config, Database, ItemRetention, MessagesConfig, ReplayConfig, SequenceStatus,
};
use crate::transport::Transport;

/// Caller-facing result of one inbound event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Welcome,
    Started { sequence_id: i64 },
    AlreadyOpen { sequence_id: Option<i64> },
    ItemAdded { position: i64 },
    Completed { report: ReplayReport },
    NoOpenSequence,
    UnsupportedKind { kind: String },
    UnknownCommand { name: String },
    Failed { message: String },
}

impl Outcome {
    /// Reply text for the chat the event came from.
    pub fn reply_text(&self, messages: &MessagesConfig) -> String {
        match self {
            Outcome::Welcome => messages.welcome.clone(),
            Outcome::Started { .. } => messages.started.clone(),
            Outcome::AlreadyOpen { .. } => messages.already_open.clone(),
            Outcome::ItemAdded { position } => messages.item_added(*position),
            Outcome::Completed { report } if report.failure_count() > 0 => {
                messages.completed_with_failures(report.failure_count())
            }
            Outcome::Completed { .. } => messages.completed.clone(),
            Outcome::NoOpenSequence => messages.no_open_sequence.clone(),
            Outcome::UnsupportedKind { kind } => messages.unsupported_kind(kind),
            Outcome::UnknownCommand { .. } => messages.unknown_command.clone(),
            Outcome::Failed { .. } => messages.failure.clone(),
        }
    }
}

impl From<SequenceError> for Outcome {
    fn from(err: SequenceError) -> Self {
        match err {
            SequenceError::Conflict { sequence_id } => Outcome::AlreadyOpen { sequence_id },
            SequenceError::NoOpenSequence => Outcome::NoOpenSequence,
            SequenceError::UnsupportedKind(kind) => Outcome::UnsupportedKind { kind },
            other => Outcome::Failed {
                message: other.to_string(),
            },
        }
    }
}

/// Drives the per-user sequence lifecycle.
///
/// Holds no per-user state; any number of managers may share one database.
pub struct SequenceManager {
    db: Arc<Database>,
    transport: Arc<dyn Transport>,
    replay: ReplayConfig,
    messages: MessagesConfig,
}

impl SequenceManager {
    pub fn new(db: Arc<Database>, transport: Arc<dyn Transport>) -> Self {
        Self {
            db,
            transport,
            replay: ReplayConfig::default(),
            messages: MessagesConfig::default(),
        }
    }

    /// Take replay policies and reply texts from `config`.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.replay = config.replay;
        self.messages = config.messages.clone();
        self
    }

    pub fn with_replay_config(mut self, replay: ReplayConfig) -> Self {
        self.replay = replay;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Open a sequence for `external_id`.
    ///
    /// # Errors
    /// [`SequenceError::Conflict`] if one is already open, including when a
    /// concurrent `start` won the race.
    pub fn start(&self, external_id: &str) -> Result<i64, SequenceError> {
        let user_id = self.db.resolve_or_create_user(external_id)?;
        if let Some(sequence_id) = self.db.find_open_sequence(user_id)? {
            tracing::debug!(user_id, sequence_id, "start ignored, sequence already open");
            return Err(SequenceError::Conflict {
                sequence_id: Some(sequence_id),
            });
        }
        match self.db.open_sequence(user_id) {
            Ok(sequence_id) => Ok(sequence_id),
            Err(DatabaseError::Conflict { .. }) => {
                tracing::warn!(user_id, "lost race opening sequence");
                Err(SequenceError::Conflict {
                    sequence_id: self.db.find_open_sequence(user_id)?,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Store one item in the user's open sequence and return its position.
    ///
    /// # Errors
    /// [`SequenceError::NoOpenSequence`] when nothing is open (or the
    /// sequence closed while this call was in flight);
    /// [`SequenceError::UnsupportedKind`] for kinds outside [`MediaKind`].
    pub fn submit_item(
        &self,
        external_id: &str,
        kind: &str,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<i64, SequenceError> {
        let user_id = self.db.resolve_or_create_user(external_id)?;
        let sequence_id = self
            .db
            .find_open_sequence(user_id)?
            .ok_or(SequenceError::NoOpenSequence)?;
        let kind: MediaKind = kind.parse()?;

        self.db
            .append_item(sequence_id, kind, payload_ref, caption)
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => SequenceError::NoOpenSequence,
                other => other.into(),
            })
    }

    /// Close the user's open sequence and replay its items into `chat_ref`.
    ///
    /// The sequence is closed before replay so no late item can slip in
    /// behind the replayed list. It stays `completed` whatever the
    /// delivery outcome.
    pub fn end(&self, external_id: &str, chat_ref: &str) -> Result<ReplayReport, SequenceError> {
        let user_id = self.db.resolve_or_create_user(external_id)?;
        let sequence_id = self
            .db
            .find_open_sequence(user_id)?
            .ok_or(SequenceError::NoOpenSequence)?;

        self.db.close_sequence(sequence_id).map_err(|e| match e {
            DatabaseError::NotFound { .. } => SequenceError::NoOpenSequence,
            other => other.into(),
        })?;

        self.replay_closed(sequence_id, chat_ref)
    }

    /// Replay a completed sequence again, e.g. after a crash mid-replay.
    pub fn replay_again(
        &self,
        sequence_id: i64,
        chat_ref: &str,
    ) -> Result<ReplayReport, SequenceError> {
        let sequence = self
            .db
            .get_sequence(sequence_id)?
            .ok_or(SequenceError::NotFound(sequence_id))?;
        if sequence.status == SequenceStatus::Open {
            return Err(SequenceError::StillOpen(sequence_id));
        }
        self.replay_closed(sequence_id, chat_ref)
    }

    fn replay_closed(
        &self,
        sequence_id: i64,
        chat_ref: &str,
    ) -> Result<ReplayReport, SequenceError> {
        let report = ReplayExecutor::new(&self.db, self.transport.as_ref())
            .with_failure_mode(self.replay.failure_mode)
            .replay(sequence_id, chat_ref)?;

        if self.replay.item_retention == ItemRetention::PurgeAfterReplay {
            if report.fully_delivered() {
                // Delivery already happened; a failed purge only leaves rows behind.
                if let Err(e) = self.db.purge_items(sequence_id) {
                    tracing::error!(sequence_id, error = %e, "purge after replay failed");
                }
            } else {
                tracing::warn!(
                    sequence_id,
                    failed = report.failure_count(),
                    "items retained after incomplete replay"
                );
            }
        }
        Ok(report)
    }

    /// Apply one inbound event. Never fails: errors become outcomes.
    pub fn handle(&self, event: &InboundEvent) -> Outcome {
        let result = match event {
            InboundEvent::UserMessage {
                external_user_id,
                chat_ref,
                command,
            } => match command {
                Command::Start => Ok(Outcome::Welcome),
                Command::StartSequence => self
                    .start(external_user_id)
                    .map(|sequence_id| Outcome::Started { sequence_id }),
                Command::EndSequence => self
                    .end(external_user_id, chat_ref)
                    .map(|report| Outcome::Completed { report }),
                Command::Unknown(name) => Ok(Outcome::UnknownCommand { name: name.clone() }),
                // Plain text counts as an item attempt of an unsupported kind.
                Command::None => self
                    .submit_item(external_user_id, "text", "", None)
                    .map(|position| Outcome::ItemAdded { position }),
            },
            InboundEvent::MediaMessage {
                external_user_id,
                kind,
                payload_ref,
                caption,
                ..
            } => self
                .submit_item(external_user_id, kind, payload_ref, caption.as_deref())
                .map(|position| Outcome::ItemAdded { position }),
        };

        result.unwrap_or_else(|e| {
            match &e {
                SequenceError::Storage(inner) => tracing::error!(error = %inner, "storage failure"),
                other => tracing::debug!(error = %other, "event rejected"),
            }
            Outcome::from(e)
        })
    }

    /// Handle `event` and send the reply text to its chat.
    ///
    /// A failed reply is logged; the outcome is returned either way.
    pub fn dispatch(&self, event: &InboundEvent) -> Outcome {
        let outcome = self.handle(event);
        let text = outcome.reply_text(&self.messages);
        if let Err(e) = self.transport.send_text(event.chat_ref(), &text) {
            tracing::warn!(chat_ref = event.chat_ref(), error = %e, "reply not delivered");
        }
        outcome
    }
}
