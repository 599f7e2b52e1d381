//! Seam to the external messaging transport.
//!
//! The core never talks to a chat service directly. It hands each outbound
//! command to a [`Transport`], which the surrounding adapter implements.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::DeliveryError;
use crate::events::OutboundCommand;
use crate::sequence::MediaKind;

/// Every messaging transport implements this trait.
/// Implementations are shared across threads, so methods take `&self`.
pub trait Transport: Send + Sync {
    fn send_text(&self, chat_ref: &str, text: &str) -> Result<(), DeliveryError>;

    fn send_document(
        &self,
        chat_ref: &str,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError>;

    fn send_video(
        &self,
        chat_ref: &str,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError>;

    fn send_audio(
        &self,
        chat_ref: &str,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError>;

    fn send_voice(
        &self,
        chat_ref: &str,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError>;

    fn send_photo(
        &self,
        chat_ref: &str,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError>;

    /// Deliver one media item through the call registered for its kind.
    fn send_media(
        &self,
        chat_ref: &str,
        kind: MediaKind,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        delivery_fn::<Self>(kind)(self, chat_ref, payload_ref, caption)
    }
}

/// Per-kind delivery function.
pub type DeliveryFn<T> = fn(&T, &str, &str, Option<&str>) -> Result<(), DeliveryError>;

/// Dispatch table from media kind to the transport call that delivers it.
pub fn delivery_fn<T: Transport + ?Sized>(kind: MediaKind) -> DeliveryFn<T> {
    match kind {
        MediaKind::Document => T::send_document,
        MediaKind::Video => T::send_video,
        MediaKind::Audio => T::send_audio,
        MediaKind::Voice => T::send_voice,
        MediaKind::Photo => T::send_photo,
    }
}

/// In-memory transport that records every successful send.
///
/// Payload refs registered with [`RecordingTransport::fail_payload`] are
/// rejected instead of recorded.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutboundCommand>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery of `payload_ref` fail.
    pub fn fail_payload(&self, payload_ref: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(payload_ref.to_string());
        }
    }

    /// Snapshot of the commands delivered so far, in delivery order.
    pub fn sent(&self) -> Vec<OutboundCommand> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Only the media commands, in delivery order.
    pub fn sent_media(&self) -> Vec<OutboundCommand> {
        self.sent()
            .into_iter()
            .filter(|c| matches!(c, OutboundCommand::SendMedia { .. }))
            .collect()
    }

    fn record(&self, command: OutboundCommand) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .map_err(|_| DeliveryError::Unavailable("recorder poisoned".into()))?
            .push(command);
        Ok(())
    }

    fn record_media(
        &self,
        chat_ref: &str,
        kind: MediaKind,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        let rejected = self
            .failing
            .lock()
            .map(|f| f.contains(payload_ref))
            .unwrap_or(false);
        if rejected {
            return Err(DeliveryError::Rejected(payload_ref.to_string()));
        }
        self.record(OutboundCommand::SendMedia {
            chat_ref: chat_ref.to_string(),
            kind,
            payload_ref: payload_ref.to_string(),
            caption: caption.map(str::to_string),
        })
    }
}

impl Transport for RecordingTransport {
    fn send_text(&self, chat_ref: &str, text: &str) -> Result<(), DeliveryError> {
        self.record(OutboundCommand::SendText {
            chat_ref: chat_ref.to_string(),
            text: text.to_string(),
        })
    }

    fn send_document(
        &self,
        chat_ref: &str,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.record_media(chat_ref, MediaKind::Document, payload_ref, caption)
    }

    fn send_video(
        &self,
        chat_ref: &str,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.record_media(chat_ref, MediaKind::Video, payload_ref, caption)
    }

    fn send_audio(
        &self,
        chat_ref: &str,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.record_media(chat_ref, MediaKind::Audio, payload_ref, caption)
    }

    fn send_voice(
        &self,
        chat_ref: &str,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.record_media(chat_ref, MediaKind::Voice, payload_ref, caption)
    }

    fn send_photo(
        &self,
        chat_ref: &str,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.record_media(chat_ref, MediaKind::Photo, payload_ref, caption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_routes_each_kind_to_its_call() {
        let transport = RecordingTransport::new();
        for kind in MediaKind::ALL {
            transport.send_media("chat", kind, kind.as_str(), None).unwrap();
        }
        let kinds: Vec<MediaKind> = transport
            .sent_media()
            .into_iter()
            .map(|c| match c {
                OutboundCommand::SendMedia { kind, .. } => kind,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(kinds, MediaKind::ALL.to_vec());
    }

    #[test]
    fn trait_object_dispatch_matches_table() {
        let transport = RecordingTransport::new();
        let shared: &dyn Transport = &transport;
        shared.send_media("chat", MediaKind::Voice, "v", None).unwrap();
        delivery_fn::<dyn Transport>(MediaKind::Audio)(shared, "chat", "a", None).unwrap();
        let kinds: Vec<MediaKind> = transport
            .sent_media()
            .into_iter()
            .filter_map(|c| match c {
                OutboundCommand::SendMedia { kind, .. } => Some(kind),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![MediaKind::Voice, MediaKind::Audio]);
    }

    #[test]
    fn failing_payload_is_not_recorded() {
        let transport = RecordingTransport::new();
        transport.fail_payload("bad");
        let err = transport
            .send_media("chat", MediaKind::Photo, "bad", None)
            .unwrap_err();
        assert_eq!(err, DeliveryError::Rejected("bad".into()));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn caption_is_carried() {
        let transport = RecordingTransport::new();
        transport
            .send_media("c", MediaKind::Document, "A", Some("page 1"))
            .unwrap();
        assert_eq!(
            transport.sent(),
            vec![OutboundCommand::SendMedia {
                chat_ref: "c".into(),
                kind: MediaKind::Document,
                payload_ref: "A".into(),
                caption: Some("page 1".into()),
            }]
        );
    }
}
