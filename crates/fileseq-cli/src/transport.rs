//! Transport that writes each outbound command to stdout as one JSON line.

use std::io::Write;

use fileseq_core::{DeliveryError, MediaKind, OutboundCommand, Transport};

pub struct StdoutTransport;

impl StdoutTransport {
    fn emit(&self, command: &OutboundCommand) -> Result<(), DeliveryError> {
        let line = serde_json::to_string(command)
            .map_err(|e| DeliveryError::Rejected(e.to_string()))?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}").map_err(|e| DeliveryError::Unavailable(e.to_string()))
    }

    fn emit_media(
        &self,
        chat_ref: &str,
        kind: MediaKind,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.emit(&OutboundCommand::SendMedia {
            chat_ref: chat_ref.to_string(),
            kind,
            payload_ref: payload_ref.to_string(),
            caption: caption.map(str::to_string),
        })
    }
}

impl Transport for StdoutTransport {
    fn send_text(&self, chat_ref: &str, text: &str) -> Result<(), DeliveryError> {
        self.emit(&OutboundCommand::SendText {
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
        self.emit_media(chat_ref, MediaKind::Document, payload_ref, caption)
    }

    fn send_video(
        &self,
        chat_ref: &str,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.emit_media(chat_ref, MediaKind::Video, payload_ref, caption)
    }

    fn send_audio(
        &self,
        chat_ref: &str,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.emit_media(chat_ref, MediaKind::Audio, payload_ref, caption)
    }

    fn send_voice(
        &self,
        chat_ref: &str,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.emit_media(chat_ref, MediaKind::Voice, payload_ref, caption)
    }

    fn send_photo(
        &self,
        chat_ref: &str,
        payload_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.emit_media(chat_ref, MediaKind::Photo, payload_ref, caption)
    }
}
