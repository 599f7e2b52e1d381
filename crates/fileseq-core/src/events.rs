//! Inbound events from the chat adapter and the outbound commands sent back.

use serde::{Deserialize, Serialize};

use crate::sequence::MediaKind;

/// Command carried by a plain user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum Command {
    Start,
    StartSequence,
    EndSequence,
    /// Slash command the service does not know.
    Unknown(String),
    None,
}

impl Command {
    /// Parse the leading token of a message text.
    ///
    /// `/ssequence` and `/esequence` are accepted alongside the long forms.
    /// A `@botname` suffix on the command is ignored.
    pub fn parse(text: &str) -> Self {
        let Some(token) = text.split_whitespace().next() else {
            return Command::None;
        };
        let Some(name) = token.strip_prefix('/') else {
            return Command::None;
        };
        let name = name.split('@').next().unwrap_or(name);
        match name {
            "start" => Command::Start,
            "ssequence" | "startsequence" => Command::StartSequence,
            "esequence" | "endsequence" => Command::EndSequence,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Every inbound event the transport adapter delivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEvent {
    UserMessage {
        external_user_id: String,
        chat_ref: String,
        command: Command,
    },
    /// `kind` stays a raw string so unsupported kinds reach the manager.
    MediaMessage {
        external_user_id: String,
        chat_ref: String,
        kind: String,
        payload_ref: String,
        #[serde(default)]
        caption: Option<String>,
    },
}

impl InboundEvent {
    pub fn chat_ref(&self) -> &str {
        match self {
            InboundEvent::UserMessage { chat_ref, .. }
            | InboundEvent::MediaMessage { chat_ref, .. } => chat_ref,
        }
    }
}

/// Commands handed back to the transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundCommand {
    SendText {
        chat_ref: String,
        text: String,
    },
    SendMedia {
        chat_ref: String,
        kind: MediaKind,
        payload_ref: String,
        caption: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(Command::parse("/start"), Command::Start);
        assert_eq!(Command::parse("/ssequence"), Command::StartSequence);
        assert_eq!(Command::parse("/esequence now"), Command::EndSequence);
        assert_eq!(Command::parse("/ssequence@SeqBot"), Command::StartSequence);
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(Command::parse("hello"), Command::None);
        assert_eq!(Command::parse("   "), Command::None);
    }

    #[test]
    fn unknown_slash_command_is_kept() {
        assert_eq!(Command::parse("/help"), Command::Unknown("help".into()));
    }

    #[test]
    fn media_event_deserializes_without_caption() {
        let json = concat!(
            r#"{"type":"MediaMessage","external_user_id":"42","chat_ref":"c1","#,
            r#""kind":"video","payload_ref":"AbC"}"#,
        );
        let event: InboundEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.chat_ref(), "c1");
        assert!(matches!(event, InboundEvent::MediaMessage { caption: None, .. }));
    }
}
