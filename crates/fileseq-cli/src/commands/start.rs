//! `fileseq start`: the `/start` greeting, routed like an inbound message.

use fileseq_core::{Command, InboundEvent, Outcome};

use super::Context;

pub fn run(
    ctx: &Context,
    user: String,
    chat: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mgr = ctx.manager()?;
    let chat_ref = chat.unwrap_or_else(|| user.clone());
    let event = InboundEvent::UserMessage {
        external_user_id: user,
        chat_ref,
        command: Command::Start,
    };
    match mgr.dispatch(&event) {
        Outcome::Welcome => Ok(()),
        other => Err(format!("unexpected outcome: {other:?}").into()),
    }
}
