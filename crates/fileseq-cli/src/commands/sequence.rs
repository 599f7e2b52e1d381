//! Sequence lifecycle commands for CLI.

use clap::Subcommand;
use serde_json::json;

use super::Context;

#[derive(Subcommand)]
pub enum SequenceAction {
    /// Open a sequence for a user
    Open {
        /// External user ID
        user: String,
    },
    /// Append a media item to the user's open sequence
    Add {
        /// External user ID
        user: String,
        /// Media kind: document, video, audio, voice or photo
        kind: String,
        /// Transport payload reference
        payload_ref: String,
        #[arg(long)]
        caption: Option<String>,
    },
    /// Close the user's open sequence and replay its items
    End {
        /// External user ID
        user: String,
        /// Chat to replay into (default: the user ID)
        #[arg(long)]
        chat: Option<String>,
    },
    /// Replay a completed sequence again
    Replay {
        /// Sequence ID
        sequence_id: i64,
        /// Chat to replay into
        #[arg(long)]
        chat: String,
    },
    /// List a user's sequences, newest first
    List {
        /// External user ID
        user: String,
    },
    /// List the items of a sequence in replay order
    Items {
        /// Sequence ID
        sequence_id: i64,
    },
}

pub fn run(ctx: &Context, action: SequenceAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SequenceAction::Open { user } => {
            let mgr = ctx.manager()?;
            let sequence_id = mgr.start(&user)?;
            println!("{}", json!({ "sequence_id": sequence_id }));
        }
        SequenceAction::Add {
            user,
            kind,
            payload_ref,
            caption,
        } => {
            let mgr = ctx.manager()?;
            let position = mgr.submit_item(&user, &kind, &payload_ref, caption.as_deref())?;
            println!("{}", json!({ "position": position }));
        }
        SequenceAction::End { user, chat } => {
            let mgr = ctx.manager()?;
            let chat = chat.unwrap_or_else(|| user.clone());
            let report = mgr.end(&user, &chat)?;
            println!("{}", serde_json::to_string(&report)?);
        }
        SequenceAction::Replay { sequence_id, chat } => {
            let mgr = ctx.manager()?;
            let report = mgr.replay_again(sequence_id, &chat)?;
            println!("{}", serde_json::to_string(&report)?);
        }
        SequenceAction::List { user } => {
            let config = ctx.load_config()?;
            let db = ctx.open_db(&config)?;
            let sequences = match db.find_user(&user)? {
                Some(user_id) => db.list_sequences(user_id)?,
                None => Vec::new(),
            };
            println!("{}", serde_json::to_string_pretty(&sequences)?);
        }
        SequenceAction::Items { sequence_id } => {
            let config = ctx.load_config()?;
            let db = ctx.open_db(&config)?;
            let items = db.list_items_ordered(sequence_id)?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
    }
    Ok(())
}
