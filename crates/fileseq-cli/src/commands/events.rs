//! Line-oriented event loop: one JSON `InboundEvent` per stdin line.
//!
//! Outbound commands (replies and replayed media) are written to stdout by
//! the stdout transport. Malformed lines are reported on stderr and skipped.

use std::io::BufRead;

use fileseq_core::InboundEvent;

use super::Context;

pub fn run(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let mgr = ctx.manager()?;
    let stdin = std::io::stdin();

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<InboundEvent>(&line) {
            Ok(event) => {
                let outcome = mgr.dispatch(&event);
                tracing::debug!(line = index + 1, ?outcome, "event applied");
            }
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "skipping malformed event");
                eprintln!("line {}: invalid event: {e}", index + 1);
            }
        }
    }
    Ok(())
}
