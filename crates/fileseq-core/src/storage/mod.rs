mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, FailureMode, ItemRetention, MessagesConfig, ReplayConfig, StorageConfig};
pub use database::{Database, Item, Sequence, SequenceStatus};

use std::path::PathBuf;

/// Returns `~/.config/fileseq[-dev]/` based on FILESEQ_ENV.
///
/// Set FILESEQ_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FILESEQ_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("fileseq-dev")
    } else {
        base_dir.join("fileseq")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
