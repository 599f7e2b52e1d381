//! TOML-based service configuration.
//!
//! Holds:
//! - Storage location and lock timeout
//! - Replay policies (item retention, failure handling)
//! - Reply texts sent back to the chat
//!
//! Configuration is stored at `~/.config/fileseq/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;

/// What happens to item rows once a sequence has been replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemRetention {
    /// Keep items as an audit trail.
    #[default]
    Retain,
    /// Delete items after a replay in which every item was delivered.
    PurgeAfterReplay,
}

/// How replay reacts to a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Record the failure and keep delivering later items.
    #[default]
    BestEffort,
    /// Stop at the first failure; later items are reported as skipped.
    StopOnFailure,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file. Defaults to `fileseq.db` in the data directory.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Replay configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReplayConfig {
    #[serde(default)]
    pub item_retention: ItemRetention,
    #[serde(default)]
    pub failure_mode: FailureMode,
}

/// Reply texts. `{position}`, `{kind}` and `{failed}` are substituted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    #[serde(default = "default_welcome")]
    pub welcome: String,
    #[serde(default = "default_started")]
    pub started: String,
    #[serde(default = "default_already_open")]
    pub already_open: String,
    #[serde(default = "default_item_added")]
    pub item_added: String,
    #[serde(default = "default_no_open_sequence")]
    pub no_open_sequence: String,
    #[serde(default = "default_unsupported_kind")]
    pub unsupported_kind: String,
    #[serde(default = "default_completed")]
    pub completed: String,
    #[serde(default = "default_completed_with_failures")]
    pub completed_with_failures: String,
    #[serde(default = "default_unknown_command")]
    pub unknown_command: String,
    #[serde(default = "default_failure")]
    pub failure: String,
}

/// Service configuration.
///
/// Serialized to/from TOML at `~/.config/fileseq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
}

fn default_busy_timeout_ms() -> u64 {
    5000
}
fn default_welcome() -> String {
    "Welcome! Use /ssequence to start a sequence, send your files, then /esequence.".into()
}
fn default_started() -> String {
    "Sequence started - send files.".into()
}
fn default_already_open() -> String {
    "A sequence is already open.".into()
}
fn default_item_added() -> String {
    "Added at position {position}".into()
}
fn default_no_open_sequence() -> String {
    "No open sequence. Start with /ssequence".into()
}
fn default_unsupported_kind() -> String {
    "Unsupported file type: {kind}".into()
}
fn default_completed() -> String {
    "Sequence complete.".into()
}
fn default_completed_with_failures() -> String {
    "Sequence complete. {failed} file(s) could not be delivered.".into()
}
fn default_unknown_command() -> String {
    "Unknown command".into()
}
fn default_failure() -> String {
    "Something went wrong, please try again.".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            welcome: default_welcome(),
            started: default_started(),
            already_open: default_already_open(),
            item_added: default_item_added(),
            no_open_sequence: default_no_open_sequence(),
            unsupported_kind: default_unsupported_kind(),
            completed: default_completed(),
            completed_with_failures: default_completed_with_failures(),
            unknown_command: default_unknown_command(),
            failure: default_failure(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }
        key.split('.').try_fold(root, |current, part| current.get(part))
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let (parent_path, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(invalid("config key is empty".into()));
        }

        let mut current = root;
        if let Some(parent_path) = parent_path {
            for part in parent_path.split('.') {
                current = current
                    .get_mut(part)
                    .ok_or_else(|| invalid("unknown config key".into()))?;
            }
        }

        let obj = current
            .as_object_mut()
            .ok_or_else(|| invalid("unknown config key".into()))?;
        let existing = obj
            .get(leaf)
            .ok_or_else(|| invalid("unknown config key".into()))?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => serde_json::Value::Number(
                value
                    .parse::<u64>()
                    .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                    .into(),
            ),
            serde_json::Value::Null if value.is_empty() => serde_json::Value::Null,
            _ => serde_json::Value::String(value.into()),
        };
        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from the default location or return (and persist) defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match Self::get_json_value_by_path(&json, key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. Does not persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit the
    /// field (for example an unknown retention policy name).
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Database path: `FILESEQ_DB`, then `storage.db_path`, then the data dir.
    pub fn db_path(&self) -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var("FILESEQ_DB") {
            return Ok(PathBuf::from(path));
        }
        if let Some(path) = &self.storage.db_path {
            return Ok(path.clone());
        }
        data_dir()
            .map(|dir| dir.join("fileseq.db"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("fileseq.db"),
                message: e.to_string(),
            })
    }
}

impl MessagesConfig {
    pub fn item_added(&self, position: i64) -> String {
        self.item_added.replace("{position}", &position.to_string())
    }

    pub fn unsupported_kind(&self, kind: &str) -> String {
        self.unsupported_kind.replace("{kind}", kind)
    }

    pub fn completed_with_failures(&self, failed: usize) -> String {
        self.completed_with_failures
            .replace("{failed}", &failed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.replay, ReplayConfig::default());
        assert_eq!(parsed.storage.busy_timeout_ms, 5000);
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.replay.item_retention, ItemRetention::Retain);
        assert_eq!(cfg.replay.failure_mode, FailureMode::BestEffort);
    }

    #[test]
    fn policies_parse_from_toml() {
        let cfg: Config = toml::from_str(
            "[replay]\n\
             item_retention = \"purge_after_replay\"\n\
             failure_mode = \"stop_on_failure\"\n",
        )
        .unwrap();
        assert_eq!(cfg.replay.item_retention, ItemRetention::PurgeAfterReplay);
        assert_eq!(cfg.replay.failure_mode, FailureMode::StopOnFailure);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("replay.item_retention").as_deref(), Some("retain"));
        assert_eq!(cfg.get("storage.busy_timeout_ms").as_deref(), Some("5000"));
        assert!(cfg.get("replay.missing").is_none());
    }

    #[test]
    fn set_updates_policy() {
        let mut cfg = Config::default();
        cfg.set("replay.item_retention", "purge_after_replay").unwrap();
        assert_eq!(cfg.replay.item_retention, ItemRetention::PurgeAfterReplay);
    }

    #[test]
    fn set_rejects_unknown_policy() {
        let mut cfg = Config::default();
        let err = cfg.set("replay.failure_mode", "sometimes").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert_eq!(cfg.replay.failure_mode, FailureMode::BestEffort);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(cfg.set("replay.nonexistent", "x").is_err());
    }

    #[test]
    fn set_rejects_non_numeric_timeout() {
        let mut cfg = Config::default();
        assert!(cfg.set("storage.busy_timeout_ms", "soon").is_err());
    }

    #[test]
    fn set_db_path_from_null() {
        let mut cfg = Config::default();
        cfg.set("storage.db_path", "/tmp/seq.db").unwrap();
        assert_eq!(cfg.storage.db_path, Some(PathBuf::from("/tmp/seq.db")));
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.messages.completed, "Sequence complete.");
    }

    #[test]
    fn message_templates_substitute() {
        let messages = MessagesConfig::default();
        assert_eq!(messages.item_added(3), "Added at position 3");
        assert!(messages.unsupported_kind("sticker").ends_with("sticker"));
        assert!(messages.completed_with_failures(2).contains('2'));
    }
}
