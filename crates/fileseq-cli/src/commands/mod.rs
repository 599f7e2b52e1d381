pub mod config;
pub mod events;
pub mod sequence;
pub mod start;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fileseq_core::{Config, ConfigError, CoreError, Database, SequenceManager};

use crate::transport::StdoutTransport;

/// Paths given on the command line, resolved lazily per command.
pub struct Context {
    db_override: Option<PathBuf>,
    config_override: Option<PathBuf>,
}

impl Context {
    pub fn new(db_override: Option<PathBuf>, config_override: Option<PathBuf>) -> Self {
        Self {
            db_override,
            config_override,
        }
    }

    pub fn config_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.config_override {
            Some(path) => Ok(path.clone()),
            None => Config::path(),
        }
    }

    pub fn load_config(&self) -> Result<Config, ConfigError> {
        Config::load_from(&self.config_path()?)
    }

    pub fn open_db(&self, config: &Config) -> Result<Database, CoreError> {
        match &self.db_override {
            Some(path) => {
                let timeout = Duration::from_millis(config.storage.busy_timeout_ms);
                Ok(Database::open(path, timeout)?)
            }
            None => Database::open_with_config(config),
        }
    }

    /// Manager wired to the stdout transport and the loaded config.
    pub fn manager(&self) -> Result<SequenceManager, CoreError> {
        let config = self.load_config()?;
        let db = Arc::new(self.open_db(&config)?);
        Ok(SequenceManager::new(db, Arc::new(StdoutTransport)).with_config(&config))
    }
}
