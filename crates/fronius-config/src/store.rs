// ── File-backed StateStore ──

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use fronius_core::{BridgeSettings, CoreError, PersistedSnapshot, StateStore};

use crate::{Config, Paths, save_config, save_snapshot};

/// Persists the bridge's snapshot and settings under a work directory.
///
/// Keeps the loaded [`Config`] so sections the bridge does not own
/// (MQTT, timing) survive a settings save untouched.
#[derive(Debug)]
pub struct FileStore {
    config_path: PathBuf,
    state_path: PathBuf,
    config: Mutex<Config>,
}

impl FileStore {
    pub fn new(paths: &Paths, config: Config) -> Self {
        Self {
            config_path: paths.config_file(),
            state_path: paths.state_file(),
            config: Mutex::new(config),
        }
    }

    /// The config as last saved.
    pub fn config(&self) -> Config {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StateStore for FileStore {
    fn save_snapshot(&self, snapshot: &PersistedSnapshot) -> Result<(), CoreError> {
        save_snapshot(&self.state_path, snapshot).map_err(|e| CoreError::Persistence {
            what: "state snapshot".into(),
            message: e.to_string(),
        })
    }

    fn save_settings(&self, settings: &BridgeSettings) -> Result<(), CoreError> {
        let mut config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = config.clone();
        next.apply_settings(settings);
        save_config(&self.config_path, &mut next)?;
        *config = next;
        Ok(())
    }
}
