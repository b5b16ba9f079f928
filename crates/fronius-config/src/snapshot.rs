// ── State snapshot file ──

use std::path::Path;

use tracing::debug;

use fronius_core::PersistedSnapshot;

use crate::{ConfigError, write_atomic};

/// Load the snapshot at `path`. A missing file yields the default
/// snapshot; a corrupt one is an error.
pub fn load_snapshot(path: &Path) -> Result<PersistedSnapshot, ConfigError> {
    let body = match std::fs::read_to_string(path) {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no state file, starting fresh");
            return Ok(PersistedSnapshot::default());
        }
        Err(e) => return Err(e.into()),
    };

    serde_json::from_str(&body).map_err(|source| ConfigError::Snapshot {
        path: path.to_path_buf(),
        source,
    })
}

/// Atomically write `snapshot` to `path`.
pub fn save_snapshot(path: &Path, snapshot: &PersistedSnapshot) -> Result<(), ConfigError> {
    let body = serde_json::to_vec_pretty(snapshot).map_err(|source| ConfigError::Snapshot {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &body)
}
