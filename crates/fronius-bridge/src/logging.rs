// ── Tracing setup ──
//
// The filter sits behind a reload layer so the hub can change verbosity
// at runtime through `cmd.log.set_level`.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

use fronius_core::{CoreError, LogLevelControl};

/// Initial filter: `-v` counts win, then `RUST_LOG`, then the level
/// persisted in the config file.
fn initial_filter(verbosity: u8, configured: &str) -> EnvFilter {
    let from_flags = match verbosity {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    };
    if let Some(level) = from_flags {
        return EnvFilter::new(level);
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
}

/// Install the global subscriber and return the handle that swaps its
/// level.
pub fn init(verbosity: u8, configured: &str) -> ReloadableLevel {
    let (filter, handle) = reload::Layer::new(initial_filter(verbosity, configured));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();

    ReloadableLevel { handle }
}

pub struct ReloadableLevel {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogLevelControl for ReloadableLevel {
    fn set_level(&self, level: LevelFilter) -> Result<(), CoreError> {
        self.handle
            .reload(EnvFilter::default().add_directive(level.into()))
            .map_err(|e| CoreError::Internal(format!("log filter reload failed: {e}")))
    }
}
