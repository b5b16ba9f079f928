//! Startup errors with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use fronius_config::ConfigError;
use fronius_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const STATE: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum BridgeError {
    #[error("Invalid configuration value for {field}: {reason}")]
    #[diagnostic(
        code(fronius::validation),
        help("Fix the value in {path} or the matching FRONIUS_* environment variable.")
    )]
    Validation {
        field: String,
        reason: String,
        path: String,
    },

    #[error("Could not load configuration from {path}")]
    #[diagnostic(
        code(fronius::config),
        help("Check the TOML syntax and field types. Missing files are fine; defaults apply.")
    )]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },

    #[error("Could not load bridge state from {path}")]
    #[diagnostic(
        code(fronius::state),
        help("The file is rewritten after every poll. Remove it to start from a fresh state.")
    )]
    State {
        path: String,
        #[source]
        source: ConfigError,
    },

    #[error(transparent)]
    #[diagnostic(code(fronius::core))]
    Core(#[from] CoreError),
}

impl BridgeError {
    /// Load failure for the config file at `path`.
    pub fn config(path: &std::path::Path, err: ConfigError) -> Self {
        let path = path.display().to_string();
        match err {
            ConfigError::Validation { field, reason } => Self::Validation {
                field,
                reason,
                path,
            },
            source => Self::Config { path, source },
        }
    }

    pub fn state(path: &std::path::Path, source: ConfigError) -> Self {
        Self::State {
            path: path.display().to_string(),
            source,
        }
    }

    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::Core(CoreError::ConfigInvalid { .. }) => {
                exit_code::USAGE
            }
            Self::Config { .. } => exit_code::CONFIG,
            Self::State { .. } => exit_code::STATE,
            Self::Core(_) => exit_code::GENERAL,
        }
    }
}
