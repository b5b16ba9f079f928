// ── Core error types ──
//
// Bridge-level errors. Consumers never see raw reqwest failures or JSON
// parse errors; the `From<fronius_api::Error>` impl folds transport-layer
// errors into these variants. Every variant maps to a short code carried
// in failure reports on the bus.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device errors ────────────────────────────────────────────────
    #[error("Cannot reach inverter at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Inverter request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Inverter sent no usable digest challenge: {message}")]
    AuthChallengeMissing { message: String },

    #[error("Inverter rejected credentials for {uri}")]
    AuthRejected { uri: String },

    #[error("Operation rejected by inverter: {message}")]
    Rejected { message: String },

    #[error("Unrecognized inverter response: {message}")]
    Decode { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    #[error("Inverter host is not configured")]
    Unconfigured,

    // ── Runtime errors ───────────────────────────────────────────────
    #[error("Failed to persist {what}: {message}")]
    Persistence { what: String, message: String },

    #[error("Bus channel closed")]
    BusClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Machine-readable code used in `error_code` report fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => "TRANSPORT",
            Self::AuthChallengeMissing { .. } => "AUTH_CHALLENGE_MISSING",
            Self::AuthRejected { .. } => "AUTH_REJECTED",
            Self::Rejected { .. } => "REJECTED",
            Self::Unconfigured => "UNCONFIGURED",
            Self::ConfigInvalid { .. } => "CONFIG_INVALID",
            Self::Decode { .. }
            | Self::Persistence { .. }
            | Self::BusClosed
            | Self::Internal(_) => "INTERNAL",
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<fronius_api::Error> for CoreError {
    fn from(err: fronius_api::Error) -> Self {
        match err {
            fronius_api::Error::Transport(ref e) => CoreError::ConnectionFailed {
                url: e
                    .url()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "<unknown>".into()),
                reason: e.to_string(),
            },
            fronius_api::Error::Timeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            fronius_api::Error::InvalidUrl(e) => CoreError::ConfigInvalid {
                message: format!("invalid inverter URL: {e}"),
            },
            fronius_api::Error::Tls(msg) => CoreError::Internal(msg),
            fronius_api::Error::VendorRejected { code, reason } => CoreError::Rejected {
                message: format!("status {code}: {reason}"),
            },
            fronius_api::Error::Decode { message, body: _ } => CoreError::Decode { message },
            fronius_api::Error::AuthChallengeMissing { message } => {
                CoreError::AuthChallengeMissing { message }
            }
            fronius_api::Error::AuthRejected { uri } => CoreError::AuthRejected { uri },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_keep_their_codes() {
        let cases = [
            (
                fronius_api::Error::AuthRejected { uri: "/config/batteries".into() },
                "AUTH_REJECTED",
            ),
            (
                fronius_api::Error::AuthChallengeMissing { message: "none".into() },
                "AUTH_CHALLENGE_MISSING",
            ),
            (
                fronius_api::Error::VendorRejected { code: 400, reason: "bad".into() },
                "REJECTED",
            ),
            (fronius_api::Error::Timeout { timeout_ms: 100 }, "TRANSPORT"),
        ];
        for (api, code) in cases {
            assert_eq!(api.code(), code);
            assert_eq!(CoreError::from(api).code(), code);
        }
    }

    #[test]
    fn unconfigured_has_its_own_code() {
        assert_eq!(CoreError::Unconfigured.code(), "UNCONFIGURED");
    }
}
