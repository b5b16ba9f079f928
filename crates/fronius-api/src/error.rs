use thiserror::Error;

/// Top-level error type for the `fronius-api` crate.
///
/// Covers every failure mode against the inverter's HTTP surface:
/// transport, vendor status envelope, payload decoding, and the digest
/// handshake on the control endpoints. `fronius-core` maps these into
/// bridge-level outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Request exceeded the configured timeout.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP client could not be constructed.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Solar API ───────────────────────────────────────────────────
    /// The device answered, but its `Head.Status` envelope reported a
    /// non-zero code.
    #[error("Inverter rejected request (code {code}): {reason}")]
    VendorRejected { code: i64, reason: String },

    /// Response body did not match either known payload shape.
    #[error("Decode error: {message}")]
    Decode { message: String, body: String },

    // ── Digest auth ─────────────────────────────────────────────────
    /// The endpoint answered 401 without a usable challenge header.
    #[error("Digest challenge missing or malformed: {message}")]
    AuthChallengeMissing { message: String },

    /// The endpoint challenged again after credentials were presented.
    #[error("Digest credentials rejected for {uri}")]
    AuthRejected { uri: String },
}

impl Error {
    /// Returns `true` for connection-level failures: the device could not
    /// be reached or did not answer in time.
    ///
    /// Only these flip the bridge into the disconnected state; a device
    /// that answers with garbage is still reachable.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the digest handshake failed.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::AuthChallengeMissing { .. } | Self::AuthRejected { .. }
        )
    }

    /// Short machine-readable code, used in bus failure reports.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(_) | Self::Timeout { .. } => "TRANSPORT",
            Self::InvalidUrl(_) | Self::Tls(_) => "INTERNAL",
            Self::VendorRejected { .. } => "REJECTED",
            Self::Decode { .. } => "DECODE",
            Self::AuthChallengeMissing { .. } => "AUTH_CHALLENGE_MISSING",
            Self::AuthRejected { .. } => "AUTH_REJECTED",
        }
    }
}
