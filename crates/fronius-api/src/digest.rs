// Digest-authenticated control client
//
// The inverter's `/config/*` endpoints sit behind HTTP digest auth
// (RFC 7616 with MD5 and qop=auth, the only variant the embedded web
// server implements). The handshake is two requests at most: an
// unauthenticated attempt, then one retry carrying the computed
// credentials. A second challenge is a hard failure.
//
// The firmware sends its challenge in `X-WWW-Authenticate` so browsers
// don't pop a login dialog; the standard header is accepted as a fallback.

use md5::{Digest, Md5};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, WWW_AUTHENTICATE};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const VENDOR_CHALLENGE_HEADER: &str = "x-www-authenticate";
const METHOD: &str = "POST";

/// Requests are never pipelined, so every authorization is the first use
/// of its nonce.
pub const NONCE_COUNT: &str = "00000001";

/// Username and password for the device's service account.
#[derive(Debug, Clone)]
pub struct DigestCredentials {
    pub username: String,
    pub password: SecretString,
}

impl DigestCredentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

// ── Challenge ───────────────────────────────────────────────────────

/// Parameters parsed from a `401` challenge. Scoped to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub qop: String,
    pub opaque: Option<String>,
}

impl DigestChallenge {
    /// Extract the challenge from response headers.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, Error> {
        let raw = headers
            .get(VENDOR_CHALLENGE_HEADER)
            .or_else(|| headers.get(WWW_AUTHENTICATE))
            .ok_or_else(|| Error::AuthChallengeMissing {
                message: "401 without an authenticate header".into(),
            })?;
        let raw = raw.to_str().map_err(|_| Error::AuthChallengeMissing {
            message: "authenticate header is not valid ASCII".into(),
        })?;
        Self::parse(raw)
    }

    /// Parse a `Digest realm="…", nonce="…", qop="auth"` header value.
    pub fn parse(header: &str) -> Result<Self, Error> {
        let header = header.trim();
        let params = match header.split_once(char::is_whitespace) {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("digest") => rest,
            _ => {
                return Err(Error::AuthChallengeMissing {
                    message: format!("not a digest challenge: {header:?}"),
                });
            }
        };

        let mut realm = None;
        let mut nonce = None;
        let mut qop = None;
        let mut opaque = None;
        for (key, value) in parse_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "qop" => qop = Some(value),
                "opaque" => opaque = Some(value),
                _ => {}
            }
        }

        let missing = |field: &str| Error::AuthChallengeMissing {
            message: format!("challenge has no {field}"),
        };
        let realm = realm.ok_or_else(|| missing("realm"))?;
        let nonce = nonce.filter(|n| !n.is_empty()).ok_or_else(|| missing("nonce"))?;
        let qop = qop.ok_or_else(|| missing("qop"))?;

        // qop may be a list ("auth,auth-int"); only "auth" is supported.
        if !qop.split(',').any(|q| q.trim() == "auth") {
            return Err(Error::AuthChallengeMissing {
                message: format!("unsupported qop {qop:?}"),
            });
        }

        Ok(Self {
            realm,
            nonce,
            qop: "auth".into(),
            opaque,
        })
    }

    /// `response = MD5(HA1:nonce:nc:cnonce:qop:HA2)` as lowercase hex.
    pub fn response(
        &self,
        credentials: &DigestCredentials,
        method: &str,
        uri: &str,
        cnonce: &str,
    ) -> String {
        let ha1 = md5_hex(&format!(
            "{}:{}:{}",
            credentials.username,
            self.realm,
            credentials.password.expose_secret()
        ));
        let ha2 = md5_hex(&format!("{method}:{uri}"));
        md5_hex(&format!(
            "{ha1}:{}:{NONCE_COUNT}:{cnonce}:{}:{ha2}",
            self.nonce, self.qop
        ))
    }

    /// Full `Authorization` header value for one request.
    pub fn authorization(
        &self,
        credentials: &DigestCredentials,
        method: &str,
        uri: &str,
        cnonce: &str,
    ) -> String {
        let response = self.response(credentials, method, uri, cnonce);
        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{uri}\", \
             qop={}, nc={NONCE_COUNT}, cnonce=\"{cnonce}\", response=\"{response}\"",
            credentials.username, self.realm, self.nonce, self.qop
        );
        if let Some(ref opaque) = self.opaque {
            header.push_str(&format!(", opaque=\"{opaque}\""));
        }
        header
    }
}

/// Split `key="value", key=value` pairs, honouring commas inside quotes.
fn parse_params(input: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().trim_start_matches(',').trim().to_owned();
        let after = after.trim_start();

        let (value, remainder) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (quoted[..end].to_owned(), &quoted[end + 1..]),
                None => (quoted.to_owned(), ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (after[..end].trim().to_owned(), &after[end..]),
                None => (after.trim().to_owned(), ""),
            }
        };

        out.push((key, value));
        rest = remainder.trim_start().trim_start_matches(',').trim_start();
    }

    out
}

fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// Fresh client nonce: 16 lowercase hex characters.
pub fn generate_cnonce() -> String {
    format!("{:016x}", rand::random::<u64>())
}

// ── Client ──────────────────────────────────────────────────────────

/// HTTP client for the digest-protected `/config/*` endpoints.
///
/// Does not retry on transport failures: retry policy belongs to the
/// caller, which re-issues a whole action at most once per operator event.
#[derive(Clone)]
pub struct DigestClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: DigestCredentials,
}

impl DigestClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(
        base_url: Url,
        credentials: DigestCredentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, credentials: DigestCredentials) -> Self {
        Self {
            http,
            base_url,
            credentials,
        }
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// POST `body` to `path`, answering a digest challenge once.
    ///
    /// Returns whether the device accepted the write. A repeated `401`
    /// after presenting credentials is [`Error::AuthRejected`]; no third
    /// request is ever issued.
    pub async fn send(&self, path: &str, body: &[u8]) -> Result<bool, Error> {
        let url = self.base_url.join(path)?;
        let uri = match url.query() {
            Some(q) => format!("{}?{q}", url.path()),
            None => url.path().to_owned(),
        };

        debug!("POST {}", url);
        let resp = self.post(url.clone(), body, None).await?;
        let status = resp.status();

        if status != StatusCode::UNAUTHORIZED {
            debug!(%status, "no digest challenge, auth skipped");
            return Ok(log_outcome(resp).await);
        }

        let challenge = DigestChallenge::from_headers(resp.headers())?;
        trace!(realm = %challenge.realm, "digest challenge received");

        let cnonce = generate_cnonce();
        let authorization = challenge.authorization(&self.credentials, METHOD, &uri, &cnonce);

        debug!("POST {} (with digest credentials)", url);
        let resp = self.post(url, body, Some(authorization)).await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!(uri, "digest credentials rejected");
            return Err(Error::AuthRejected { uri });
        }

        Ok(log_outcome(resp).await)
    }

    async fn post(
        &self,
        url: Url,
        body: &[u8],
        authorization: Option<String>,
    ) -> Result<reqwest::Response, Error> {
        let mut builder = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec());
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.send().await.map_err(Error::Transport)
    }
}

/// Drain the response for the log and report whether it was 2xx.
async fn log_outcome(resp: reqwest::Response) -> bool {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    debug!(%status, body = %body.chars().take(200).collect::<String>(), "control response");
    status.is_success()
}
