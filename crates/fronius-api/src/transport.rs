// Shared transport configuration for building reqwest::Client instances.
//
// The telemetry and control clients share timeout and TLS settings
// through this module. The inverter is an embedded host on the local
// network, so requests are short and bounded.

use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Hard per-request timeout. Must stay below the poll period.
    pub timeout: Duration,
    /// Accept self-signed certificates when the device is reached over HTTPS.
    pub accept_invalid_certs: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            accept_invalid_certs: true,
        }
    }
}

impl TransportConfig {
    /// Config with the given timeout and default TLS handling.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .user_agent(concat!("fronius-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

/// Turn a configured host into a base URL.
///
/// Accepts bare hosts (`192.168.1.20`, `inverter.local:8080`) as well as
/// full URLs; bare hosts are reached over plain HTTP, which is what the
/// inverter's web server speaks by default.
pub fn base_url(host: &str) -> Result<Url, Error> {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        Ok(Url::parse(host)?)
    } else {
        Ok(Url::parse(&format!("http://{host}"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::base_url;

    #[test]
    fn bare_host_gets_http_scheme() {
        let url = base_url("192.168.1.20").expect("valid host");
        assert_eq!(url.as_str(), "http://192.168.1.20/");
    }

    #[test]
    fn full_url_is_kept() {
        let url = base_url("https://inverter.local:8443/").expect("valid url");
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.port(), Some(8443));
    }

    #[test]
    fn empty_host_is_rejected() {
        assert!(base_url("").is_err());
    }
}
