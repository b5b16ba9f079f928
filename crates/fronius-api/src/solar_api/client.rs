// Solar API HTTP client
//
// Wraps `reqwest::Client` with Solar API URL construction and response
// decoding. Connection failures are an ordinary outcome here: the
// inverter sleeps at night and drops off the network.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::solar_api::models::{NormalizedReading, decode_realtime};
use crate::solar_api::powerflow::decode_powerflow;
use crate::transport::TransportConfig;

const API_PREFIX: &str = "solar_api/v1";
const REALTIME_DATA: &str = "GetInverterRealtimeData.cgi";
const POWERFLOW: &str = "status/powerflow";

/// Which endpoint a reading is taken from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// `GetInverterRealtimeData.cgi`, system scope.
    #[default]
    SolarApi,
    /// `status/powerflow`, for hybrid inverters.
    Powerflow,
}

/// Raw HTTP client for the inverter's realtime-data endpoint.
#[derive(Clone)]
pub struct SolarApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl SolarApiClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the device root, e.g. `http://192.168.1.20`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/solar_api/v1/GetInverterRealtimeData.cgi?Scope=System`
    pub fn realtime_data_url(&self) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!("{API_PREFIX}/{REALTIME_DATA}"));
        url.set_query(Some("Scope=System"));
        url
    }

    /// `{base}/status/powerflow`
    pub fn powerflow_url(&self) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(POWERFLOW);
        url.set_query(None);
        url
    }

    /// Fetch one reading from `source`.
    pub async fn fetch_reading(&self, source: DataSource) -> Result<NormalizedReading, Error> {
        match source {
            DataSource::SolarApi => self.fetch_realtime().await,
            DataSource::Powerflow => self.fetch_powerflow().await,
        }
    }

    /// Fetch system-scope realtime data from the configured device.
    pub async fn fetch_realtime(&self) -> Result<NormalizedReading, Error> {
        self.fetch(self.realtime_data_url()).await
    }

    /// Fetch hybrid power-flow status from the configured device.
    pub async fn fetch_powerflow(&self) -> Result<NormalizedReading, Error> {
        let body = self.get_body(self.powerflow_url()).await?;
        decode_powerflow(&body)
    }

    /// Fetch and normalize realtime data from an explicit endpoint URL.
    pub async fn fetch(&self, url: Url) -> Result<NormalizedReading, Error> {
        let body = self.get_body(url).await?;
        decode_realtime(&body)
    }

    /// GET `url`; non-2xx answers are a vendor rejection.
    async fn get_body(&self, url: Url) -> Result<String, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::VendorRejected {
                code: i64::from(status.as_u16()),
                reason: format!("HTTP {status}: {}", body.chars().take(200).collect::<String>()),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        trace!(len = body.len(), "response body received");
        Ok(body)
    }
}
