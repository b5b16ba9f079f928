// fronius-api: Async Rust client for the Fronius inverter HTTP interfaces
// (Solar API v1 telemetry + digest-protected configuration endpoints)

pub mod digest;
pub mod error;
pub mod solar_api;
pub mod transport;

pub use digest::{DigestChallenge, DigestClient, DigestCredentials};
pub use error::Error;
pub use solar_api::{
    DataSource, NormalizedReading, RawVendorPayload, SolarApiClient, decode_powerflow,
    decode_realtime,
};
pub use transport::{TransportConfig, base_url};
