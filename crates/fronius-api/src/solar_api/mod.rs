// Solar API (read-only telemetry)
//
// Unauthenticated JSON endpoints under `/solar_api/v1/` and `/status/`.
// Stateless per call: every fetch is a plain GET followed by envelope
// checking and shape normalization.

pub mod client;
pub mod models;
pub mod powerflow;

pub use client::{DataSource, SolarApiClient};
pub use models::{NormalizedReading, RawVendorPayload, decode_realtime};
pub use powerflow::decode_powerflow;
