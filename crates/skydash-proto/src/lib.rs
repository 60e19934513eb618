pub mod provider;
pub mod telemetry;

pub use provider::TelemetryProvider;
pub use telemetry::{Attitude, FlightStatus, Gps, TelemetryRecord};
