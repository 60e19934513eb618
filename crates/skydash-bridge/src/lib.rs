//! Telemetry from an HTTP bridge running next to a vendor SDK.
//!
//! The bridge exposes four read-only JSON resources under `/api/`:
//! `attitude`, `battery`, `gps` and `status`. Every poll fetches all four;
//! if any of them fails the whole poll is reported as disconnected so the
//! dashboard never shows a mix of fresh and stale values.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use skydash_proto::telemetry::{unix_now, Attitude, FlightStatus, Gps, TelemetryRecord};
use skydash_proto::TelemetryProvider;

pub const DEFAULT_BRIDGE_URL: &str = "http://192.168.1.100:8080";

/// Upper bound on each sub-request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// A bridge sub-request could not be completed.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("fetching {resource}: {source}")]
    Http {
        resource: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetching {resource}: bridge answered {status}")]
    Status {
        resource: &'static str,
        status: u16,
    },
}

/// `[bridge]` config section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Base URL of the bridge, e.g. `http://192.168.1.100:8080`.
    pub url: Option<String>,
    pub request_timeout_ms: Option<u64>,
}

impl BridgeConfig {
    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_BRIDGE_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AttitudePayload {
    roll: f64,
    pitch: f64,
    yaw: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BatteryPayload {
    voltage: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GpsPayload {
    altitude: f64,
    latitude: f64,
    longitude: f64,
    /// Some bridges send counts as floats.
    satellite_count: f64,
    speed: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct StatusPayload {
    flight_mode: String,
    signal_strength: f64,
    motors_on: bool,
}

impl Default for StatusPayload {
    fn default() -> Self {
        Self {
            flight_mode: "UNKNOWN".to_string(),
            signal_strength: 0.0,
            motors_on: false,
        }
    }
}

fn percent(v: f64) -> u8 {
    v.round().clamp(0.0, 100.0) as u8
}

fn whole_count(v: f64) -> u32 {
    // float-to-int `as` saturates, NaN becomes 0
    v.round().max(0.0) as u32
}

pub struct SnapshotBridge {
    base: String,
    client: Client,
}

impl SnapshotBridge {
    pub fn new(cfg: &BridgeConfig) -> Result<Self, BridgeError> {
        let client = Client::builder()
            .timeout(cfg.request_timeout())
            .build()
            .map_err(BridgeError::Client)?;

        Ok(Self {
            base: cfg.url().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Fetches all four resources and merges them. Fails if any one fails.
    pub async fn fetch(&self) -> Result<TelemetryRecord, BridgeError> {
        let (attitude, battery, gps, status) = tokio::try_join!(
            self.get::<AttitudePayload>("attitude"),
            self.get::<BatteryPayload>("battery"),
            self.get::<GpsPayload>("gps"),
            self.get::<StatusPayload>("status"),
        )?;

        Ok(TelemetryRecord {
            timestamp: unix_now(),
            altitude: gps.altitude,
            battery_voltage: battery.voltage,
            status: FlightStatus::from_armed_mode(status.motors_on, &status.flight_mode),
            attitude: Attitude {
                roll: attitude.roll,
                pitch: attitude.pitch,
                yaw: attitude.yaw,
            },
            gps: Gps {
                satellites: whole_count(gps.satellite_count),
                latitude: gps.latitude,
                longitude: gps.longitude,
                altitude: gps.altitude,
            },
            signal_strength: percent(status.signal_strength),
            ground_speed: gps.speed,
            armed: status.motors_on,
            flight_mode: status.flight_mode,
        })
    }

    async fn get<T: DeserializeOwned>(&self, resource: &'static str) -> Result<T, BridgeError> {
        let url = format!("{}/api/{}", self.base, resource);
        debug!("bridge: GET {}", url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| BridgeError::Http { resource, source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BridgeError::Status {
                resource,
                status: status.as_u16(),
            });
        }

        resp.json::<T>()
            .await
            .map_err(|source| BridgeError::Http { resource, source })
    }
}

#[async_trait]
impl TelemetryProvider for SnapshotBridge {
    fn name(&self) -> &'static str {
        "bridge"
    }

    async fn telemetry(&self) -> TelemetryRecord {
        match self.fetch().await {
            Ok(record) => record,
            Err(e) => {
                warn!("bridge unavailable: {:#}", e);
                TelemetryRecord::disconnected(unix_now())
            }
        }
    }
}
