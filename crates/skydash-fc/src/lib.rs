//! MAVLink streaming ingest.
//!
//! A [`StreamingIngestor`] owns one vehicle link. A background task receives
//! frames from a [`MessageSource`], [`dispatch`] folds them into the
//! [`StateStore`], and [`TelemetryProvider::telemetry`] reads a snapshot back
//! out as a dashboard record.
//!
//! [`TelemetryProvider::telemetry`]: skydash_proto::TelemetryProvider::telemetry

pub mod address;
pub mod dispatch;
pub mod ingest;
pub mod message;
pub mod mode;
pub mod record;
pub mod source;
pub mod state;

use std::time::Duration;

use serde::Deserialize;

pub use address::{AddressError, ConnectionAddress};
pub use dispatch::dispatch;
pub use ingest::{ConnectError, IngestSettings, LinkState, StreamingIngestor};
pub use message::{FcMessage, Frame};
pub use source::{MavlinkSource, MessageSource, SourceError, StreamTarget};
pub use state::{Fields, Sample, StateStore};

/// `[mavlink]` section of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FcConfig {
    /// Connection string, e.g. `udp:0.0.0.0:14550`, `/dev/ttyACM0:57600`.
    pub address: Option<String>,

    /// Wait for the first HEARTBEAT on connect. Default 5s.
    pub heartbeat_timeout_ms: Option<u64>,

    /// Single receive bound. Default 1s.
    pub recv_timeout_ms: Option<u64>,

    /// REQUEST_DATA_STREAM rate. Default 10 Hz.
    pub stream_rate_hz: Option<u16>,

    /// Heartbeat age after which the vehicle counts as disconnected. Default 5s.
    pub link_timeout_ms: Option<u64>,

    /// MAVLink ids we use (ground side). 255/0 is the usual GCS identity.
    pub sys_id: Option<u8>,
    pub comp_id: Option<u8>,
}

impl FcConfig {
    pub fn settings(&self) -> IngestSettings {
        let d = IngestSettings::default();
        let ms = |v: Option<u64>, default: Duration| v.map(Duration::from_millis).unwrap_or(default);
        IngestSettings {
            heartbeat_timeout: ms(self.heartbeat_timeout_ms, d.heartbeat_timeout),
            recv_timeout: ms(self.recv_timeout_ms, d.recv_timeout),
            link_timeout: ms(self.link_timeout_ms, d.link_timeout),
            stream_rate_hz: self.stream_rate_hz.unwrap_or(d.stream_rate_hz),
            sys_id: self.sys_id.unwrap_or(d.sys_id),
            comp_id: self.comp_id.unwrap_or(d.comp_id),
        }
    }
}
