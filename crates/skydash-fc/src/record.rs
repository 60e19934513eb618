use std::time::{Duration, Instant};

use skydash_proto::telemetry::{round2, Attitude, FlightStatus, Gps, TelemetryRecord};

use crate::ingest::LinkState;
use crate::state::{Fields, Sample};

/// MAVLink carries no link-quality figure the dashboard could show.
const SIGNAL_STRENGTH_UNSUPPORTED: u8 = 0;

fn value_or<T: Clone>(s: &Option<Sample<T>>, default: T) -> T {
    s.as_ref().map(|s| s.value.clone()).unwrap_or(default)
}

/// Link-aware status: the vehicle's own armed/mode status only counts while
/// heartbeats keep arriving.
pub fn link_status(fields: &Fields, link: LinkState, link_timeout: Duration, now: Instant) -> FlightStatus {
    if link != LinkState::Streaming {
        return FlightStatus::Disconnected;
    }
    match fields.heartbeat_age(now) {
        None => FlightStatus::Unknown,
        Some(age) if age > link_timeout => FlightStatus::Disconnected,
        Some(_) => {
            let armed = value_or(&fields.armed, false);
            let mode = fields.flight_mode.as_ref().map(|s| s.value.as_str()).unwrap_or("");
            FlightStatus::from_armed_mode(armed, mode)
        }
    }
}

/// Builds the dashboard record from one consistent snapshot.
pub fn assemble(
    fields: &Fields,
    link: LinkState,
    link_timeout: Duration,
    now: Instant,
    timestamp: f64,
) -> TelemetryRecord {
    let relative_alt = value_or(&fields.relative_alt, 0.0);
    let defaults = TelemetryRecord::default();

    TelemetryRecord {
        timestamp,
        altitude: relative_alt,
        battery_voltage: value_or(&fields.battery_voltage, 0.0),
        status: link_status(fields, link, link_timeout, now),
        attitude: Attitude {
            roll: round2(value_or(&fields.roll, 0.0)),
            pitch: round2(value_or(&fields.pitch, 0.0)),
            yaw: round2(value_or(&fields.yaw, 0.0)),
        },
        gps: Gps {
            satellites: value_or(&fields.satellites, 0),
            latitude: value_or(&fields.latitude, 0.0),
            longitude: value_or(&fields.longitude, 0.0),
            // same frame as the top-level altitude; VFR_HUD's MSL figure stays in Fields
            altitude: relative_alt,
        },
        signal_strength: SIGNAL_STRENGTH_UNSUPPORTED,
        ground_speed: round2(value_or(&fields.ground_speed, 0.0)),
        armed: value_or(&fields.armed, false),
        flight_mode: value_or(&fields.flight_mode, defaults.flight_mode),
    }
}
