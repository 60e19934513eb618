use serde::{Deserialize, Serialize};

/// Flight modes that mean the vehicle is heading home on its own.
const RETURN_HOME_MODES: &[&str] = &["RTL", "SMART_RTL", "AUTO_RTL", "QRTL", "RTH", "GO_HOME"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatus {
    Armed,
    Disarmed,
    Rtl,
    Disconnected,
    #[default]
    Unknown,
}

impl FlightStatus {
    /// Status for a live vehicle, given its armed flag and current mode token.
    pub fn from_armed_mode(armed: bool, flight_mode: &str) -> Self {
        match (armed, is_return_home_mode(flight_mode)) {
            (true, true) => FlightStatus::Rtl,
            (true, false) => FlightStatus::Armed,
            (false, _) => FlightStatus::Disarmed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlightStatus::Armed => "ARMED",
            FlightStatus::Disarmed => "DISARMED",
            FlightStatus::Rtl => "RTL",
            FlightStatus::Disconnected => "DISCONNECTED",
            FlightStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn is_return_home_mode(flight_mode: &str) -> bool {
    RETURN_HOME_MODES
        .iter()
        .any(|m| m.eq_ignore_ascii_case(flight_mode))
}

/// Degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Gps {
    pub satellites: u32,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above home, like [`TelemetryRecord::altitude`].
    pub altitude: f64,
}

/// The one shape every provider hands to the dashboard.
///
/// All fields are always populated; a provider that has nothing to say about
/// a field leaves it at its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    /// Seconds. Elapsed time for the simulator, Unix time for live sources.
    pub timestamp: f64,
    /// Meters above home.
    pub altitude: f64,
    pub battery_voltage: f64,
    pub status: FlightStatus,
    pub attitude: Attitude,
    pub gps: Gps,
    /// 0-100
    pub signal_strength: u8,
    /// m/s
    pub ground_speed: f64,
    pub armed: bool,
    pub flight_mode: String,
}

impl Default for TelemetryRecord {
    fn default() -> Self {
        Self {
            timestamp: 0.0,
            altitude: 0.0,
            battery_voltage: 0.0,
            status: FlightStatus::Unknown,
            attitude: Attitude::default(),
            gps: Gps::default(),
            signal_strength: 0,
            ground_speed: 0.0,
            armed: false,
            flight_mode: "UNKNOWN".to_string(),
        }
    }
}

impl TelemetryRecord {
    /// Fully defaulted record reported when a source cannot be reached.
    pub fn disconnected(timestamp: f64) -> Self {
        Self {
            timestamp,
            status: FlightStatus::Disconnected,
            ..Self::default()
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.status == FlightStatus::Disconnected
    }
}

/// Rounds to two decimal places, the precision the dashboard displays.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Current wall-clock time as fractional Unix seconds.
pub fn unix_now() -> f64 {
    time::OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 / 1e9
}
