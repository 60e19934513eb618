pub mod generator;

use serde::Deserialize;
use thiserror::Error;

pub use generator::{SyntheticGenerator, SyntheticProvider};

pub const DEFAULT_BASE_ALTITUDE_M: f64 = 50.0;
pub const DEFAULT_AMPLITUDE_M: f64 = 5.0;
pub const DEFAULT_OMEGA_RAD_S: f64 = 0.6;
/// Fully charged 4S LiPo.
pub const DEFAULT_INITIAL_VOLTAGE: f64 = 16.8;
pub const DEFAULT_DRAIN_PER_CALL: f64 = 0.001;
/// 4S LiPo cutoff.
pub const DEFAULT_FLOOR_VOLTAGE: f64 = 14.0;
/// ~95% of samples land within ±2 degrees.
pub const DEFAULT_ATTITUDE_SIGMA_DEG: f64 = 0.67;
pub const DEFAULT_YAW_RATE_DEG_S: f64 = 5.0;
pub const DEFAULT_HOME_LAT: f64 = 37.7749;
pub const DEFAULT_HOME_LON: f64 = -122.4194;

#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    #[error("floor voltage {floor} must be below initial voltage {initial}")]
    VoltageRange { initial: f64, floor: f64 },

    #[error("{name} must be finite and non-negative (got {value})")]
    Negative { name: &'static str, value: f64 },

    #[error("{name} must be a finite number (got {value})")]
    NotFinite { name: &'static str, value: f64 },
}

/// `[synthetic]` config section. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Center of the hover oscillation.
    pub base_altitude_m: Option<f64>,
    pub amplitude_m: Option<f64>,
    /// Angular frequency of the hover oscillation.
    pub omega_rad_s: Option<f64>,

    pub initial_voltage: Option<f64>,
    /// Volts lost per telemetry request.
    pub drain_per_call: Option<f64>,
    pub floor_voltage: Option<f64>,

    pub attitude_sigma_deg: Option<f64>,
    pub yaw_rate_deg_s: Option<f64>,

    pub home_lat: Option<f64>,
    pub home_lon: Option<f64>,

    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

/// [`SyntheticConfig`] with defaults applied and ranges checked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimParams {
    pub base_altitude_m: f64,
    pub amplitude_m: f64,
    pub omega_rad_s: f64,
    pub initial_voltage: f64,
    pub drain_per_call: f64,
    pub floor_voltage: f64,
    pub attitude_sigma_deg: f64,
    pub yaw_rate_deg_s: f64,
    pub home_lat: f64,
    pub home_lon: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            base_altitude_m: DEFAULT_BASE_ALTITUDE_M,
            amplitude_m: DEFAULT_AMPLITUDE_M,
            omega_rad_s: DEFAULT_OMEGA_RAD_S,
            initial_voltage: DEFAULT_INITIAL_VOLTAGE,
            drain_per_call: DEFAULT_DRAIN_PER_CALL,
            floor_voltage: DEFAULT_FLOOR_VOLTAGE,
            attitude_sigma_deg: DEFAULT_ATTITUDE_SIGMA_DEG,
            yaw_rate_deg_s: DEFAULT_YAW_RATE_DEG_S,
            home_lat: DEFAULT_HOME_LAT,
            home_lon: DEFAULT_HOME_LON,
        }
    }
}

impl SyntheticConfig {
    pub fn resolve(&self) -> Result<SimParams, SimError> {
        let d = SimParams::default();
        let p = SimParams {
            base_altitude_m: self.base_altitude_m.unwrap_or(d.base_altitude_m),
            amplitude_m: self.amplitude_m.unwrap_or(d.amplitude_m),
            omega_rad_s: self.omega_rad_s.unwrap_or(d.omega_rad_s),
            initial_voltage: self.initial_voltage.unwrap_or(d.initial_voltage),
            drain_per_call: self.drain_per_call.unwrap_or(d.drain_per_call),
            floor_voltage: self.floor_voltage.unwrap_or(d.floor_voltage),
            attitude_sigma_deg: self.attitude_sigma_deg.unwrap_or(d.attitude_sigma_deg),
            yaw_rate_deg_s: self.yaw_rate_deg_s.unwrap_or(d.yaw_rate_deg_s),
            home_lat: self.home_lat.unwrap_or(d.home_lat),
            home_lon: self.home_lon.unwrap_or(d.home_lon),
        };
        p.validate()?;
        Ok(p)
    }
}

impl SimParams {
    pub fn validate(&self) -> Result<(), SimError> {
        // NaN or inf here would leak into every record as JSON null
        for (name, value) in [
            ("base_altitude_m", self.base_altitude_m),
            ("omega_rad_s", self.omega_rad_s),
            ("initial_voltage", self.initial_voltage),
            ("floor_voltage", self.floor_voltage),
            ("yaw_rate_deg_s", self.yaw_rate_deg_s),
            ("home_lat", self.home_lat),
            ("home_lon", self.home_lon),
        ] {
            if !value.is_finite() {
                return Err(SimError::NotFinite { name, value });
            }
        }
        for (name, value) in [
            ("amplitude_m", self.amplitude_m),
            ("drain_per_call", self.drain_per_call),
            ("attitude_sigma_deg", self.attitude_sigma_deg),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SimError::Negative { name, value });
            }
        }
        if !(self.floor_voltage < self.initial_voltage) {
            return Err(SimError::VoltageRange {
                initial: self.initial_voltage,
                floor: self.floor_voltage,
            });
        }
        Ok(())
    }
}
