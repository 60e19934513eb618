use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::{debug, info};

use skydash_proto::telemetry::{round2, Attitude, FlightStatus, Gps, TelemetryRecord};
use skydash_proto::TelemetryProvider;

use crate::{SimError, SimParams, SyntheticConfig};

const SATELLITES: std::ops::RangeInclusive<u32> = 10..=14;
const SIGNAL_STRENGTH: std::ops::RangeInclusive<u8> = 85..=100;
const GROUND_SPEED: std::ops::Range<f64> = 0.5..2.5;
const GPS_JITTER_DEG: f64 = 0.0001;

/// Hovering-drone telemetry driven by elapsed time and an RNG.
///
/// Every call to [`next`](Self::next) drains the battery a little. Once the
/// voltage reaches the floor the vehicle reports RTL until [`reset`](Self::reset).
pub struct SyntheticGenerator<R = StdRng> {
    params: SimParams,
    attitude_noise: Normal<f64>,
    rng: R,
    origin: Instant,
    calls: u64,
    voltage: f64,
    rtl: bool,
}

impl SyntheticGenerator<StdRng> {
    pub fn new(cfg: &SyntheticConfig) -> Result<Self, SimError> {
        let params = cfg.resolve()?;
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(params, rng)
    }
}

impl<R: Rng> SyntheticGenerator<R> {
    pub fn with_rng(params: SimParams, rng: R) -> Result<Self, SimError> {
        params.validate()?;
        let attitude_noise = Normal::new(0.0, params.attitude_sigma_deg).map_err(|_| {
            SimError::Negative {
                name: "attitude_sigma_deg",
                value: params.attitude_sigma_deg,
            }
        })?;

        Ok(Self {
            params,
            attitude_noise,
            rng,
            origin: Instant::now(),
            calls: 0,
            voltage: params.initial_voltage,
            rtl: false,
        })
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn battery_voltage(&self) -> f64 {
        self.voltage
    }

    /// Linear rescale of the current voltage between floor and full charge.
    pub fn battery_percent(&self) -> u8 {
        let p = &self.params;
        let frac = (self.voltage - p.floor_voltage) / (p.initial_voltage - p.floor_voltage);
        (frac * 100.0).clamp(0.0, 100.0) as u8
    }

    pub fn reset(&mut self) {
        self.origin = Instant::now();
        self.calls = 0;
        self.voltage = self.params.initial_voltage;
        self.rtl = false;
        info!("simulator reset");
    }

    pub fn next(&mut self) -> TelemetryRecord {
        let elapsed = self.origin.elapsed().as_secs_f64();
        self.next_at(elapsed)
    }

    /// Produces the record for a given number of seconds since the origin.
    pub fn next_at(&mut self, elapsed: f64) -> TelemetryRecord {
        self.calls += 1;
        let p = self.params;

        let altitude = p.base_altitude_m + p.amplitude_m * (elapsed * p.omega_rad_s).sin();

        let drained = p.initial_voltage - p.drain_per_call * self.calls as f64;
        self.voltage = drained.max(p.floor_voltage).min(self.voltage);
        if self.voltage <= p.floor_voltage && !self.rtl {
            info!(voltage = self.voltage, "battery at floor, returning to launch");
            self.rtl = true;
        }

        let status = if self.rtl {
            FlightStatus::Rtl
        } else {
            FlightStatus::Armed
        };
        let armed = status == FlightStatus::Armed;

        let roll = self.attitude_noise.sample(&mut self.rng);
        let pitch = self.attitude_noise.sample(&mut self.rng);
        let yaw = (elapsed * p.yaw_rate_deg_s).rem_euclid(360.0);

        let satellites = self.rng.gen_range(SATELLITES);
        let signal_strength = self.rng.gen_range(SIGNAL_STRENGTH);
        let ground_speed = self.rng.gen_range(GROUND_SPEED);
        let latitude = p.home_lat + self.rng.gen_range(-GPS_JITTER_DEG..=GPS_JITTER_DEG);
        let longitude = p.home_lon + self.rng.gen_range(-GPS_JITTER_DEG..=GPS_JITTER_DEG);

        debug!(calls = self.calls, elapsed, voltage = self.voltage, "synthetic sample");

        TelemetryRecord {
            timestamp: round2(elapsed),
            altitude: round2(altitude),
            battery_voltage: round2(self.voltage),
            status,
            attitude: Attitude {
                roll: round2(roll),
                pitch: round2(pitch),
                yaw: round2(yaw),
            },
            gps: Gps {
                satellites,
                latitude,
                longitude,
                altitude: round2(altitude),
            },
            signal_strength,
            ground_speed: round2(ground_speed),
            armed,
            flight_mode: if armed { "STABILIZE" } else { "RTL" }.to_string(),
        }
    }
}

/// Shares one generator between concurrent callers.
pub struct SyntheticProvider {
    gen: Mutex<SyntheticGenerator>,
}

impl SyntheticProvider {
    pub fn new(cfg: &SyntheticConfig) -> Result<Self, SimError> {
        Ok(Self::from_generator(SyntheticGenerator::new(cfg)?))
    }

    pub fn from_generator(gen: SyntheticGenerator) -> Self {
        Self { gen: Mutex::new(gen) }
    }

    pub fn reset(&self) {
        self.gen.lock().unwrap_or_else(PoisonError::into_inner).reset();
    }

    pub fn battery_percent(&self) -> u8 {
        self.gen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .battery_percent()
    }
}

#[async_trait]
impl TelemetryProvider for SyntheticProvider {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    async fn telemetry(&self) -> TelemetryRecord {
        self.gen.lock().unwrap_or_else(PoisonError::into_inner).next()
    }
}
