use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A value and when it was observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<T> {
    pub value: T,
    pub at: Instant,
}

impl<T> Sample<T> {
    pub fn new(value: T, at: Instant) -> Self {
        Self { value, at }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.at)
    }
}

/// Latest known value of every field the dashboard shows, already in
/// display units. `None` means the field has not been observed since the
/// store was created or cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    /// degrees
    pub roll: Option<Sample<f64>>,
    pub pitch: Option<Sample<f64>>,
    pub yaw: Option<Sample<f64>>,

    /// meters above home
    pub relative_alt: Option<Sample<f64>>,
    pub latitude: Option<Sample<f64>>,
    pub longitude: Option<Sample<f64>>,

    /// m/s
    pub ground_speed: Option<Sample<f64>>,
    /// meters MSL
    pub altitude_msl: Option<Sample<f64>>,

    /// volts
    pub battery_voltage: Option<Sample<f64>>,
    pub battery_remaining: Option<Sample<u8>>,

    pub satellites: Option<Sample<u32>>,
    pub fix_type: Option<Sample<u8>>,

    pub armed: Option<Sample<bool>>,
    pub flight_mode: Option<Sample<String>>,
    pub last_heartbeat: Option<Instant>,

    /// Messages applied since the store was created or cleared.
    pub messages: u64,
}

impl Fields {
    pub fn heartbeat_age(&self, now: Instant) -> Option<Duration> {
        self.last_heartbeat
            .map(|t| now.saturating_duration_since(t))
    }
}

/// The ingestor's shared view of the vehicle.
///
/// One writer (the ingest task) and any number of readers. Every update
/// closure runs under the same lock as [`snapshot`](Self::snapshot), so
/// fields written together are always read together.
#[derive(Debug, Default)]
pub struct StateStore {
    fields: Mutex<Fields>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one field-group update atomically.
    ///
    /// Keep `f` short: it runs with the lock held.
    pub fn update<R>(&self, f: impl FnOnce(&mut Fields) -> R) -> R {
        let mut fields = self.fields.lock().unwrap_or_else(PoisonError::into_inner);
        fields.messages += 1;
        f(&mut fields)
    }

    /// Consistent copy of every field.
    pub fn snapshot(&self) -> Fields {
        self.fields
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        *self.fields.lock().unwrap_or_else(PoisonError::into_inner) = Fields::default();
    }
}
