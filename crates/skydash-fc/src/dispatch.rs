use std::time::Instant;

use tracing::trace;

use crate::message::{AttitudeRad, FcMessage, FlightData, GlobalPosition, GpsRaw, Heartbeat, SysStatus};
use crate::mode::{mode_name, MODE_FLAG_SAFETY_ARMED};
use crate::state::{Sample, StateStore};

const MM_PER_M: f64 = 1000.0;
const MV_PER_V: f64 = 1000.0;
const DEG_E7: f64 = 1e7;

/// Routes a message to the rule that owns its fields.
///
/// Returns false for message kinds the dashboard does not use; those leave
/// the store untouched.
pub fn dispatch(store: &StateStore, msg: &FcMessage, now: Instant) -> bool {
    trace!("dispatch {}", msg.kind());
    match msg {
        FcMessage::Heartbeat(hb) => apply_heartbeat(store, hb, now),
        FcMessage::Attitude(att) => apply_attitude(store, att, now),
        FcMessage::GlobalPosition(pos) => apply_position(store, pos, now),
        FcMessage::FlightData(hud) => apply_flight_data(store, hud, now),
        FcMessage::SysStatus(sys) => apply_sys_status(store, sys, now),
        FcMessage::GpsRaw(gps) => apply_gps_raw(store, gps, now),
        FcMessage::Other { .. } => return false,
    }
    true
}

fn apply_attitude(store: &StateStore, att: &AttitudeRad, now: Instant) {
    let (roll, pitch, yaw) = (
        (att.roll as f64).to_degrees(),
        (att.pitch as f64).to_degrees(),
        (att.yaw as f64).to_degrees(),
    );
    store.update(|f| {
        f.roll = Some(Sample::new(roll, now));
        f.pitch = Some(Sample::new(pitch, now));
        f.yaw = Some(Sample::new(yaw, now));
    });
}

fn apply_position(store: &StateStore, pos: &GlobalPosition, now: Instant) {
    let relative_alt = pos.relative_alt as f64 / MM_PER_M;
    let latitude = pos.lat as f64 / DEG_E7;
    let longitude = pos.lon as f64 / DEG_E7;
    store.update(|f| {
        f.relative_alt = Some(Sample::new(relative_alt, now));
        f.latitude = Some(Sample::new(latitude, now));
        f.longitude = Some(Sample::new(longitude, now));
    });
}

fn apply_flight_data(store: &StateStore, hud: &FlightData, now: Instant) {
    store.update(|f| {
        f.ground_speed = Some(Sample::new(hud.groundspeed as f64, now));
        f.altitude_msl = Some(Sample::new(hud.alt as f64, now));
    });
}

fn apply_sys_status(store: &StateStore, sys: &SysStatus, now: Instant) {
    // u16::MAX and -1 mean "not measured"
    let voltage = (sys.voltage_battery != u16::MAX).then(|| sys.voltage_battery as f64 / MV_PER_V);
    let remaining = (0..=100)
        .contains(&sys.battery_remaining)
        .then(|| sys.battery_remaining as u8);
    store.update(|f| {
        if let Some(v) = voltage {
            f.battery_voltage = Some(Sample::new(v, now));
        }
        if let Some(r) = remaining {
            f.battery_remaining = Some(Sample::new(r, now));
        }
    });
}

fn apply_gps_raw(store: &StateStore, gps: &GpsRaw, now: Instant) {
    let satellites = (gps.satellites_visible != u8::MAX).then(|| gps.satellites_visible as u32);
    store.update(|f| {
        if let Some(n) = satellites {
            f.satellites = Some(Sample::new(n, now));
        }
        f.fix_type = Some(Sample::new(gps.fix_type, now));
    });
}

fn apply_heartbeat(store: &StateStore, hb: &Heartbeat, now: Instant) {
    let armed = hb.base_mode & MODE_FLAG_SAFETY_ARMED != 0;
    let mode = mode_name(hb.autopilot, hb.vehicle, hb.base_mode, hb.custom_mode);
    store.update(|f| {
        f.armed = Some(Sample::new(armed, now));
        f.flight_mode = Some(Sample::new(mode, now));
        f.last_heartbeat = Some(now);
    });
}
