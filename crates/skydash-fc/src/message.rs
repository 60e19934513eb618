use mavlink::common::MavMessage;
use mavlink::Message;

use crate::mode::{Autopilot, VehicleType};

/// The subset of MAVLink the dashboard cares about, with raw wire units.
///
/// Unit conversion happens in the dispatcher, not here.
#[derive(Debug, Clone, PartialEq)]
pub enum FcMessage {
    Heartbeat(Heartbeat),
    Attitude(AttitudeRad),
    GlobalPosition(GlobalPosition),
    FlightData(FlightData),
    SysStatus(SysStatus),
    GpsRaw(GpsRaw),
    /// Any other message id. Ignored.
    Other { id: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Heartbeat {
    pub autopilot: Autopilot,
    pub vehicle: VehicleType,
    pub base_mode: u8,
    pub custom_mode: u32,
}

/// ATTITUDE, radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttitudeRad {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

/// GLOBAL_POSITION_INT.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalPosition {
    /// degE7
    pub lat: i32,
    /// degE7
    pub lon: i32,
    /// mm above home
    pub relative_alt: i32,
}

/// VFR_HUD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightData {
    /// m/s
    pub groundspeed: f32,
    /// m, MSL
    pub alt: f32,
}

/// SYS_STATUS battery fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SysStatus {
    /// mV, `u16::MAX` when unknown
    pub voltage_battery: u16,
    /// percent, -1 when unknown
    pub battery_remaining: i8,
}

/// GPS_RAW_INT.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsRaw {
    pub fix_type: u8,
    /// 255 when unknown
    pub satellites_visible: u8,
}

impl FcMessage {
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, FcMessage::Heartbeat(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FcMessage::Heartbeat(_) => "HEARTBEAT",
            FcMessage::Attitude(_) => "ATTITUDE",
            FcMessage::GlobalPosition(_) => "GLOBAL_POSITION_INT",
            FcMessage::FlightData(_) => "VFR_HUD",
            FcMessage::SysStatus(_) => "SYS_STATUS",
            FcMessage::GpsRaw(_) => "GPS_RAW_INT",
            FcMessage::Other { .. } => "OTHER",
        }
    }
}

impl From<&MavMessage> for FcMessage {
    fn from(msg: &MavMessage) -> Self {
        match msg {
            MavMessage::HEARTBEAT(d) => FcMessage::Heartbeat(Heartbeat {
                autopilot: Autopilot::from_mav_autopilot(d.autopilot as u8),
                vehicle: VehicleType::from_mav_type(d.mavtype as u8),
                base_mode: d.base_mode.bits(),
                custom_mode: d.custom_mode,
            }),
            MavMessage::ATTITUDE(d) => FcMessage::Attitude(AttitudeRad {
                roll: d.roll,
                pitch: d.pitch,
                yaw: d.yaw,
            }),
            MavMessage::GLOBAL_POSITION_INT(d) => FcMessage::GlobalPosition(GlobalPosition {
                lat: d.lat,
                lon: d.lon,
                relative_alt: d.relative_alt,
            }),
            MavMessage::VFR_HUD(d) => FcMessage::FlightData(FlightData {
                groundspeed: d.groundspeed,
                alt: d.alt,
            }),
            MavMessage::SYS_STATUS(d) => FcMessage::SysStatus(SysStatus {
                voltage_battery: d.voltage_battery,
                battery_remaining: d.battery_remaining,
            }),
            MavMessage::GPS_RAW_INT(d) => FcMessage::GpsRaw(GpsRaw {
                fix_type: d.fix_type as u8,
                satellites_visible: d.satellites_visible,
            }),
            other => FcMessage::Other {
                id: other.message_id(),
            },
        }
    }
}

/// A decoded message plus the ids of the component that sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub system_id: u8,
    pub component_id: u8,
    pub message: FcMessage,
}

impl Frame {
    pub fn new(system_id: u8, component_id: u8, message: FcMessage) -> Self {
        Self {
            system_id,
            component_id,
            message,
        }
    }
}
