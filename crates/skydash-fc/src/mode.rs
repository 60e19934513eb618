//! Flight-mode names from HEARTBEAT `custom_mode`.
//!
//! The meaning of `custom_mode` depends on the autopilot and on the vehicle
//! type: ArduCopter mode 6 is RTL while ArduPlane mode 6 is FBWB, and PX4
//! packs main/sub modes into the upper bytes.

pub const MODE_FLAG_CUSTOM_MODE_ENABLED: u8 = 0x01;
pub const MODE_FLAG_SAFETY_ARMED: u8 = 0x80;

const MAV_AUTOPILOT_PX4: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Autopilot {
    ArduPilot,
    Px4,
    Other(u8),
}

impl Autopilot {
    pub fn from_mav_autopilot(raw: u8) -> Self {
        match raw {
            3 => Autopilot::ArduPilot,
            MAV_AUTOPILOT_PX4 => Autopilot::Px4,
            other => Autopilot::Other(other),
        }
    }
}

/// Vehicle family, which selects the ArduPilot mode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleType {
    Copter,
    Plane,
    Rover,
    Sub,
    Tracker,
    Other(u8),
}

impl VehicleType {
    /// Maps a `MAV_TYPE` value.
    pub fn from_mav_type(raw: u8) -> Self {
        match raw {
            // quad, coax, heli, hexa, octo, tri, dodeca, deca
            2 | 3 | 4 | 13 | 14 | 15 | 29 | 35 => VehicleType::Copter,
            // fixed wing and the VTOL family flown by ArduPlane
            1 | 19..=25 => VehicleType::Plane,
            10 | 11 => VehicleType::Rover,
            12 => VehicleType::Sub,
            5 => VehicleType::Tracker,
            other => VehicleType::Other(other),
        }
    }
}

const COPTER_MODES: &[(u32, &str)] = &[
    (0, "STABILIZE"),
    (1, "ACRO"),
    (2, "ALT_HOLD"),
    (3, "AUTO"),
    (4, "GUIDED"),
    (5, "LOITER"),
    (6, "RTL"),
    (7, "CIRCLE"),
    (8, "POSITION"),
    (9, "LAND"),
    (10, "OF_LOITER"),
    (11, "DRIFT"),
    (13, "SPORT"),
    (14, "FLIP"),
    (15, "AUTOTUNE"),
    (16, "POSHOLD"),
    (17, "BRAKE"),
    (18, "THROW"),
    (19, "AVOID_ADSB"),
    (20, "GUIDED_NOGPS"),
    (21, "SMART_RTL"),
    (22, "FLOWHOLD"),
    (23, "FOLLOW"),
    (24, "ZIGZAG"),
    (25, "SYSTEMID"),
    (26, "AUTOROTATE"),
    (27, "AUTO_RTL"),
];

const PLANE_MODES: &[(u32, &str)] = &[
    (0, "MANUAL"),
    (1, "CIRCLE"),
    (2, "STABILIZE"),
    (3, "TRAINING"),
    (4, "ACRO"),
    (5, "FBWA"),
    (6, "FBWB"),
    (7, "CRUISE"),
    (8, "AUTOTUNE"),
    (10, "AUTO"),
    (11, "RTL"),
    (12, "LOITER"),
    (13, "TAKEOFF"),
    (14, "AVOID_ADSB"),
    (15, "GUIDED"),
    (16, "INITIALISING"),
    (17, "QSTABILIZE"),
    (18, "QHOVER"),
    (19, "QLOITER"),
    (20, "QLAND"),
    (21, "QRTL"),
    (22, "QAUTOTUNE"),
    (23, "QACRO"),
    (24, "THERMAL"),
];

const ROVER_MODES: &[(u32, &str)] = &[
    (0, "MANUAL"),
    (1, "ACRO"),
    (2, "LEARNING"),
    (3, "STEERING"),
    (4, "HOLD"),
    (5, "LOITER"),
    (6, "FOLLOW"),
    (7, "SIMPLE"),
    (10, "AUTO"),
    (11, "RTL"),
    (12, "SMART_RTL"),
    (15, "GUIDED"),
    (16, "INITIALISING"),
];

const SUB_MODES: &[(u32, &str)] = &[
    (0, "STABILIZE"),
    (1, "ACRO"),
    (2, "ALT_HOLD"),
    (3, "AUTO"),
    (4, "GUIDED"),
    (7, "CIRCLE"),
    (9, "SURFACE"),
    (16, "POSHOLD"),
    (19, "MANUAL"),
];

const TRACKER_MODES: &[(u32, &str)] = &[
    (0, "MANUAL"),
    (1, "STOP"),
    (2, "SCAN"),
    (3, "SERVO_TEST"),
    (10, "AUTO"),
    (16, "INITIALISING"),
];

const PX4_MAIN_MODES: &[(u32, &str)] = &[
    (1, "MANUAL"),
    (2, "ALTCTL"),
    (3, "POSCTL"),
    (5, "ACRO"),
    (6, "OFFBOARD"),
    (7, "STABILIZED"),
    (8, "RATTITUDE"),
];

const PX4_MAIN_MODE_AUTO: u32 = 4;

const PX4_AUTO_SUB_MODES: &[(u32, &str)] = &[
    (1, "READY"),
    (2, "TAKEOFF"),
    (3, "LOITER"),
    (4, "MISSION"),
    (5, "RTL"),
    (6, "LAND"),
    (7, "RTGS"),
    (8, "FOLLOW"),
    (9, "PRECLAND"),
];

fn lookup(table: &[(u32, &'static str)], key: u32) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, name)| *name)
}

/// Human-readable flight mode for a heartbeat.
pub fn mode_name(autopilot: Autopilot, vehicle: VehicleType, base_mode: u8, custom_mode: u32) -> String {
    if autopilot == Autopilot::Px4 {
        return px4_mode_name(custom_mode).to_string();
    }

    if base_mode & MODE_FLAG_CUSTOM_MODE_ENABLED == 0 {
        return format!("Mode(0x{:08x})", base_mode);
    }

    let table: &[(u32, &str)] = match vehicle {
        VehicleType::Copter => COPTER_MODES,
        VehicleType::Plane => PLANE_MODES,
        VehicleType::Rover => ROVER_MODES,
        VehicleType::Sub => SUB_MODES,
        VehicleType::Tracker => TRACKER_MODES,
        VehicleType::Other(_) => &[],
    };

    match lookup(table, custom_mode) {
        Some(name) => name.to_string(),
        None => format!("Mode({})", custom_mode),
    }
}

fn px4_mode_name(custom_mode: u32) -> &'static str {
    let main = (custom_mode >> 16) & 0xff;
    let sub = (custom_mode >> 24) & 0xff;

    if main == PX4_MAIN_MODE_AUTO {
        return lookup(PX4_AUTO_SUB_MODES, sub).unwrap_or("AUTO");
    }
    lookup(PX4_MAIN_MODES, main).unwrap_or("UNKNOWN")
}
