#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use skydash_fc::message::{AttitudeRad, GlobalPosition, Heartbeat, SysStatus};
use skydash_fc::mode::{Autopilot, VehicleType, MODE_FLAG_CUSTOM_MODE_ENABLED, MODE_FLAG_SAFETY_ARMED};
use skydash_fc::{
    FcMessage, Fields, Frame, IngestSettings, MessageSource, SourceError, StreamTarget,
    StreamingIngestor,
};
use tokio::sync::mpsc;

pub const VEHICLE_SYS: u8 = 1;
pub const VEHICLE_COMP: u8 = 1;

/// Test side of a fake link: push frames or errors into the ingestor.
pub struct FakeVehicle {
    tx: mpsc::UnboundedSender<Result<Frame, SourceError>>,
    requests: Arc<Mutex<Vec<(StreamTarget, u16)>>>,
    closed: Arc<AtomicBool>,
    uplink_stalled: Arc<AtomicBool>,
}

pub struct FakeSource {
    rx: mpsc::UnboundedReceiver<Result<Frame, SourceError>>,
    requests: Arc<Mutex<Vec<(StreamTarget, u16)>>>,
    closed: Arc<AtomicBool>,
    uplink_stalled: Arc<AtomicBool>,
}

pub fn fake_link() -> (FakeVehicle, Box<dyn MessageSource>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(AtomicBool::new(false));
    let uplink_stalled = Arc::new(AtomicBool::new(false));
    let vehicle = FakeVehicle {
        tx,
        requests: requests.clone(),
        closed: closed.clone(),
        uplink_stalled: uplink_stalled.clone(),
    };
    let source = FakeSource {
        rx,
        requests,
        closed,
        uplink_stalled,
    };
    (vehicle, Box::new(source))
}

impl FakeVehicle {
    pub fn send(&self, msg: FcMessage) {
        let _ = self.tx.send(Ok(Frame::new(VEHICLE_SYS, VEHICLE_COMP, msg)));
    }

    pub fn fail(&self, err: SourceError) {
        let _ = self.tx.send(Err(err));
    }

    pub fn heartbeat(&self, armed: bool, custom_mode: u32) {
        self.send(heartbeat(armed, custom_mode));
    }

    pub fn requests(&self) -> Vec<(StreamTarget, u16)> {
        self.requests.lock().unwrap().clone()
    }

    /// Stream requests never complete, like a full serial buffer.
    pub fn stall_uplink(&self) {
        self.uplink_stalled.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl MessageSource for FakeSource {
    async fn recv(&mut self) -> Result<Frame, SourceError> {
        self.rx.recv().await.unwrap_or(Err(SourceError::Closed))
    }

    async fn request_streams(&mut self, target: StreamTarget, rate_hz: u16) -> Result<(), SourceError> {
        if self.uplink_stalled.load(Ordering::Acquire) {
            std::future::pending::<()>().await;
        }
        self.requests.lock().unwrap().push((target, rate_hz));
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// ArduCopter heartbeat.
pub fn heartbeat(armed: bool, custom_mode: u32) -> FcMessage {
    let mut base_mode = MODE_FLAG_CUSTOM_MODE_ENABLED;
    if armed {
        base_mode |= MODE_FLAG_SAFETY_ARMED;
    }
    FcMessage::Heartbeat(Heartbeat {
        autopilot: Autopilot::ArduPilot,
        vehicle: VehicleType::Copter,
        base_mode,
        custom_mode,
    })
}

pub fn attitude(roll: f32, pitch: f32, yaw: f32) -> FcMessage {
    FcMessage::Attitude(AttitudeRad { roll, pitch, yaw })
}

pub fn position(lat: i32, lon: i32, relative_alt: i32) -> FcMessage {
    FcMessage::GlobalPosition(GlobalPosition { lat, lon, relative_alt })
}

pub fn battery(voltage_mv: u16, remaining: i8) -> FcMessage {
    FcMessage::SysStatus(SysStatus {
        voltage_battery: voltage_mv,
        battery_remaining: remaining,
    })
}

pub fn fast_settings() -> IngestSettings {
    IngestSettings {
        heartbeat_timeout: Duration::from_millis(300),
        recv_timeout: Duration::from_millis(100),
        link_timeout: Duration::from_secs(5),
        ..IngestSettings::default()
    }
}

/// Connects `ing` over a fresh fake link, completing the handshake.
pub async fn connected(ing: &StreamingIngestor) -> FakeVehicle {
    let (vehicle, source) = fake_link();
    vehicle.heartbeat(false, 0);
    ing.connect_with(source).await.expect("connect");
    vehicle
}

/// Polls the store until `pred` holds, failing after two seconds.
pub async fn wait_for(ing: &StreamingIngestor, pred: impl Fn(&Fields) -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(2), async {
        while !pred(&ing.fields()) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "store never reached the expected state");
}
