//! Streaming ingestor lifecycle and record assembly over a fake link.

mod common;

use std::time::{Duration, Instant};

use common::*;
use skydash_fc::{ConnectError, IngestSettings, LinkState, SourceError, StreamTarget, StreamingIngestor};
use skydash_proto::{FlightStatus, TelemetryProvider, TelemetryRecord};

#[tokio::test]
async fn test_connect_requests_streams_from_heartbeat_sender() {
    let ing = StreamingIngestor::new(fast_settings());
    let vehicle = connected(&ing).await;

    assert_eq!(ing.state(), LinkState::Streaming);
    assert_eq!(
        vehicle.requests(),
        vec![(
            StreamTarget {
                system_id: VEHICLE_SYS,
                component_id: VEHICLE_COMP
            },
            10
        )]
    );
    ing.disconnect().await;
}

#[tokio::test]
async fn test_frames_before_heartbeat_are_skipped() {
    let ing = StreamingIngestor::new(fast_settings());
    let (vehicle, source) = fake_link();
    vehicle.send(position(1, 2, 3000));
    vehicle.heartbeat(true, 5);
    ing.connect_with(source).await.unwrap();

    let f = ing.fields();
    assert_eq!(f.relative_alt, None);
    assert_eq!(f.last_heartbeat, None);
    ing.disconnect().await;
}

#[tokio::test]
async fn test_roll_in_degrees() {
    let ing = StreamingIngestor::new(fast_settings());
    let vehicle = connected(&ing).await;

    vehicle.send(attitude(1.0, 0.0, 0.0));
    wait_for(&ing, |f| f.roll.is_some()).await;

    let rec = ing.telemetry().await;
    assert!((rec.attitude.roll - 57.30).abs() <= 0.01, "roll {}", rec.attitude.roll);
    ing.disconnect().await;
}

#[tokio::test]
async fn test_relative_altitude_in_meters() {
    let ing = StreamingIngestor::new(fast_settings());
    let vehicle = connected(&ing).await;

    vehicle.send(position(473_977_418, 85_455_938, 12_500));
    wait_for(&ing, |f| f.relative_alt.is_some()).await;

    let rec = ing.telemetry().await;
    assert_eq!(rec.altitude, 12.5);
    assert!((rec.gps.latitude - 47.3977418).abs() < 1e-9);
    assert!((rec.gps.longitude - 8.5455938).abs() < 1e-9);
    ing.disconnect().await;
}

#[tokio::test]
async fn test_live_status_and_battery() {
    let ing = StreamingIngestor::new(fast_settings());
    let vehicle = connected(&ing).await;

    // no heartbeat applied yet
    assert_eq!(ing.telemetry().await.status, FlightStatus::Unknown);

    vehicle.heartbeat(true, 5);
    vehicle.send(battery(15_900, 64));
    wait_for(&ing, |f| f.battery_voltage.is_some() && f.armed.is_some()).await;

    let rec = ing.telemetry().await;
    assert_eq!(rec.status, FlightStatus::Armed);
    assert!(rec.armed);
    assert_eq!(rec.flight_mode, "LOITER");
    assert_eq!(rec.battery_voltage, 15.9);
    assert_eq!(rec.signal_strength, 0);
    assert_eq!(ing.fields().battery_remaining.map(|s| s.value), Some(64));

    vehicle.heartbeat(true, 6);
    wait_for(&ing, |f| f.flight_mode.as_ref().map(|s| s.value.as_str()) == Some("RTL")).await;
    assert_eq!(ing.telemetry().await.status, FlightStatus::Rtl);
    ing.disconnect().await;
}

#[tokio::test]
async fn test_stale_heartbeat_reports_disconnected() {
    let ing = StreamingIngestor::new(IngestSettings {
        link_timeout: Duration::from_millis(50),
        ..fast_settings()
    });
    let vehicle = connected(&ing).await;

    vehicle.heartbeat(false, 0);
    wait_for(&ing, |f| f.last_heartbeat.is_some()).await;
    assert_eq!(ing.telemetry().await.status, FlightStatus::Disarmed);

    tokio::time::sleep(Duration::from_millis(120)).await;
    let rec = ing.telemetry().await;
    assert_eq!(rec.status, FlightStatus::Disconnected);
    assert_eq!(ing.state(), LinkState::Streaming);
    ing.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_before_any_message_is_bounded() {
    let settings = fast_settings();
    let ing = StreamingIngestor::new(settings);
    let vehicle = connected(&ing).await;

    let started = Instant::now();
    ing.disconnect().await;
    assert!(started.elapsed() < settings.recv_timeout * 3);

    assert_eq!(ing.state(), LinkState::Stopped);
    assert!(vehicle.is_closed());
    let rec = ing.telemetry().await;
    assert_eq!(rec, TelemetryRecord::disconnected(rec.timestamp));
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let ing = StreamingIngestor::new(fast_settings());
    let _vehicle = connected(&ing).await;
    ing.disconnect().await;
    ing.disconnect().await;
    assert_eq!(ing.state(), LinkState::Stopped);
}

#[tokio::test]
async fn test_no_heartbeat_times_out() {
    let settings = fast_settings();
    let ing = StreamingIngestor::new(settings);
    let (vehicle, source) = fake_link();
    vehicle.send(attitude(0.1, 0.1, 0.1));

    let err = ing.connect_with(source).await.unwrap_err();
    assert!(matches!(err, ConnectError::NoHeartbeat(d) if d == settings.heartbeat_timeout));
    assert_eq!(ing.state(), LinkState::Error);
    assert!(vehicle.is_closed());
    assert!(vehicle.requests().is_empty());
}

#[tokio::test]
async fn test_closed_during_handshake() {
    let ing = StreamingIngestor::new(fast_settings());
    let (vehicle, source) = fake_link();
    drop(vehicle);

    let err = ing.connect_with(source).await.unwrap_err();
    assert!(matches!(err, ConnectError::Handshake(SourceError::Closed)));
    assert_eq!(ing.state(), LinkState::Error);
}

#[tokio::test]
async fn test_stalled_stream_request_times_out() {
    let settings = fast_settings();
    let ing = StreamingIngestor::new(settings);
    let (vehicle, source) = fake_link();
    vehicle.stall_uplink();
    vehicle.heartbeat(false, 0);

    let started = Instant::now();
    let err = ing.connect_with(source).await.unwrap_err();
    assert!(started.elapsed() < settings.heartbeat_timeout + settings.recv_timeout * 5);
    match err {
        ConnectError::StreamRequest(SourceError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::TimedOut),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(ing.state(), LinkState::Error);
    assert!(vehicle.is_closed());
}

#[tokio::test]
async fn test_open_that_never_completes_times_out() {
    let settings = fast_settings();
    let ing = StreamingIngestor::new(settings);

    // nobody ever dials in
    let started = Instant::now();
    let err = ing.connect("tcpin:127.0.0.1:0").await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(2));
    match err {
        ConnectError::Transport { source, .. } => assert_eq!(source.kind(), std::io::ErrorKind::TimedOut),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(ing.state(), LinkState::Error);
}

#[tokio::test]
async fn test_second_connect_rejected() {
    let ing = StreamingIngestor::new(fast_settings());
    let _vehicle = connected(&ing).await;

    let (other, source) = fake_link();
    other.heartbeat(false, 0);
    let err = ing.connect_with(source).await.unwrap_err();
    assert!(matches!(err, ConnectError::AlreadyConnected));
    assert_eq!(ing.state(), LinkState::Streaming);
    ing.disconnect().await;
}

#[tokio::test]
async fn test_transient_errors_keep_streaming() {
    let ing = StreamingIngestor::new(fast_settings());
    let vehicle = connected(&ing).await;

    vehicle.fail(SourceError::Decode("bad crc".into()));
    vehicle.fail(SourceError::Io(std::io::Error::new(std::io::ErrorKind::Other, "glitch")));
    vehicle.send(attitude(0.0, 1.0, 0.0));
    wait_for(&ing, |f| f.pitch.is_some()).await;

    assert_eq!(ing.state(), LinkState::Streaming);
    ing.disconnect().await;
}

#[tokio::test]
async fn test_closed_source_then_reconnect() {
    let ing = StreamingIngestor::new(fast_settings());
    let vehicle = connected(&ing).await;
    vehicle.send(position(10, 20, 5000));
    wait_for(&ing, |f| f.relative_alt.is_some()).await;

    drop(vehicle);
    let stopped = tokio::time::timeout(Duration::from_secs(2), async {
        while ing.state() != LinkState::Error {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(stopped.is_ok());
    assert_eq!(ing.telemetry().await.status, FlightStatus::Disconnected);
    // last known values survive until the next connect
    assert_eq!(ing.telemetry().await.altitude, 5.0);

    let _vehicle = connected(&ing).await;
    assert_eq!(ing.state(), LinkState::Streaming);
    assert_eq!(ing.fields().relative_alt, None);
    ing.disconnect().await;
}

#[tokio::test]
async fn test_reset_clears_fields() {
    let ing = StreamingIngestor::new(fast_settings());
    let vehicle = connected(&ing).await;
    vehicle.send(battery(12_000, 50));
    wait_for(&ing, |f| f.battery_voltage.is_some()).await;

    ing.reset();
    assert_eq!(ing.fields().battery_voltage, None);
    assert_eq!(ing.telemetry().await.battery_voltage, 0.0);
    ing.disconnect().await;
}
