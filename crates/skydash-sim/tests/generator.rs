//! Behavioural tests for the synthetic telemetry generator.

use rand::rngs::StdRng;
use rand::SeedableRng;

use skydash_proto::{FlightStatus, TelemetryProvider};
use skydash_sim::{SimParams, SyntheticConfig, SyntheticGenerator, SyntheticProvider};

fn generator(params: SimParams) -> SyntheticGenerator {
    SyntheticGenerator::with_rng(params, StdRng::seed_from_u64(7)).unwrap()
}

/// Drains 0.1 V per call so the floor is reached within a few dozen calls.
fn fast_drain() -> SimParams {
    SimParams {
        drain_per_call: 0.1,
        ..SimParams::default()
    }
}

#[test]
fn test_altitude_stays_within_amplitude() {
    let params = SimParams::default();
    let mut gen = generator(params);
    let lo = params.base_altitude_m - params.amplitude_m;
    let hi = params.base_altitude_m + params.amplitude_m;

    let mut t = 0.0;
    while t < 600.0 {
        let rec = gen.next_at(t);
        assert!(
            rec.altitude >= lo && rec.altitude <= hi,
            "altitude {} out of range at t={}",
            rec.altitude,
            t
        );
        assert_eq!(rec.gps.altitude, rec.altitude);
        t += 0.37;
    }
}

#[test]
fn test_altitude_hits_both_extremes() {
    let params = SimParams::default();
    let mut gen = generator(params);
    let quarter = std::f64::consts::FRAC_PI_2 / params.omega_rad_s;

    assert_eq!(gen.next_at(quarter).altitude, 55.0);
    assert_eq!(gen.next_at(3.0 * quarter).altitude, 45.0);
}

#[test]
fn test_battery_non_increasing_and_floored() {
    let params = fast_drain();
    let mut gen = generator(params);

    let mut last = f64::MAX;
    for _ in 0..100 {
        let rec = gen.next_at(1.0);
        assert!(rec.battery_voltage <= last);
        assert!(rec.battery_voltage >= params.floor_voltage);
        last = rec.battery_voltage;
    }
    assert_eq!(last, params.floor_voltage);
}

#[test]
fn test_rtl_latches_at_floor() {
    let mut gen = generator(fast_drain());

    let mut seen_rtl = false;
    for _ in 0..60 {
        let rec = gen.next_at(2.0);
        if seen_rtl {
            assert_eq!(rec.status, FlightStatus::Rtl);
            assert!(!rec.armed);
            assert_eq!(rec.flight_mode, "RTL");
        } else if rec.status == FlightStatus::Rtl {
            seen_rtl = true;
            assert_eq!(rec.battery_voltage, 14.0);
        } else {
            assert_eq!(rec.status, FlightStatus::Armed);
            assert!(rec.armed);
            assert_eq!(rec.flight_mode, "STABILIZE");
        }
    }
    assert!(seen_rtl, "never reached the voltage floor");
}

#[test]
fn test_reset_restores_battery_and_status() {
    let params = fast_drain();
    let mut gen = generator(params);
    for _ in 0..40 {
        gen.next_at(0.0);
    }
    assert_eq!(gen.next_at(0.0).status, FlightStatus::Rtl);

    gen.reset();
    assert_eq!(gen.calls(), 0);
    assert_eq!(gen.battery_voltage(), params.initial_voltage);

    let rec = gen.next();
    assert_eq!(rec.status, FlightStatus::Armed);
    assert_eq!(gen.calls(), 1);
    assert_eq!(rec.battery_voltage, 16.7);
}

#[tokio::test]
async fn test_provider_serves_records() {
    let provider = SyntheticProvider::new(&SyntheticConfig {
        seed: Some(11),
        drain_per_call: Some(0.5),
        ..Default::default()
    })
    .unwrap();

    assert_eq!(provider.name(), "synthetic");
    let first = provider.telemetry().await;
    assert_eq!(first.status, FlightStatus::Armed);
    assert_eq!(first.battery_voltage, 16.3);

    for _ in 0..10 {
        provider.telemetry().await;
    }
    assert_eq!(provider.telemetry().await.status, FlightStatus::Rtl);
    assert_eq!(provider.battery_percent(), 0);

    provider.reset();
    assert_eq!(provider.battery_percent(), 100);
    assert_eq!(provider.telemetry().await.status, FlightStatus::Armed);
}
