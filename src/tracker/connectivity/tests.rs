use embassy_futures::block_on;

use super::super::checkpoint::{Checkpoint, CheckpointStore};
use super::super::config::{
    ReconnectPolicy, TrackerConfig, FAST_FIX_REFRESH_INTERVAL_S, NETWORK_COOLDOWN_MS,
};
use super::super::ports::{ModemProfile, Qos, RadioMode};
use super::super::report::PositionReport;
use super::super::sim::{MemoryIo, SimClock, SimModem};
use super::super::types::{Fix, FixError};
use super::bringup::assistance_due;
use super::*;

const NOW: Timestamp = 1_700_000_000;

fn config() -> TrackerConfig {
    TrackerConfig::default()
        .with_tracker_id(9)
        .with_topic("trackers/9")
        .unwrap()
        .with_broker("broker.local", 8884)
        .unwrap()
}

fn store() -> CheckpointStore<MemoryIo> {
    CheckpointStore::load(MemoryIo::new())
}

fn good_fix() -> Fix {
    Fix::new(50.0, 14.0, 300.0, NOW)
}

#[test]
fn brings_all_layers_up_in_order() {
    let config = config();
    let mut link = Connectivity::new(&config, false);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    let mut checkpoint = store();

    let result = block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW)));
    assert_eq!(result, Ok(()));
    assert_eq!(link.state(), LinkState::Ready);
    assert_eq!(modem.stats.power_cycles, 1);
    assert_eq!(modem.last_radio_mode, Some(RadioMode::LteCatM));
    assert_eq!(modem.stats.session_opens, 1);
    assert_eq!(modem.stats.last_session_clean, Some(true));
    assert_eq!(modem.stats.last_session_port, Some(8884));
    assert!(!link.restart_requested());
}

#[test]
fn ready_link_is_not_touched_again() {
    let config = config();
    let mut link = Connectivity::new(&config, true);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    let mut checkpoint = store();

    block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW))).unwrap();
    let stats = modem.stats;
    block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW))).unwrap();
    assert_eq!(modem.stats, stats);
    assert_eq!(modem.stats.power_cycles, 0);
}

#[test]
fn dead_network_exhausts_budget_exactly() {
    let config = config();
    let mut link = Connectivity::new(&config, false);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    modem.network_available = false;
    let mut clock = SimClock::new();
    let mut checkpoint = store();

    let result = block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW)));
    let budget = ReconnectPolicy::default().attempt_budget;
    assert_eq!(result, Err(ConnectivityError::NetworkUnavailable));
    assert_eq!(modem.stats.network_waits, u32::from(budget));
    assert_eq!(link.state(), LinkState::Degraded);
    assert!(link.restart_requested());
    assert_eq!(
        link.classify(ConnectivityError::NetworkUnavailable),
        ErrorClass::Fatal
    );

    // Each retry waited out the cool-down since the previous attempt.
    let min_elapsed = NETWORK_COOLDOWN_MS * (u64::from(budget) - 1);
    assert!(clock.now_ms >= min_elapsed);
}

#[test]
fn degraded_session_fails_fast() {
    let config = config();
    let mut link = Connectivity::new(&config, false);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    modem.network_available = false;
    let mut clock = SimClock::new();
    let mut checkpoint = store();

    let _ = block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW)));
    let waits = modem.stats.network_waits;
    modem.network_available = true;
    let again = block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW)));
    assert_eq!(again, Err(ConnectivityError::NetworkUnavailable));
    assert_eq!(modem.stats.network_waits, waits);
}

#[test]
fn network_retries_respect_cooldown() {
    let config = config();
    let mut link = Connectivity::new(&config, false);
    let mut modem = SimModem::new(ModemProfile::Sim868);
    let mut clock = SimClock::new();

    modem.network_available = false;
    assert!(!block_on(link.connect_network(&mut modem, &mut clock)));
    let first_attempt = clock.now_ms;
    clock.advance_ms(10_000);
    modem.network_available = true;
    assert!(block_on(link.connect_network(&mut modem, &mut clock)));
    assert!(clock.now_ms - first_attempt >= NETWORK_COOLDOWN_MS);
    assert_eq!(modem.last_radio_mode, Some(RadioMode::GsmOnly));
    // Cold boot cycle plus the retry after the failure.
    assert_eq!(modem.stats.power_cycles, 2);
}

#[test]
fn messaging_retries_with_fixed_delay() {
    let config = config();
    let mut link = Connectivity::new(&config, true);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    modem.session_failures_remaining = 2;
    let mut clock = SimClock::new();
    let mut checkpoint = store();

    block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW))).unwrap();
    assert_eq!(modem.stats.session_opens, 3);
    assert_eq!(modem.stats.last_session_clean, Some(false));
    assert!(link.last_error().is_none());
}

#[test]
fn unreachable_broker_reports_messaging_unavailable() {
    let config = config().with_reconnect_policy(ReconnectPolicy {
        attempt_budget: 2,
        messaging_max_attempts: 3,
        ..ReconnectPolicy::default()
    });
    let mut link = Connectivity::new(&config, true);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    modem.broker_available = false;
    let mut clock = SimClock::new();
    let mut checkpoint = store();

    let result = block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW)));
    assert_eq!(result, Err(ConnectivityError::MessagingUnavailable));
    assert_eq!(modem.stats.session_opens, 6);
    assert_eq!(link.state(), LinkState::Degraded);
}

#[test]
fn fix_poll_aborts_when_network_drops() {
    let config = config().with_reconnect_policy(ReconnectPolicy {
        attempt_budget: 1,
        ..ReconnectPolicy::default()
    });
    let mut link = Connectivity::new(&config, true);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    modem.detach_during_poll = true;
    let mut clock = SimClock::new();
    let mut checkpoint = store();

    let result = block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW)));
    assert_eq!(modem.stats.fix_polls, 1);
    assert_eq!(result, Err(ConnectivityError::NetworkUnavailable));
}

#[test]
fn assistance_refresh_is_throttled_and_persisted() {
    assert!(assistance_due(0, Some(NOW)));
    assert!(!assistance_due(NOW - 10, Some(NOW)));
    assert!(assistance_due(NOW - FAST_FIX_REFRESH_INTERVAL_S, Some(NOW)));
    assert!(!assistance_due(0, None));

    let config = config();
    let mut link = Connectivity::new(&config, true);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    let mut checkpoint = store();
    block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW))).unwrap();
    assert_eq!(modem.stats.assistance_refreshes, 1);
    assert_eq!(modem.stats.cold_starts, 1);
    assert_eq!(checkpoint.checkpoint().last_fast_fix_update, NOW);
}

#[test]
fn fresh_assistance_means_hot_start() {
    let config = config();
    let mut link = Connectivity::new(&config, true);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    let mut io = MemoryIo::new();
    io.record = Some(
        Checkpoint {
            last_fast_fix_update: NOW - 3_600,
            ..Checkpoint::default()
        }
        .to_record(),
    );
    let mut checkpoint = CheckpointStore::load(io);
    block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW))).unwrap();
    assert_eq!(modem.stats.assistance_refreshes, 0);
    assert_eq!(modem.stats.hot_starts, 1);
}

#[test]
fn sim868_never_downloads_assistance() {
    let config = config();
    let mut link = Connectivity::new(&config, true);
    let mut modem = SimModem::new(ModemProfile::Sim868);
    let mut clock = SimClock::new();
    let mut checkpoint = store();
    block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW))).unwrap();
    assert_eq!(modem.stats.assistance_refreshes, 0);
}

#[test]
fn send_requires_ready() {
    let config = config();
    let mut link = Connectivity::new(&config, true);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let clock = SimClock::new();
    let report = PositionReport::new(9, 0, good_fix());
    let result = block_on(link.send_fix(&mut modem, &clock, &report));
    assert_eq!(result, Err(ConnectivityError::NotReady));
    assert_eq!(modem.stats.publishes, 0);
}

#[test]
fn failed_publish_marks_session_lost_without_retry() {
    let config = config();
    let mut link = Connectivity::new(&config, true);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    let mut checkpoint = store();
    block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW))).unwrap();

    modem.script_publish(false);
    let report = PositionReport::new(9, 0, good_fix());
    let result = block_on(link.send_fix(&mut modem, &clock, &report));
    assert_eq!(result, Err(ConnectivityError::TransmitFailed));
    assert_eq!(modem.stats.publishes, 1);
    assert_eq!(modem.stats.last_publish_qos, Some(Qos::AtLeastOnce));
    assert_eq!(link.state(), LinkState::PositioningUp);
    assert_eq!(
        link.classify(ConnectivityError::TransmitFailed),
        ErrorClass::Connectivity
    );

    // The modem still claims an open session; it is reopened anyway.
    block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW))).unwrap();
    assert_eq!(modem.stats.session_opens, 2);
    assert!(block_on(link.send_fix(&mut modem, &clock, &report)).is_ok());
    assert_eq!(modem.published.len(), 1);
    assert!(modem.published[0].contains("\"tracker_id\":9"));
}

#[test]
fn repeated_publish_failures_exhaust_budget() {
    let config = config();
    let mut link = Connectivity::new(&config, true);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    let mut checkpoint = store();
    let report = PositionReport::new(9, 0, good_fix());
    let budget = ReconnectPolicy::default().attempt_budget;

    for attempt in 1..=budget {
        block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW))).unwrap();
        modem.script_publish(false);
        let result = block_on(link.send_fix(&mut modem, &clock, &report));
        assert_eq!(result, Err(ConnectivityError::TransmitFailed));
        assert_eq!(link.restart_requested(), attempt == budget);
    }
    assert_eq!(modem.stats.session_opens, u32::from(budget));
    assert_eq!(link.state(), LinkState::Degraded);
    assert_eq!(
        link.classify(ConnectivityError::TransmitFailed),
        ErrorClass::Fatal
    );

    let again = block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW)));
    assert_eq!(again, Err(ConnectivityError::TransmitFailed));
    assert_eq!(modem.stats.session_opens, u32::from(budget));
}

#[test]
fn delivered_publish_resets_transmit_failures() {
    let config = config().with_reconnect_policy(ReconnectPolicy {
        attempt_budget: 2,
        ..ReconnectPolicy::default()
    });
    let mut link = Connectivity::new(&config, true);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    let mut checkpoint = store();
    let report = PositionReport::new(9, 0, good_fix());

    for delivered in [false, true, false, true] {
        block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW))).unwrap();
        modem.script_publish(delivered);
        let _ = block_on(link.send_fix(&mut modem, &clock, &report));
    }
    assert!(!link.restart_requested());
    assert_eq!(link.state(), LinkState::Ready);
    assert_eq!(modem.published.len(), 2);
}

#[test]
fn unserializable_report_is_rejected() {
    let config = config();
    let mut link = Connectivity::new(&config, true);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    let mut checkpoint = store();
    block_on(link.ensure_ready(&mut modem, &mut clock, &mut checkpoint, Some(NOW))).unwrap();

    let report = PositionReport::new(9, 0, Fix::new(10.0, 10.0, f64::NAN, NOW));
    let result = block_on(link.send_fix(&mut modem, &clock, &report));
    assert_eq!(result, Err(ConnectivityError::SerializationFailed));
    assert!(result.unwrap_err().discards_fix());
    assert_eq!(modem.stats.publishes, 0);
}

#[test]
fn low_accuracy_is_not_retried() {
    let config = config();
    let mut link = Connectivity::new(&config, true);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    modem.push_fix(good_fix(), config.minimal_accuracy_m + 1.0);
    let result = block_on(link.acquire_fix(&mut modem, &mut clock));
    assert_eq!(result, Err(ConnectivityError::AccuracyTooLow));
    assert_eq!(modem.stats.fix_reads, 1);
    assert!(!link.restart_requested());
}

#[test]
fn read_errors_retry_then_request_restart() {
    let config = config();
    let mut link = Connectivity::new(&config, true);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    let result = block_on(link.acquire_fix(&mut modem, &mut clock));
    let max = ReconnectPolicy::default().fix_read_max_failures;
    assert_eq!(result, Err(ConnectivityError::PositioningUnavailable));
    assert_eq!(modem.stats.fix_reads, u32::from(max));
    assert_eq!(clock.sleeps, u32::from(max) - 1);
    assert!(link.restart_requested());
}

#[test]
fn missing_altitude_is_not_retried_as_out_of_range() {
    let config = config();
    let mut link = Connectivity::new(&config, true);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    modem.push_fix(Fix::new(50.0, 14.0, f64::NAN, NOW), 5.0);
    let reading = block_on(link.acquire_fix(&mut modem, &mut clock)).unwrap();
    assert!(reading.fix.altitude.is_nan());
    assert_eq!(modem.stats.fix_reads, 1);
    assert_eq!(modem.pending_fixes(), 0);
    assert!(!link.restart_requested());
}

#[test]
fn transient_read_error_recovers() {
    let config = config();
    let mut link = Connectivity::new(&config, true);
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    modem.push_fix_error(FixError::NotConnected);
    modem.push_fix(Fix::new(95.0, 0.0, 0.0, NOW), 5.0);
    modem.push_fix(good_fix(), 5.0);
    let reading = block_on(link.acquire_fix(&mut modem, &mut clock)).unwrap();
    assert_eq!(reading.fix, good_fix());
    assert_eq!(modem.stats.fix_reads, 3);
    assert!(!link.restart_requested());
}
