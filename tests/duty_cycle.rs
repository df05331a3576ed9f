use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use waypoint_tracker::tracker::config::ReconnectPolicy;
use waypoint_tracker::tracker::geofence::EARTH_RADIUS_KM;
use waypoint_tracker::tracker::ports::ModemProfile;
use waypoint_tracker::tracker::sim::{MemoryIo, SimAudio, SimClock, SimModem};
use waypoint_tracker::tracker::{
    BootContext, ConnectivityError, Fix, LinkState, PositionBuffer, PowerDecision, Tracker,
    TrackerConfig, Waypoint,
};

const FIRST_LAT: f64 = 50.0;
const FIRST_LON: f64 = 14.0;
const NOW: u64 = 1_700_000_000;

fn meters_north(meters: f64) -> f64 {
    FIRST_LAT + meters / (EARTH_RADIUS_KM * 1000.0) * 180.0 / std::f64::consts::PI
}

fn two_stop_route() -> TrackerConfig {
    TrackerConfig::default()
        .with_tracker_id(3)
        .with_topic("tracker/3/position")
        .unwrap()
        .with_arrival_radius_m(100.0)
        .with_minimal_accuracy_m(30.0)
        .with_waypoint(Waypoint::new(10, FIRST_LAT, FIRST_LON, "first.mp3").unwrap())
        .unwrap()
        .with_waypoint(Waypoint::new(11, FIRST_LAT + 0.01, FIRST_LON, "second.mp3").unwrap())
        .unwrap()
}

fn fix_at(meters: f64, ts: u64) -> Fix {
    Fix::new(meters_north(meters), FIRST_LON, 240.0, ts)
}

#[test]
fn route_progress_with_offline_replay() {
    let config = two_stop_route();
    let buffer = PositionBuffer::<NoopRawMutex>::for_timings(
        config.reconnect_timeout_s,
        config.duty_cycle_s,
    );
    let mut tracker = Tracker::boot(&config, MemoryIo::new(), &buffer, BootContext::cold());
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    let mut audio = SimAudio::new();

    // 200 m short of the first waypoint.
    modem.push_fix(fix_at(200.0, NOW), 5.0);
    let first = block_on(tracker.run_cycle(&mut modem, &mut clock, &mut audio));
    assert!(first.reached.is_none());
    assert_eq!(first.sent, 1);
    assert_eq!(first.decision, PowerDecision::Sleep);
    assert_eq!(tracker.visited_waypoint_count(), 0);

    // 10 m away with good accuracy.
    modem.push_fix(fix_at(10.0, NOW + 60), 5.0);
    let second = block_on(tracker.run_cycle(&mut modem, &mut clock, &mut audio));
    let reached = second.reached.expect("arrival at the first waypoint");
    assert_eq!(reached.waypoint.id, 10);
    assert!(reached.persisted);
    assert_eq!(tracker.visited_waypoint_count(), 1);
    assert_eq!(audio.announced.len(), 1);
    assert_eq!(audio.announced[0].as_str(), "first.mp3");

    // The broker drops the next publish: the fix waits in the buffer.
    modem.script_publish(false);
    modem.push_fix(fix_at(40.0, NOW + 120), 5.0);
    let third = block_on(tracker.run_cycle(&mut modem, &mut clock, &mut audio));
    assert_eq!(third.sent, 0);
    assert_eq!(third.buffered, 1);
    assert!(third.reached.is_none());

    // Next cycle sends the fresh fix and replays the buffered one.
    modem.push_fix(fix_at(60.0, NOW + 180), 5.0);
    let fourth = block_on(tracker.run_cycle(&mut modem, &mut clock, &mut audio));
    assert_eq!(fourth.sent, 2);
    assert_eq!(fourth.buffered, 0);
    assert!(buffer.is_empty());
    assert_eq!(tracker.visited_waypoint_count(), 1);

    assert_eq!(modem.published.len(), 4);
    assert!(modem.published[3].contains(&format!("\"timestamp\":{}", NOW + 120)));
    assert!(modem.published[3].contains("\"visited_waypoints\":1"));

    // Power loss: a fresh boot resumes at the second waypoint.
    let io = tracker.into_persistence();
    let rebooted = Tracker::boot(&config, io, &buffer, BootContext::timer_wake());
    assert_eq!(rebooted.visited_waypoint_count(), 1);
}

#[test]
fn low_accuracy_fix_is_neither_checked_nor_sent() {
    let config = two_stop_route();
    let buffer = PositionBuffer::<NoopRawMutex>::new(4);
    let mut tracker = Tracker::boot(&config, MemoryIo::new(), &buffer, BootContext::cold());
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    let mut audio = SimAudio::new();

    modem.push_fix(fix_at(0.0, NOW), 80.0);
    let report = block_on(tracker.run_cycle(&mut modem, &mut clock, &mut audio));
    assert_eq!(report.fix_error, Some(ConnectivityError::AccuracyTooLow));
    assert!(report.reached.is_none());
    assert_eq!(report.sent, 0);
    assert_eq!(report.buffered, 0);
    assert_eq!(modem.stats.fix_reads, 1);
    assert_eq!(modem.pending_fixes(), 0);
    assert_eq!(tracker.visited_waypoint_count(), 0);
}

#[test]
fn out_of_range_fix_is_never_buffered() {
    let config = two_stop_route();
    let buffer = PositionBuffer::<NoopRawMutex>::new(4);
    let mut tracker = Tracker::boot(&config, MemoryIo::new(), &buffer, BootContext::cold());
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    let mut audio = SimAudio::new();

    for _ in 0..4 {
        modem.push_fix(Fix::new(123.0, FIRST_LON, 0.0, NOW), 5.0);
    }
    let report = block_on(tracker.run_cycle(&mut modem, &mut clock, &mut audio));
    assert_eq!(
        report.fix_error,
        Some(ConnectivityError::CoordinatesOutOfRange)
    );
    assert_eq!(report.buffered, 0);
    assert_eq!(report.decision, PowerDecision::Restart);
}

#[test]
fn dead_network_buffers_fix_and_restarts() {
    let config = two_stop_route().with_reconnect_policy(ReconnectPolicy {
        attempt_budget: 3,
        ..ReconnectPolicy::default()
    });
    let buffer = PositionBuffer::<NoopRawMutex>::new(4);
    let mut tracker = Tracker::boot(&config, MemoryIo::new(), &buffer, BootContext::cold());
    let mut modem = SimModem::new(ModemProfile::Sim868);
    modem.network_available = false;
    let mut clock = SimClock::new();
    let mut audio = SimAudio::new();

    modem.push_fix(fix_at(5_000.0, NOW), 5.0);
    let report = block_on(tracker.run_cycle(&mut modem, &mut clock, &mut audio));
    assert_eq!(report.link_error, Some(ConnectivityError::NetworkUnavailable));
    assert_eq!(modem.stats.network_waits, 3);
    assert_eq!(report.buffered, 1);
    assert_eq!(tracker.buffered(), 1);
    assert_eq!(tracker.link_state(), LinkState::Degraded);
    // Restart wins even though the device is far from any waypoint.
    assert_eq!(report.decision, PowerDecision::Restart);
    assert_eq!(modem.stats.low_power_entries, 0);
}

#[test]
fn broker_rejecting_every_publish_ends_in_restart() {
    let config = two_stop_route();
    let buffer = PositionBuffer::<NoopRawMutex>::new(4);
    let mut tracker = Tracker::boot(&config, MemoryIo::new(), &buffer, BootContext::cold());
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    let mut audio = SimAudio::new();
    let budget = ReconnectPolicy::default().attempt_budget;

    let mut decisions = Vec::new();
    for step in 0..u64::from(budget) {
        // Close enough to the first waypoint to keep the device awake.
        modem.push_fix(fix_at(130.0, NOW + step * 30), 5.0);
        modem.script_publish(false);
        let report = block_on(tracker.run_cycle(&mut modem, &mut clock, &mut audio));
        decisions.push(report.decision);
    }

    let (last, earlier) = decisions.split_last().expect("at least one cycle");
    assert!(earlier.iter().all(|d| *d == PowerDecision::StayAwake));
    assert_eq!(*last, PowerDecision::Restart);
    assert_eq!(tracker.link_state(), LinkState::Degraded);
    assert_eq!(modem.stats.session_opens, u32::from(budget));
    assert_eq!(modem.stats.publishes, u32::from(budget));
    assert_eq!(tracker.buffered(), buffer.capacity());
    assert!(modem.published.is_empty());
}

#[test]
fn near_waypoint_keeps_device_awake() {
    let config = two_stop_route();
    let buffer = PositionBuffer::<NoopRawMutex>::new(4);
    let mut tracker = Tracker::boot(&config, MemoryIo::new(), &buffer, BootContext::cold());
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    let mut clock = SimClock::new();
    let mut audio = SimAudio::new();

    modem.push_fix(fix_at(130.0, NOW), 5.0);
    let report = block_on(tracker.run_cycle(&mut modem, &mut clock, &mut audio));
    assert!(report.reached.is_none());
    assert_eq!(report.decision, PowerDecision::StayAwake);
    assert_eq!(modem.stats.low_power_entries, 0);
}

#[test]
fn buffer_keeps_only_recent_fixes_while_offline() {
    let config = two_stop_route();
    let buffer = PositionBuffer::<NoopRawMutex>::new(2);
    let mut tracker = Tracker::boot(&config, MemoryIo::new(), &buffer, BootContext::timer_wake());
    let mut modem = SimModem::new(ModemProfile::Sim7000g);
    modem.broker_available = false;
    let mut clock = SimClock::new();
    let mut audio = SimAudio::new();

    for step in 0..3u64 {
        modem.push_fix(fix_at(5_000.0, NOW + step * 60), 5.0);
        block_on(tracker.run_cycle(&mut modem, &mut clock, &mut audio));
        assert!(buffer.len() <= buffer.capacity());
    }
    assert_eq!(buffer.dequeue_next().map(|f| f.epoch_seconds), Some(NOW + 120));
    assert_eq!(buffer.dequeue_next().map(|f| f.epoch_seconds), Some(NOW + 60));
    assert!(buffer.is_empty());
}
