use embassy_sync::blocking_mutex::raw::RawMutex;
use log::{info, warn};

use super::buffer::PositionBuffer;
use super::checkpoint::{Checkpoint, CheckpointStore};
use super::config::{TrackerConfig, AUDIO_SETTLE_MAX_MS, AUDIO_SETTLE_POLL_MS};
use super::connectivity::{Connectivity, ConnectivityError, ErrorClass, LinkState};
use super::geofence::GeofenceTracker;
use super::policy::{PowerInputs, SleepPolicy};
use super::ports::{AudioActivity, Clock, Modem, PersistError, PersistenceIo};
use super::report::PositionReport;
use super::telemetry;
use super::types::{BootContext, Fix, PowerDecision, Timestamp, WaypointReached};

/// What one duty cycle did and what should happen to the device next.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleReport {
    pub decision: PowerDecision,
    pub fix: Option<Fix>,
    pub reached: Option<WaypointReached>,
    pub sent: usize,
    pub buffered: usize,
    pub link_error: Option<ConnectivityError>,
    pub fix_error: Option<ConnectivityError>,
}

impl CycleReport {
    fn new() -> Self {
        Self {
            decision: PowerDecision::StayAwake,
            fix: None,
            reached: None,
            sent: 0,
            buffered: 0,
            link_error: None,
            fix_error: None,
        }
    }
}

pub struct Tracker<'a, P: PersistenceIo, M: RawMutex> {
    config: &'a TrackerConfig,
    geofence: GeofenceTracker<'a, P>,
    connectivity: Connectivity<'a>,
    buffer: &'a PositionBuffer<M>,
    policy: SleepPolicy,
    reset_stamp_pending: bool,
    now: Option<Timestamp>,
}

impl<'a, P: PersistenceIo, M: RawMutex> Tracker<'a, P, M> {
    /// Loads the checkpoint and builds a fresh link session. Runs once per
    /// power-up, including every wake from deep sleep.
    pub fn boot(
        config: &'a TrackerConfig,
        io: P,
        buffer: &'a PositionBuffer<M>,
        boot: BootContext,
    ) -> Self {
        let mut store = CheckpointStore::load(io);
        if boot.factory_reset_requested {
            warn!("tracker: factory reset requested, clearing checkpoint");
            let _ = store.clear();
        }
        let resumed = boot.wake_reason.resumed_from_sleep();
        let reset_stamp_pending = !resumed || store.checkpoint().last_reset_time == 0;
        let geofence = GeofenceTracker::new(config, store);
        info!(
            "tracker: boot wake={} visited={}/{} buffer_capacity={}",
            boot.wake_reason.as_str(),
            geofence.visited_waypoint_count(),
            config.route.len(),
            buffer.capacity()
        );
        Self {
            config,
            geofence,
            connectivity: Connectivity::new(config, resumed),
            buffer,
            policy: SleepPolicy::default(),
            reset_stamp_pending,
            now: None,
        }
    }

    pub fn with_policy(mut self, policy: SleepPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.geofence.checkpoint_store().checkpoint()
    }

    pub fn visited_waypoint_count(&self) -> u32 {
        self.geofence.visited_waypoint_count()
    }

    pub fn link_state(&self) -> LinkState {
        self.connectivity.state()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Operator clear while running: progress and any unsent fixes go.
    pub fn factory_reset(&mut self) -> Result<(), PersistError> {
        self.buffer.clear();
        warn!("tracker: factory reset, clearing checkpoint and buffer");
        self.geofence.reset_progress()
    }

    pub fn into_persistence(self) -> P {
        self.geofence.into_store().into_inner()
    }

    /// acquire fix -> geofence -> send or buffer -> drain backlog -> decide.
    pub async fn run_cycle<D, C, A>(
        &mut self,
        modem: &mut D,
        clock: &mut C,
        audio: &mut A,
    ) -> CycleReport
    where
        D: Modem,
        C: Clock,
        A: AudioActivity,
    {
        telemetry::record_duty_cycle();
        let mut report = CycleReport::new();

        modem.wake().await;
        self.refresh_time(modem).await;

        if let Err(err) = self
            .connectivity
            .ensure_ready(
                modem,
                clock,
                self.geofence.checkpoint_store_mut(),
                self.now,
            )
            .await
        {
            match self.connectivity.classify(err) {
                ErrorClass::Fatal => warn!("tracker: link down, restart pending err={}", err),
                _ => warn!("tracker: link not ready err={}", err),
            }
            report.link_error = Some(err);
        }

        match self.connectivity.acquire_fix(modem, clock).await {
            Ok(reading) => {
                report.fix = Some(reading.fix);
                if let Some(reached) = self.geofence.check_arrival(&reading.fix, reading.accuracy_m)
                {
                    audio.announce(&reached.waypoint.trigger_payload);
                    report.reached = Some(reached);
                }
                if self.send_or_buffer(modem, clock, reading.fix).await {
                    report.sent += 1;
                }
            }
            Err(err) => {
                match self.connectivity.classify(err) {
                    ErrorClass::Transient => info!("tracker: skipping fix err={}", err),
                    _ => warn!("tracker: no usable fix err={}", err),
                }
                report.fix_error = Some(err);
            }
        }

        report.sent += self.drain_buffer(modem, clock).await;
        report.buffered = self.buffer.len();

        let inputs = PowerInputs {
            idle_seconds: self.idle_seconds(),
            buffer_empty: self.buffer.is_empty(),
            restart_requested: self.connectivity.restart_requested(),
            distance_to_next_m: self.geofence.distance_from_last_position(),
        };
        report.decision = self.policy.decide(inputs);
        if !matches!(report.decision, PowerDecision::StayAwake) {
            settle_audio(audio, clock).await;
        }
        if matches!(report.decision, PowerDecision::Sleep) {
            modem.enter_low_power().await;
        }
        info!(
            "tracker: cycle done decision={} sent={} buffered={} visited={} link={}",
            report.decision.as_str(),
            report.sent,
            report.buffered,
            self.geofence.visited_waypoint_count(),
            self.connectivity.state().as_str()
        );
        report
    }

    async fn refresh_time<D: Modem>(&mut self, modem: &mut D) {
        let Some(now) = modem.network_time().await else {
            return;
        };
        self.now = Some(now);
        if self.reset_stamp_pending {
            self.geofence.stamp_reset_time(now);
            self.reset_stamp_pending = false;
        }
    }

    fn idle_seconds(&self) -> u64 {
        match self.now {
            Some(now) => now.saturating_sub(self.checkpoint().last_reset_time),
            None => 0,
        }
    }

    fn report_for(&self, fix: Fix) -> PositionReport {
        PositionReport::new(
            self.config.tracker_id,
            self.geofence.visited_waypoint_count(),
            fix,
        )
    }

    /// Returns whether the fix reached the broker. Undeliverable fixes are
    /// buffered unless the fix itself is bad.
    async fn send_or_buffer<D: Modem, C: Clock>(
        &mut self,
        modem: &mut D,
        clock: &mut C,
        fix: Fix,
    ) -> bool {
        let report = self.report_for(fix);
        match self.connectivity.send_fix(modem, clock, &report).await {
            Ok(()) => true,
            Err(err) if err.discards_fix() => {
                telemetry::record_fix_rejected();
                warn!("tracker: discarding fix err={}", err);
                false
            }
            Err(err) => {
                info!("tracker: buffering fix err={}", err);
                self.buffer.enqueue(fix);
                false
            }
        }
    }

    async fn drain_buffer<D: Modem, C: Clock>(&mut self, modem: &mut D, clock: &mut C) -> usize {
        let mut sent = 0;
        while self.connectivity.is_ready() {
            let Some(fix) = self.buffer.dequeue_next() else {
                break;
            };
            let report = self.report_for(fix);
            match self.connectivity.send_fix(modem, clock, &report).await {
                Ok(()) => sent += 1,
                Err(err) if err.discards_fix() => {
                    telemetry::record_fix_rejected();
                    warn!("tracker: dropping buffered fix err={}", err);
                }
                Err(_) => {
                    self.buffer.enqueue(fix);
                    break;
                }
            }
        }
        sent
    }
}

/// Holds off a power transition while audio is still playing, up to a cap.
async fn settle_audio<A: AudioActivity, C: Clock>(audio: &A, clock: &mut C) {
    let mut waited_ms = 0u32;
    while audio.is_busy() {
        if waited_ms >= AUDIO_SETTLE_MAX_MS {
            warn!("tracker: audio still busy after {}ms, proceeding", waited_ms);
            return;
        }
        clock.sleep_ms(AUDIO_SETTLE_POLL_MS).await;
        waited_ms = waited_ms.saturating_add(AUDIO_SETTLE_POLL_MS);
    }
}
