//! Layered link bring-up: cellular network, then satellite positioning, then
//! the broker session.
//!
//! [`Connectivity`] is rebuilt on every boot. It drives the modem through the
//! [`Modem`] seam, records each layer change in a statig machine and gives up
//! after a bounded number of failed sub-link attempts, at which point it
//! requests a restart.

use heapless::String;
use log::{info, warn};

use super::checkpoint::CheckpointStore;
use super::config::{ReconnectPolicy, TrackerConfig, CLIENT_ID_MAX};
use super::ports::{Clock, Modem, PersistenceIo};
use super::report::{client_id, PositionReport};
use super::telemetry;
use super::types::{FixError, FixReading, Timestamp};

mod bringup;
mod engine;
mod machine;
mod state;
#[cfg(test)]
mod tests;

use engine::LinkStateEngine;
pub use state::{ConnectivityError, ErrorClass, LinkEvent, LinkState, SendError, SubLink};

pub struct Connectivity<'c> {
    config: &'c TrackerConfig,
    policy: ReconnectPolicy,
    engine: LinkStateEngine,
    client_id: String<CLIENT_ID_MAX>,
    resumed_from_sleep: bool,
    needs_power_cycle: bool,
    last_network_attempt_ms: Option<u64>,
    // Set by a failed publish; the session is reopened before the next send.
    session_stale: bool,
    transmit_failures: u8,
    last_error: Option<ConnectivityError>,
    restart_requested: bool,
}

impl<'c> Connectivity<'c> {
    pub fn new(config: &'c TrackerConfig, resumed_from_sleep: bool) -> Self {
        Self {
            config,
            policy: config.reconnect,
            engine: LinkStateEngine::new(),
            client_id: client_id(config.tracker_id),
            resumed_from_sleep,
            // A modem that was not parked by our own sleep is in an unknown state.
            needs_power_cycle: !resumed_from_sleep,
            last_network_attempt_ms: None,
            session_stale: false,
            transmit_failures: 0,
            last_error: None,
            restart_requested: false,
        }
    }

    pub fn state(&self) -> LinkState {
        self.engine.state()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.engine.state(), LinkState::Ready)
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    pub fn last_error(&self) -> Option<ConnectivityError> {
        self.last_error
    }

    /// Any error is fatal for this boot once a restart has been requested.
    pub fn classify(&self, err: ConnectivityError) -> ErrorClass {
        if self.restart_requested {
            ErrorClass::Fatal
        } else {
            err.class()
        }
    }

    /// Brings every sub-link up, in order. Failed sub-link attempts share one
    /// budget; exhausting it parks the machine in `Degraded` and raises the
    /// restart request.
    pub async fn ensure_ready<M, C, P>(
        &mut self,
        modem: &mut M,
        clock: &mut C,
        checkpoint: &mut CheckpointStore<P>,
        now: Option<Timestamp>,
    ) -> Result<(), ConnectivityError>
    where
        M: Modem,
        C: Clock,
        P: PersistenceIo,
    {
        if matches!(self.engine.state(), LinkState::Degraded) {
            return Err(self
                .last_error
                .unwrap_or(ConnectivityError::NetworkUnavailable));
        }

        let budget = self.policy.attempt_budget;
        let max_rounds = u16::from(budget).saturating_mul(4).max(4);
        let mut failures = 0u8;
        let mut rounds = 0u16;
        loop {
            let Some(missing) = self.probe(modem, clock).await else {
                if failures > 0 {
                    info!("link: ready after failures={}", failures);
                }
                return Ok(());
            };
            if failures >= budget || rounds >= max_rounds {
                let err = missing.unavailable();
                self.give_up(err, failures, clock.now_ms());
                return Err(err);
            }
            rounds += 1;
            telemetry::record_reconnect_attempt();

            let up = match missing {
                SubLink::Network => self.connect_network(modem, clock).await,
                SubLink::Positioning => {
                    self.connect_positioning(modem, clock, checkpoint, now)
                        .await
                }
                SubLink::Messaging => self.connect_messaging(modem, clock).await,
            };
            if !up {
                failures += 1;
                self.last_error = Some(missing.unavailable());
                warn!(
                    "link: {} attempt failed failures={}/{}",
                    missing.as_str(),
                    failures,
                    budget
                );
            }
        }
    }

    /// Publishes one report. No retry here: a failed publish marks the
    /// session stale so the next `ensure_ready` reopens it. Consecutive
    /// failures share the attempt budget and exhausting it requests a restart.
    pub async fn send_fix<M, C>(
        &mut self,
        modem: &mut M,
        clock: &C,
        report: &PositionReport,
    ) -> Result<(), SendError>
    where
        M: Modem,
        C: Clock,
    {
        if !self.is_ready() {
            return Err(ConnectivityError::NotReady);
        }
        let message = report.render().map_err(|err| {
            warn!(
                "link: report serialization failed err={} ts={}",
                err.as_str(),
                report.fix.epoch_seconds
            );
            ConnectivityError::SerializationFailed
        })?;
        let broker = &self.config.broker;
        if modem.publish(&broker.topic, &message, broker.qos).await {
            self.transmit_failures = 0;
            telemetry::record_fix_sent();
            info!(
                "link: published ts={} visited={}",
                report.fix.epoch_seconds, report.visited_waypoints
            );
            Ok(())
        } else {
            telemetry::record_send_failure();
            self.session_stale = true;
            self.transmit_failures = self.transmit_failures.saturating_add(1);
            let err = ConnectivityError::TransmitFailed;
            self.last_error = Some(err);
            if self.transmit_failures >= self.policy.attempt_budget {
                self.give_up(err, self.transmit_failures, clock.now_ms());
                return Err(err);
            }
            let transition = self
                .engine
                .apply(LinkEvent::Lost(SubLink::Messaging), clock.now_ms());
            warn!(
                "link: publish failed ts={} failures={}/{} link={}",
                report.fix.epoch_seconds,
                self.transmit_failures,
                self.policy.attempt_budget,
                transition.after.as_str()
            );
            Err(err)
        }
    }

    /// Reads one fix with a short bounded retry. Low accuracy is reported at
    /// once and does not count as a failed read.
    pub async fn acquire_fix<M, C>(
        &mut self,
        modem: &mut M,
        clock: &mut C,
    ) -> Result<FixReading, ConnectivityError>
    where
        M: Modem,
        C: Clock,
    {
        let mut failures = 0u8;
        loop {
            let err = match modem.acquire_fix().await {
                Ok(reading) if !reading.fix.in_range() => FixError::OutOfRange,
                Ok(reading) => {
                    if !(reading.accuracy_m.is_finite()
                        && reading.accuracy_m <= self.config.minimal_accuracy_m)
                    {
                        info!(
                            "link: fix accuracy too low accuracy_m={:.1} limit_m={:.1}",
                            reading.accuracy_m, self.config.minimal_accuracy_m
                        );
                        return Err(ConnectivityError::AccuracyTooLow);
                    }
                    telemetry::record_fix_acquired();
                    return Ok(reading);
                }
                Err(FixError::AccuracyTooLow) => return Err(ConnectivityError::AccuracyTooLow),
                Err(err) => err,
            };

            failures = failures.saturating_add(1);
            if matches!(err, FixError::OutOfRange) {
                telemetry::record_fix_rejected();
            }
            warn!(
                "link: fix read failed err={} failures={}/{}",
                err, failures, self.policy.fix_read_max_failures
            );
            if failures >= self.policy.fix_read_max_failures {
                self.restart_requested = true;
                return Err(fix_error_class(err));
            }
            clock.sleep_ms(self.policy.fix_read_retry_delay_ms).await;
        }
    }

    /// Reflects the modem's actual link status into the machine and returns
    /// the lowest layer that is down.
    async fn probe<M: Modem, C: Clock>(&mut self, modem: &mut M, clock: &C) -> Option<SubLink> {
        let at_ms = clock.now_ms();
        if !modem.is_network_attached().await {
            self.engine.apply(LinkEvent::Lost(SubLink::Network), at_ms);
            return Some(SubLink::Network);
        }
        self.engine.apply(LinkEvent::Up(SubLink::Network), at_ms);

        if !modem.is_positioning_locked().await {
            self.engine
                .apply(LinkEvent::Lost(SubLink::Positioning), at_ms);
            return Some(SubLink::Positioning);
        }
        self.engine
            .apply(LinkEvent::Up(SubLink::Positioning), at_ms);

        if self.session_stale || !modem.is_session_ready().await {
            self.engine.apply(LinkEvent::Lost(SubLink::Messaging), at_ms);
            return Some(SubLink::Messaging);
        }
        self.engine.apply(LinkEvent::Up(SubLink::Messaging), at_ms);
        None
    }

    fn give_up(&mut self, err: ConnectivityError, failures: u8, at_ms: u64) {
        let transition = self.engine.apply(LinkEvent::BudgetExhausted, at_ms);
        self.last_error = Some(err);
        self.restart_requested = true;
        telemetry::record_reconnect_exhausted();
        warn!(
            "link: reconnect budget exhausted err={} failures={} from={}",
            err,
            failures,
            transition.before.as_str()
        );
    }
}

fn fix_error_class(err: FixError) -> ConnectivityError {
    match err {
        FixError::NotConnected => ConnectivityError::NetworkUnavailable,
        FixError::ReadFailed => ConnectivityError::PositioningUnavailable,
        FixError::AccuracyTooLow => ConnectivityError::AccuracyTooLow,
        FixError::OutOfRange => ConnectivityError::CoordinatesOutOfRange,
    }
}
