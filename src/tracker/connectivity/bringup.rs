use log::{info, warn};

use super::super::checkpoint::CheckpointStore;
use super::super::config::FAST_FIX_REFRESH_INTERVAL_S;
use super::super::ports::{Clock, Modem, ModemProfile, PersistenceIo, ReceiverStart, SessionSettings};
use super::super::telemetry;
use super::super::types::Timestamp;
use super::state::{LinkEvent, SubLink};
use super::Connectivity;

/// Assistance data is refreshed at most once per interval, and only when the
/// network clock is known.
pub(crate) fn assistance_due(last_update: Timestamp, now: Option<Timestamp>) -> bool {
    match now {
        Some(now) => now.saturating_sub(last_update) >= FAST_FIX_REFRESH_INTERVAL_S,
        None => false,
    }
}

impl Connectivity<'_> {
    pub(super) async fn connect_network<M: Modem, C: Clock>(
        &mut self,
        modem: &mut M,
        clock: &mut C,
    ) -> bool {
        let cooldown_ms = self.policy.network_cooldown_ms;
        if let Some(last_ms) = self.last_network_attempt_ms {
            let elapsed_ms = clock.now_ms().saturating_sub(last_ms);
            if elapsed_ms < cooldown_ms {
                let wait_ms = (cooldown_ms - elapsed_ms).min(u64::from(u32::MAX)) as u32;
                info!("link: network cool-down wait_ms={}", wait_ms);
                clock.sleep_ms(wait_ms).await;
            }
        }
        self.last_network_attempt_ms = Some(clock.now_ms());

        let profile = modem.profile();
        if self.needs_power_cycle {
            info!("link: power cycling modem profile={}", profile.as_str());
            if !modem.power_cycle().await {
                warn!("link: modem power cycle failed");
            }
            self.needs_power_cycle = false;
        }

        let up = modem.select_radio_mode(profile.radio_mode()).await
            && modem
                .wait_for_network(self.policy.network_wait_timeout_ms)
                .await
            && modem.attach_data(&self.config.apn).await;
        if !up {
            self.needs_power_cycle = true;
        }
        up
    }

    pub(super) async fn connect_positioning<M, C, P>(
        &mut self,
        modem: &mut M,
        clock: &mut C,
        checkpoint: &mut CheckpointStore<P>,
        now: Option<Timestamp>,
    ) -> bool
    where
        M: Modem,
        C: Clock,
        P: PersistenceIo,
    {
        if !modem.enable_receiver().await {
            warn!("link: receiver enable failed");
            return false;
        }

        let start = if self.assistance_wanted(modem.profile())
            && assistance_due(checkpoint.checkpoint().last_fast_fix_update, now)
        {
            if modem.refresh_assistance().await {
                telemetry::record_assistance_refresh();
                if let Some(now) = now {
                    checkpoint.record_fast_fix_update(now);
                }
                info!("link: assistance data refreshed");
                ReceiverStart::Cold
            } else {
                warn!("link: assistance refresh failed");
                ReceiverStart::Hot
            }
        } else {
            ReceiverStart::Hot
        };
        modem.start_receiver(start).await;

        for _ in 0..self.policy.positioning_poll_attempts {
            if modem.poll_fix().await {
                return true;
            }
            if !modem.is_network_attached().await {
                warn!("link: network dropped while polling for fix");
                self.engine
                    .apply(LinkEvent::Lost(SubLink::Network), clock.now_ms());
                return false;
            }
            clock.sleep_ms(self.policy.positioning_poll_delay_ms).await;
        }
        false
    }

    pub(super) async fn connect_messaging<M: Modem, C: Clock>(
        &mut self,
        modem: &mut M,
        clock: &mut C,
    ) -> bool {
        let broker = &self.config.broker;
        let session = SessionSettings {
            host: broker.host.as_str(),
            port: broker.port,
            client_id: self.client_id.as_str(),
            keep_alive_s: self.config.duty_cycle_s.saturating_mul(2),
            clean_session: !self.resumed_from_sleep,
        };
        let max_attempts = self.policy.messaging_max_attempts.max(1);
        for attempt in 1..=max_attempts {
            if modem.open_session(&session).await {
                self.session_stale = false;
                return true;
            }
            if attempt < max_attempts {
                clock.sleep_ms(self.policy.messaging_retry_delay_ms).await;
            }
        }
        false
    }

    fn assistance_wanted(&self, profile: ModemProfile) -> bool {
        self.config.fast_fix_enabled && profile.supports_assistance()
    }
}
