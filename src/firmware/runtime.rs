use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex};
use embassy_time::Timer;
use esp_hal::rtc_cntl::Rtc;
use log::info;

use super::audio::AudioBridge;
use super::clock::EmbassyClock;
use super::power::{deep_sleep, restart, wake_reason};
use super::storage::checkpoint_io;
use crate::tracker::buffer::PositionBuffer;
use crate::tracker::config::{TrackerConfig, MIN_CYCLE_SPACING_MS};
use crate::tracker::orchestrator::Tracker;
use crate::tracker::ports::Modem;
use crate::tracker::types::{BootContext, PowerDecision};

/// Runs duty cycles until the policy asks for sleep or restart. The modem is
/// locked for the whole of each cycle.
pub async fn run_tracker<D: Modem>(
    config: &TrackerConfig,
    modem: &Mutex<CriticalSectionRawMutex, D>,
    flash: esp_hal::peripherals::FLASH<'_>,
    mut rtc: Rtc<'_>,
    factory_reset_requested: bool,
) -> ! {
    let boot = BootContext {
        wake_reason: wake_reason(),
        factory_reset_requested,
    };
    let buffer = PositionBuffer::<CriticalSectionRawMutex>::for_timings(
        config.reconnect_timeout_s,
        config.duty_cycle_s,
    );
    let mut tracker = Tracker::boot(config, checkpoint_io(flash), &buffer, boot);
    let mut clock = EmbassyClock;
    let mut audio = AudioBridge;

    loop {
        let report = {
            let mut modem = modem.lock().await;
            tracker.run_cycle(&mut *modem, &mut clock, &mut audio).await
        };
        match report.decision {
            PowerDecision::StayAwake => {
                info!("runtime: staying awake ms={}", MIN_CYCLE_SPACING_MS);
                Timer::after_millis(u64::from(MIN_CYCLE_SPACING_MS)).await;
            }
            PowerDecision::Sleep => deep_sleep(&mut rtc, config.duty_cycle_s),
            PowerDecision::Restart => restart(),
        }
    }
}
