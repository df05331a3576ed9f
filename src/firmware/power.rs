use esp_hal::gpio::{Input, InputConfig, InputPin, Pull};
use esp_hal::rtc_cntl::{sleep::TimerWakeupSource, wakeup_cause, Rtc, SleepSource};
use log::info;

use crate::tracker::types::WakeReason;

pub fn wake_reason() -> WakeReason {
    match wakeup_cause() {
        SleepSource::Timer => WakeReason::Timer,
        _ => WakeReason::PowerOn,
    }
}

/// The boot button held low at power-up asks for a factory reset.
pub fn factory_reset_pressed<'d>(button: impl InputPin + 'd) -> bool {
    let input = Input::new(button, InputConfig::default().with_pull(Pull::Up));
    input.is_low()
}

pub fn deep_sleep(rtc: &mut Rtc<'_>, seconds: u32) -> ! {
    info!("power: deep sleep seconds={}", seconds);
    let timer = TimerWakeupSource::new(core::time::Duration::from_secs(u64::from(seconds)));
    rtc.sleep_deep(&[&timer])
}

pub fn restart() -> ! {
    info!("power: restarting");
    esp_hal::system::software_reset()
}
