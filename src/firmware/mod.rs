//! ESP32 glue: flash-backed checkpoint, embassy clock, RTC power control and
//! the hand-off to the audio task.

pub mod audio;
pub mod clock;
pub mod config;
pub mod power;
pub mod runtime;
pub mod storage;

pub use runtime::run_tracker;

pub fn init_logging() {
    esp_println::logger::init_logger(log::LevelFilter::Info);
}
