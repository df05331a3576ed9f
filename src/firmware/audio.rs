use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use log::warn;

use crate::tracker::ports::AudioActivity;
use crate::tracker::types::TriggerPayload;

static AUDIO_BUSY: AtomicBool = AtomicBool::new(false);
pub static AUDIO_REQUESTS: Channel<CriticalSectionRawMutex, TriggerPayload, 4> = Channel::new();

/// Set by the audio task around each playback.
pub fn set_audio_busy(busy: bool) {
    AUDIO_BUSY.store(busy, Ordering::Release);
}

pub async fn next_audio_request() -> TriggerPayload {
    AUDIO_REQUESTS.receive().await
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AudioBridge;

impl AudioActivity for AudioBridge {
    fn is_busy(&self) -> bool {
        AUDIO_BUSY.load(Ordering::Acquire) || !AUDIO_REQUESTS.is_empty()
    }

    fn announce(&mut self, trigger_payload: &str) {
        let mut payload = TriggerPayload::new();
        if payload.push_str(trigger_payload).is_err() {
            warn!("audio: payload too long len={}", trigger_payload.len());
            return;
        }
        if AUDIO_REQUESTS.try_send(payload).is_err() {
            warn!("audio: request queue full, dropping payload");
        }
    }
}
