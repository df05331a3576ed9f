//! Simulated backends for running the tracker core off-target.
//!
//! Every collaborator trait has a scripted stand-in here: a modem whose links
//! can be switched on and off, a clock that advances only when slept on, RAM
//! persistence and a RAM flash device.

use core::cell::Cell;

use embedded_storage::{ReadStorage, Storage};
use heapless::{Deque, String, Vec};

use super::config::{ApnSettings, REPORT_MAX};
use super::ports::{
    AudioActivity, CheckpointRecord, Clock, LocationProvider, MessageTransport, Modem,
    ModemProfile, PersistError, PersistenceIo, Qos, RadioMode, ReceiverStart, SessionSettings,
};
use super::types::{Fix, FixError, FixReading, Timestamp, TriggerPayload};

const SIM_SCRIPT_MAX: usize = 16;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimModemStats {
    pub power_cycles: u32,
    pub radio_mode_selects: u32,
    pub network_waits: u32,
    pub data_attaches: u32,
    pub receiver_enables: u32,
    pub assistance_refreshes: u32,
    pub hot_starts: u32,
    pub cold_starts: u32,
    pub fix_polls: u32,
    pub session_opens: u32,
    pub last_session_clean: Option<bool>,
    pub last_session_port: Option<u16>,
    pub last_publish_qos: Option<Qos>,
    pub fix_reads: u32,
    pub publishes: u32,
    pub low_power_entries: u32,
    pub wakes: u32,
}

pub struct SimModem {
    profile: ModemProfile,
    pub network_available: bool,
    pub positioning_available: bool,
    pub broker_available: bool,
    pub detach_during_poll: bool,
    pub session_failures_remaining: u8,
    pub network_time: Option<Timestamp>,
    pub last_radio_mode: Option<RadioMode>,
    pub stats: SimModemStats,
    pub published: Vec<String<REPORT_MAX>, SIM_SCRIPT_MAX>,
    attached: bool,
    locked: bool,
    session_open: bool,
    fixes: Deque<Result<FixReading, FixError>, SIM_SCRIPT_MAX>,
    publish_outcomes: Deque<bool, SIM_SCRIPT_MAX>,
}

impl SimModem {
    pub fn new(profile: ModemProfile) -> Self {
        Self {
            profile,
            network_available: true,
            positioning_available: true,
            broker_available: true,
            detach_during_poll: false,
            session_failures_remaining: 0,
            network_time: Some(1_700_000_000),
            last_radio_mode: None,
            stats: SimModemStats::default(),
            published: Vec::new(),
            attached: false,
            locked: false,
            session_open: false,
            fixes: Deque::new(),
            publish_outcomes: Deque::new(),
        }
    }

    pub fn push_fix(&mut self, fix: Fix, accuracy_m: f64) -> bool {
        self.fixes
            .push_back(Ok(FixReading { fix, accuracy_m }))
            .is_ok()
    }

    pub fn push_fix_error(&mut self, err: FixError) -> bool {
        self.fixes.push_back(Err(err)).is_ok()
    }

    /// Scripts the outcome of the next publish; unscripted publishes succeed.
    pub fn script_publish(&mut self, delivered: bool) -> bool {
        self.publish_outcomes.push_back(delivered).is_ok()
    }

    pub fn drop_links(&mut self) {
        self.attached = false;
        self.locked = false;
        self.session_open = false;
    }

    pub fn pending_fixes(&self) -> usize {
        self.fixes.len()
    }
}

impl LocationProvider for SimModem {
    async fn acquire_fix(&mut self) -> Result<FixReading, FixError> {
        self.stats.fix_reads += 1;
        self.fixes.pop_front().unwrap_or(Err(FixError::ReadFailed))
    }

    async fn network_time(&mut self) -> Option<Timestamp> {
        self.network_time
    }

    async fn enter_low_power(&mut self) {
        self.stats.low_power_entries += 1;
    }

    async fn wake(&mut self) {
        self.stats.wakes += 1;
    }
}

impl MessageTransport for SimModem {
    async fn is_session_ready(&mut self) -> bool {
        self.session_open && self.attached
    }

    async fn publish(&mut self, _topic: &str, message: &str, qos: Qos) -> bool {
        self.stats.publishes += 1;
        self.stats.last_publish_qos = Some(qos);
        let delivered = self.publish_outcomes.pop_front().unwrap_or(true);
        if delivered {
            let mut copy = String::new();
            if copy.push_str(message).is_err() || self.published.push(copy).is_err() {
                return false;
            }
        }
        delivered
    }
}

impl Modem for SimModem {
    fn profile(&self) -> ModemProfile {
        self.profile
    }

    async fn is_network_attached(&mut self) -> bool {
        self.attached
    }

    async fn power_cycle(&mut self) -> bool {
        self.stats.power_cycles += 1;
        self.drop_links();
        true
    }

    async fn select_radio_mode(&mut self, mode: RadioMode) -> bool {
        self.stats.radio_mode_selects += 1;
        self.last_radio_mode = Some(mode);
        true
    }

    async fn wait_for_network(&mut self, _timeout_ms: u32) -> bool {
        self.stats.network_waits += 1;
        self.network_available
    }

    async fn attach_data(&mut self, _apn: &ApnSettings) -> bool {
        self.stats.data_attaches += 1;
        self.attached = self.network_available;
        self.attached
    }

    async fn is_positioning_locked(&mut self) -> bool {
        self.locked
    }

    async fn enable_receiver(&mut self) -> bool {
        self.stats.receiver_enables += 1;
        self.positioning_available
    }

    async fn refresh_assistance(&mut self) -> bool {
        self.stats.assistance_refreshes += 1;
        self.attached
    }

    async fn start_receiver(&mut self, start: ReceiverStart) {
        match start {
            ReceiverStart::Hot => self.stats.hot_starts += 1,
            ReceiverStart::Cold => self.stats.cold_starts += 1,
        }
    }

    async fn poll_fix(&mut self) -> bool {
        self.stats.fix_polls += 1;
        if self.detach_during_poll {
            self.attached = false;
            return false;
        }
        self.locked = self.positioning_available;
        self.locked
    }

    async fn open_session(&mut self, session: &SessionSettings<'_>) -> bool {
        self.stats.session_opens += 1;
        self.stats.last_session_clean = Some(session.clean_session);
        self.stats.last_session_port = Some(session.port);
        if self.session_failures_remaining > 0 {
            self.session_failures_remaining -= 1;
            return false;
        }
        self.session_open = self.broker_available && self.attached;
        self.session_open
    }
}

/// Monotonic clock that only moves when something sleeps on it.
#[derive(Debug, Default)]
pub struct SimClock {
    pub now_ms: u64,
    pub sleeps: u32,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&mut self, ms: u64) {
        self.now_ms = self.now_ms.saturating_add(ms);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    async fn sleep_ms(&mut self, ms: u32) {
        self.sleeps += 1;
        self.now_ms = self.now_ms.saturating_add(u64::from(ms));
        embassy_futures::yield_now().await;
    }
}

#[derive(Debug, Default)]
pub struct MemoryIo {
    pub record: Option<CheckpointRecord>,
    pub saves: u32,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl MemoryIo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceIo for MemoryIo {
    fn load(&mut self) -> Result<Option<CheckpointRecord>, PersistError> {
        if self.fail_reads {
            return Err(PersistError::Read);
        }
        Ok(self.record)
    }

    fn save(&mut self, record: &CheckpointRecord) -> Result<(), PersistError> {
        if self.fail_writes {
            return Err(PersistError::Write);
        }
        self.saves += 1;
        self.record = Some(*record);
        Ok(())
    }

    fn erase(&mut self) -> Result<(), PersistError> {
        if self.fail_writes {
            return Err(PersistError::Write);
        }
        self.record = None;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RamFlashOutOfBounds;

/// Erased-state (0xFF) byte array behind the `embedded-storage` traits.
pub struct RamFlash<const N: usize> {
    bytes: [u8; N],
    pub writes: u32,
}

impl<const N: usize> RamFlash<N> {
    pub fn new() -> Self {
        Self {
            bytes: [0xFF; N],
            writes: 0,
        }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8; N] {
        &mut self.bytes
    }
}

impl<const N: usize> Default for RamFlash<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ReadStorage for RamFlash<N> {
    type Error = RamFlashOutOfBounds;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start.checked_add(bytes.len()).ok_or(RamFlashOutOfBounds)?;
        let source = self.bytes.get(start..end).ok_or(RamFlashOutOfBounds)?;
        bytes.copy_from_slice(source);
        Ok(())
    }

    fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Storage for RamFlash<N> {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start.checked_add(bytes.len()).ok_or(RamFlashOutOfBounds)?;
        let target = self.bytes.get_mut(start..end).ok_or(RamFlashOutOfBounds)?;
        target.copy_from_slice(bytes);
        self.writes += 1;
        Ok(())
    }
}

/// Audio stand-in that reports busy for a fixed number of polls.
#[derive(Debug, Default)]
pub struct SimAudio {
    busy_polls: Cell<u32>,
    pub busy_checks: Cell<u32>,
    pub announced: Vec<TriggerPayload, SIM_SCRIPT_MAX>,
}

impl SimAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn busy_for_polls(polls: u32) -> Self {
        let audio = Self::default();
        audio.busy_polls.set(polls);
        audio
    }
}

impl AudioActivity for SimAudio {
    fn is_busy(&self) -> bool {
        self.busy_checks.set(self.busy_checks.get() + 1);
        let remaining = self.busy_polls.get();
        if remaining == 0 {
            return false;
        }
        self.busy_polls.set(remaining - 1);
        true
    }

    fn announce(&mut self, trigger_payload: &str) {
        let mut payload = TriggerPayload::new();
        if payload.push_str(trigger_payload).is_ok() {
            let _ = self.announced.push(payload);
        }
    }
}
