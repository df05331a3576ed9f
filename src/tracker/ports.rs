//! Seams between the tracker core and the hardware it drives.
//!
//! The core never owns a UART, a flash chip or a timer. It is handed `&mut`
//! access to implementations of these traits for the duration of one duty
//! cycle.

use core::fmt;

use super::config::{ApnSettings, CHECKPOINT_RECORD_LEN};
use super::types::{FixError, FixReading, Timestamp};

pub type CheckpointRecord = [u8; CHECKPOINT_RECORD_LEN];

pub trait LocationProvider {
    async fn acquire_fix(&mut self) -> Result<FixReading, FixError>;
    async fn network_time(&mut self) -> Option<Timestamp>;
    async fn enter_low_power(&mut self);
    async fn wake(&mut self);
}

/// MQTT delivery guarantee requested for a publish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
}

impl Qos {
    pub const fn level(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
        }
    }
}

pub trait MessageTransport {
    async fn is_session_ready(&mut self) -> bool;
    async fn publish(&mut self, topic: &str, message: &str, qos: Qos) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadioMode {
    GsmOnly,
    LteCatM,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiverStart {
    Hot,
    Cold,
}

/// Capabilities that differ between the supported cellular modules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModemProfile {
    Sim7000g,
    Sim868,
}

impl ModemProfile {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sim7000g => "sim7000g",
            Self::Sim868 => "sim868",
        }
    }

    pub const fn radio_mode(self) -> RadioMode {
        match self {
            Self::Sim7000g => RadioMode::LteCatM,
            Self::Sim868 => RadioMode::GsmOnly,
        }
    }

    pub const fn supports_assistance(self) -> bool {
        matches!(self, Self::Sim7000g)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSettings<'a> {
    pub host: &'a str,
    pub port: u16,
    pub client_id: &'a str,
    pub keep_alive_s: u32,
    pub clean_session: bool,
}

/// Full modem surface used by the link machine. One implementation per
/// cellular module; the backend is picked by whoever constructs it.
pub trait Modem: LocationProvider + MessageTransport {
    fn profile(&self) -> ModemProfile;

    async fn is_network_attached(&mut self) -> bool;
    async fn power_cycle(&mut self) -> bool;
    async fn select_radio_mode(&mut self, mode: RadioMode) -> bool;
    async fn wait_for_network(&mut self, timeout_ms: u32) -> bool;
    async fn attach_data(&mut self, apn: &ApnSettings) -> bool;

    async fn is_positioning_locked(&mut self) -> bool;
    async fn enable_receiver(&mut self) -> bool;
    async fn refresh_assistance(&mut self) -> bool;
    async fn start_receiver(&mut self, start: ReceiverStart);
    async fn poll_fix(&mut self) -> bool;

    async fn open_session(&mut self, session: &SessionSettings<'_>) -> bool;
}

pub trait AudioActivity {
    fn is_busy(&self) -> bool;
    fn announce(&mut self, trigger_payload: &str);
}

pub trait Clock {
    fn now_ms(&self) -> u64;
    async fn sleep_ms(&mut self, ms: u32);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistError {
    Read,
    Write,
}

impl PersistError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw storage for the single checkpoint record. `Ok(None)` means the slot
/// was never written or has been erased.
pub trait PersistenceIo {
    fn load(&mut self) -> Result<Option<CheckpointRecord>, PersistError>;
    fn save(&mut self, record: &CheckpointRecord) -> Result<(), PersistError>;
    fn erase(&mut self) -> Result<(), PersistError>;
}

impl<T: PersistenceIo + ?Sized> PersistenceIo for &mut T {
    fn load(&mut self) -> Result<Option<CheckpointRecord>, PersistError> {
        (**self).load()
    }

    fn save(&mut self, record: &CheckpointRecord) -> Result<(), PersistError> {
        (**self).save(record)
    }

    fn erase(&mut self) -> Result<(), PersistError> {
        (**self).erase()
    }
}
