use core::fmt;

use heapless::String;

use super::config::WAYPOINT_PAYLOAD_MAX;

/// Seconds since the Unix epoch, as reported by the cellular network.
pub type Timestamp = u64;

pub type TriggerPayload = String<WAYPOINT_PAYLOAD_MAX>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub epoch_seconds: Timestamp,
}

impl Fix {
    pub const fn new(latitude: f64, longitude: f64, altitude: f64, epoch_seconds: Timestamp) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            epoch_seconds,
        }
    }

    /// Horizontal position only; altitude is checked when the report is rendered.
    pub fn in_range(&self) -> bool {
        coordinates_in_range(self.latitude, self.longitude)
    }

    /// Rejects coordinates outside the WGS84 domain instead of clamping them.
    pub fn validated(self) -> Result<Self, FixError> {
        if self.in_range() {
            Ok(self)
        } else {
            Err(FixError::OutOfRange)
        }
    }
}

pub(crate) fn coordinates_in_range(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && libm::fabs(latitude) <= 90.0
        && libm::fabs(longitude) <= 180.0
}

/// A fix together with the receiver's horizontal accuracy estimate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixReading {
    pub fix: Fix,
    pub accuracy_m: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixError {
    NotConnected,
    ReadFailed,
    AccuracyTooLow,
    OutOfRange,
}

impl FixError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::ReadFailed => "read_failed",
            Self::AccuracyTooLow => "accuracy_too_low",
            Self::OutOfRange => "out_of_range",
        }
    }
}

impl fmt::Display for FixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Waypoint {
    pub id: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub trigger_payload: TriggerPayload,
}

impl Waypoint {
    pub fn new(id: u32, latitude: f64, longitude: f64, trigger_payload: &str) -> Option<Self> {
        let mut payload = TriggerPayload::new();
        payload.push_str(trigger_payload).ok()?;
        Some(Self {
            id,
            latitude,
            longitude,
            trigger_payload: payload,
        })
    }
}

/// Emitted exactly once per waypoint, after the checkpoint write attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct WaypointReached {
    pub index: usize,
    pub waypoint: Waypoint,
    pub distance_m: f64,
    pub visited_waypoint_count: u32,
    pub persisted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WakeReason {
    PowerOn,
    Timer,
    Restart,
}

impl WakeReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PowerOn => "power_on",
            Self::Timer => "timer",
            Self::Restart => "restart",
        }
    }

    pub const fn resumed_from_sleep(self) -> bool {
        matches!(self, Self::Timer)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootContext {
    pub wake_reason: WakeReason,
    pub factory_reset_requested: bool,
}

impl BootContext {
    pub const fn cold() -> Self {
        Self {
            wake_reason: WakeReason::PowerOn,
            factory_reset_requested: false,
        }
    }

    pub const fn timer_wake() -> Self {
        Self {
            wake_reason: WakeReason::Timer,
            factory_reset_requested: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerDecision {
    StayAwake,
    Sleep,
    Restart,
}

impl PowerDecision {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StayAwake => "stay_awake",
            Self::Sleep => "sleep",
            Self::Restart => "restart",
        }
    }
}
