use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    NetworkUp,
    PositioningUp,
    Ready,
    Degraded,
}

impl LinkState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::NetworkUp => "NetworkUp",
            Self::PositioningUp => "PositioningUp",
            Self::Ready => "Ready",
            Self::Degraded => "Degraded",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubLink {
    Network,
    Positioning,
    Messaging,
}

impl SubLink {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Positioning => "positioning",
            Self::Messaging => "messaging",
        }
    }

    pub const fn unavailable(self) -> ConnectivityError {
        match self {
            Self::Network => ConnectivityError::NetworkUnavailable,
            Self::Positioning => ConnectivityError::PositioningUnavailable,
            Self::Messaging => ConnectivityError::MessagingUnavailable,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    Up(SubLink),
    Lost(SubLink),
    BudgetExhausted,
    Reset,
}

impl LinkEvent {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up(SubLink::Network) => "network_up",
            Self::Up(SubLink::Positioning) => "positioning_up",
            Self::Up(SubLink::Messaging) => "messaging_up",
            Self::Lost(SubLink::Network) => "network_lost",
            Self::Lost(SubLink::Positioning) => "positioning_lost",
            Self::Lost(SubLink::Messaging) => "messaging_lost",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Reset => "reset",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Connectivity,
    DataIntegrity,
    Fatal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectivityError {
    NetworkUnavailable,
    PositioningUnavailable,
    MessagingUnavailable,
    AccuracyTooLow,
    CoordinatesOutOfRange,
    SerializationFailed,
    TransmitFailed,
    NotReady,
}

pub type SendError = ConnectivityError;

impl ConnectivityError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkUnavailable => "network_unavailable",
            Self::PositioningUnavailable => "positioning_unavailable",
            Self::MessagingUnavailable => "messaging_unavailable",
            Self::AccuracyTooLow => "accuracy_too_low",
            Self::CoordinatesOutOfRange => "coordinates_out_of_range",
            Self::SerializationFailed => "serialization_failed",
            Self::TransmitFailed => "transmit_failed",
            Self::NotReady => "not_ready",
        }
    }

    pub const fn class(self) -> ErrorClass {
        match self {
            Self::AccuracyTooLow => ErrorClass::Transient,
            Self::CoordinatesOutOfRange | Self::SerializationFailed => ErrorClass::DataIntegrity,
            Self::NetworkUnavailable
            | Self::PositioningUnavailable
            | Self::MessagingUnavailable
            | Self::TransmitFailed
            | Self::NotReady => ErrorClass::Connectivity,
        }
    }

    /// Data integrity failures mean the fix itself is bad and must be dropped.
    pub const fn discards_fix(self) -> bool {
        matches!(self.class(), ErrorClass::DataIntegrity)
    }
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
