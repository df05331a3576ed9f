use core::fmt;

use heapless::{String, Vec};

use super::ports::Qos;
use super::types::{coordinates_in_range, Waypoint};

pub const ROUTE_MAX_WAYPOINTS: usize = 32;
pub const WAYPOINT_PAYLOAD_MAX: usize = 48;
pub const CREDENTIAL_MAX: usize = 48;
pub const TOPIC_MAX: usize = 64;
pub const BROKER_HOST_MAX: usize = 64;
pub const CLIENT_ID_MAX: usize = 24;
pub const REPORT_MAX: usize = 192;
pub const POSITION_BUFFER_MAX: usize = 64;

pub const DEFAULT_TRACKER_ID: u32 = 1;
pub const DEFAULT_DUTY_CYCLE_S: u32 = 60;
pub const DEFAULT_RECONNECT_TIMEOUT_S: u32 = 300;
pub const DEFAULT_ARRIVAL_RADIUS_M: f64 = 100.0;
pub const DEFAULT_MINIMAL_ACCURACY_M: f64 = 30.0;
pub const DEFAULT_BROKER_PORT: u16 = 8883;

pub const NETWORK_COOLDOWN_MS: u64 = 60_000;
pub const NETWORK_WAIT_TIMEOUT_MS: u32 = 30_000;
pub const RECONNECT_ATTEMPT_BUDGET: u8 = 6;
pub const POSITIONING_POLL_ATTEMPTS: u8 = 20;
pub const POSITIONING_POLL_DELAY_MS: u32 = 1_500;
pub const MESSAGING_MAX_ATTEMPTS: u8 = 6;
pub const MESSAGING_RETRY_DELAY_MS: u32 = 5_000;
pub const FAST_FIX_REFRESH_INTERVAL_S: u64 = 216_000;
pub const FIX_READ_MAX_FAILURES: u8 = 4;
pub const FIX_READ_RETRY_DELAY_MS: u32 = 250;

pub const IDLE_RESTART_THRESHOLD_S: u64 = 900;
pub const SLEEP_DISTANCE_THRESHOLD_M: f64 = 150.0;
pub const AUDIO_SETTLE_POLL_MS: u32 = 100;
pub const AUDIO_SETTLE_MAX_MS: u32 = 120_000;
pub const MIN_CYCLE_SPACING_MS: u32 = 25_000;

pub const CHECKPOINT_MAGIC: u32 = 0x5450_4B43;
pub const CHECKPOINT_VERSION: u8 = 1;
pub const CHECKPOINT_RECORD_LEN: usize = 32;

pub type Route = Vec<Waypoint, ROUTE_MAX_WAYPOINTS>;
pub type Credential = String<CREDENTIAL_MAX>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApnSettings {
    pub apn: Credential,
    pub user: Credential,
    pub password: Credential,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerSettings {
    pub host: String<BROKER_HOST_MAX>,
    pub port: u16,
    pub topic: String<TOPIC_MAX>,
    pub qos: Qos,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_BROKER_PORT,
            topic: String::new(),
            qos: Qos::AtLeastOnce,
        }
    }
}

/// Retry bounds for the link machine. Every wait in the reconnect path is
/// capped by one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub attempt_budget: u8,
    pub network_cooldown_ms: u64,
    pub network_wait_timeout_ms: u32,
    pub positioning_poll_attempts: u8,
    pub positioning_poll_delay_ms: u32,
    pub messaging_max_attempts: u8,
    pub messaging_retry_delay_ms: u32,
    pub fix_read_max_failures: u8,
    pub fix_read_retry_delay_ms: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            attempt_budget: RECONNECT_ATTEMPT_BUDGET,
            network_cooldown_ms: NETWORK_COOLDOWN_MS,
            network_wait_timeout_ms: NETWORK_WAIT_TIMEOUT_MS,
            positioning_poll_attempts: POSITIONING_POLL_ATTEMPTS,
            positioning_poll_delay_ms: POSITIONING_POLL_DELAY_MS,
            messaging_max_attempts: MESSAGING_MAX_ATTEMPTS,
            messaging_retry_delay_ms: MESSAGING_RETRY_DELAY_MS,
            fix_read_max_failures: FIX_READ_MAX_FAILURES,
            fix_read_retry_delay_ms: FIX_READ_RETRY_DELAY_MS,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackerConfig {
    pub tracker_id: u32,
    pub arrival_radius_m: f64,
    pub minimal_accuracy_m: f64,
    pub duty_cycle_s: u32,
    pub reconnect_timeout_s: u32,
    pub fast_fix_enabled: bool,
    pub apn: ApnSettings,
    pub broker: BrokerSettings,
    pub reconnect: ReconnectPolicy,
    pub route: Route,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tracker_id: DEFAULT_TRACKER_ID,
            arrival_radius_m: DEFAULT_ARRIVAL_RADIUS_M,
            minimal_accuracy_m: DEFAULT_MINIMAL_ACCURACY_M,
            duty_cycle_s: DEFAULT_DUTY_CYCLE_S,
            reconnect_timeout_s: DEFAULT_RECONNECT_TIMEOUT_S,
            fast_fix_enabled: true,
            apn: ApnSettings::default(),
            broker: BrokerSettings::default(),
            reconnect: ReconnectPolicy::default(),
            route: Route::new(),
        }
    }
}

impl TrackerConfig {
    pub fn with_tracker_id(mut self, tracker_id: u32) -> Self {
        self.tracker_id = tracker_id;
        self
    }

    pub fn with_arrival_radius_m(mut self, radius_m: f64) -> Self {
        self.arrival_radius_m = radius_m;
        self
    }

    pub fn with_minimal_accuracy_m(mut self, accuracy_m: f64) -> Self {
        self.minimal_accuracy_m = accuracy_m;
        self
    }

    pub fn with_duty_cycle_s(mut self, duty_cycle_s: u32) -> Self {
        self.duty_cycle_s = duty_cycle_s;
        self
    }

    pub fn with_reconnect_timeout_s(mut self, reconnect_timeout_s: u32) -> Self {
        self.reconnect_timeout_s = reconnect_timeout_s;
        self
    }

    pub fn with_fast_fix(mut self, enabled: bool) -> Self {
        self.fast_fix_enabled = enabled;
        self
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_apn(mut self, apn: &str, user: &str, password: &str) -> Result<Self, ConfigError> {
        self.apn.apn = bounded(apn, "apn")?;
        self.apn.user = bounded(user, "apn_user")?;
        self.apn.password = bounded(password, "apn_password")?;
        Ok(self)
    }

    pub fn with_topic(mut self, topic: &str) -> Result<Self, ConfigError> {
        self.broker.topic = String::new();
        self.broker
            .topic
            .push_str(topic)
            .map_err(|_| ConfigError::ValueTooLong("topic"))?;
        Ok(self)
    }

    pub fn with_broker(mut self, host: &str, port: u16) -> Result<Self, ConfigError> {
        self.broker.host = String::new();
        self.broker
            .host
            .push_str(host)
            .map_err(|_| ConfigError::ValueTooLong("broker_host"))?;
        self.broker.port = port;
        Ok(self)
    }

    pub fn with_waypoint(mut self, waypoint: Waypoint) -> Result<Self, ConfigError> {
        self.route
            .push(waypoint)
            .map_err(|_| ConfigError::RouteFull)?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duty_cycle_s == 0 {
            return Err(ConfigError::ZeroDutyCycle);
        }
        if !(self.arrival_radius_m.is_finite() && self.arrival_radius_m > 0.0) {
            return Err(ConfigError::InvalidRadius);
        }
        if !(self.minimal_accuracy_m.is_finite() && self.minimal_accuracy_m > 0.0) {
            return Err(ConfigError::InvalidAccuracy);
        }
        if self.reconnect.attempt_budget == 0 {
            return Err(ConfigError::ZeroAttemptBudget);
        }
        if self.broker.port == 0 {
            return Err(ConfigError::ZeroBrokerPort);
        }
        for waypoint in self.route.iter() {
            if !coordinates_in_range(waypoint.latitude, waypoint.longitude) {
                return Err(ConfigError::WaypointOutOfRange(waypoint.id));
            }
        }
        Ok(())
    }
}

fn bounded(value: &str, field: &'static str) -> Result<Credential, ConfigError> {
    let mut out = Credential::new();
    out.push_str(value)
        .map_err(|_| ConfigError::ValueTooLong(field))?;
    Ok(out)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    ZeroDutyCycle,
    InvalidRadius,
    InvalidAccuracy,
    ZeroAttemptBudget,
    ZeroBrokerPort,
    WaypointOutOfRange(u32),
    RouteFull,
    ValueTooLong(&'static str),
}

impl ConfigError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ZeroDutyCycle => "zero_duty_cycle",
            Self::InvalidRadius => "invalid_radius",
            Self::InvalidAccuracy => "invalid_accuracy",
            Self::ZeroAttemptBudget => "zero_attempt_budget",
            Self::ZeroBrokerPort => "zero_broker_port",
            Self::WaypointOutOfRange(_) => "waypoint_out_of_range",
            Self::RouteFull => "route_full",
            Self::ValueTooLong(_) => "value_too_long",
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaypointOutOfRange(id) => write!(f, "{} id={}", self.as_str(), id),
            Self::ValueTooLong(field) => write!(f, "{} field={}", self.as_str(), field),
            _ => f.write_str(self.as_str()),
        }
    }
}
