use super::config::{IDLE_RESTART_THRESHOLD_S, SLEEP_DISTANCE_THRESHOLD_M};
use super::types::PowerDecision;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PowerInputs {
    pub idle_seconds: u64,
    pub buffer_empty: bool,
    pub restart_requested: bool,
    pub distance_to_next_m: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SleepPolicy {
    pub idle_restart_after_s: u64,
    pub sleep_distance_m: f64,
}

impl Default for SleepPolicy {
    fn default() -> Self {
        Self {
            idle_restart_after_s: IDLE_RESTART_THRESHOLD_S,
            sleep_distance_m: SLEEP_DISTANCE_THRESHOLD_M,
        }
    }
}

impl SleepPolicy {
    /// A long-running boot is only recycled once every buffered fix is out.
    pub fn should_restart(&self, idle_seconds: u64, buffer_empty: bool, explicit: bool) -> bool {
        explicit || (idle_seconds > self.idle_restart_after_s && buffer_empty)
    }

    pub fn should_sleep(&self, distance_m: f64) -> bool {
        distance_m > self.sleep_distance_m
    }

    /// Unknown distance means there is nothing to stay awake for.
    pub fn should_sleep_at(&self, distance_m: Option<f64>) -> bool {
        distance_m.is_none_or(|distance| self.should_sleep(distance))
    }

    pub fn decide(&self, inputs: PowerInputs) -> PowerDecision {
        if self.should_restart(
            inputs.idle_seconds,
            inputs.buffer_empty,
            inputs.restart_requested,
        ) {
            PowerDecision::Restart
        } else if self.should_sleep_at(inputs.distance_to_next_m) {
            PowerDecision::Sleep
        } else {
            PowerDecision::StayAwake
        }
    }
}
