use core::fmt::Write as _;

use heapless::String;

use super::config::{CLIENT_ID_MAX, REPORT_MAX};
use super::types::Fix;

pub type ReportBuffer = String<REPORT_MAX>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportError {
    NonFinite,
    Overflow,
}

impl ReportError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NonFinite => "non_finite",
            Self::Overflow => "overflow",
        }
    }
}

/// One position message as published to the collector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionReport {
    pub tracker_id: u32,
    pub visited_waypoints: u32,
    pub fix: Fix,
}

impl PositionReport {
    pub fn new(tracker_id: u32, visited_waypoints: u32, fix: Fix) -> Self {
        Self {
            tracker_id,
            visited_waypoints,
            fix,
        }
    }

    /// JSON document; fails on non-finite coordinates or when the output
    /// does not fit.
    pub fn render(&self) -> Result<ReportBuffer, ReportError> {
        let fix = &self.fix;
        if !(fix.latitude.is_finite() && fix.longitude.is_finite() && fix.altitude.is_finite()) {
            return Err(ReportError::NonFinite);
        }
        let mut out = ReportBuffer::new();
        write!(
            out,
            "{{\"tracker_id\":{},\"timestamp\":{},\"visited_waypoints\":{},\"coordinates\":{{\"lat\":{:.6},\"lon\":{:.6},\"alt\":{:.1}}}}}",
            self.tracker_id,
            fix.epoch_seconds,
            self.visited_waypoints,
            fix.latitude,
            fix.longitude,
            fix.altitude
        )
        .map_err(|_| ReportError::Overflow)?;
        Ok(out)
    }
}

pub fn client_id(tracker_id: u32) -> String<CLIENT_ID_MAX> {
    let mut out = String::new();
    // "TRACKER-" plus at most ten digits always fits.
    let _ = write!(out, "TRACKER-{}", tracker_id);
    out
}
