use core::sync::atomic::{AtomicU32, Ordering};

static DUTY_CYCLES: AtomicU32 = AtomicU32::new(0);
static FIXES_ACQUIRED: AtomicU32 = AtomicU32::new(0);
static FIXES_REJECTED: AtomicU32 = AtomicU32::new(0);
static FIXES_BUFFERED: AtomicU32 = AtomicU32::new(0);
static FIXES_EVICTED: AtomicU32 = AtomicU32::new(0);
static FIXES_SENT: AtomicU32 = AtomicU32::new(0);
static SEND_FAILURES: AtomicU32 = AtomicU32::new(0);
static RECONNECT_ATTEMPTS: AtomicU32 = AtomicU32::new(0);
static RECONNECT_EXHAUSTED: AtomicU32 = AtomicU32::new(0);
static WAYPOINTS_REACHED: AtomicU32 = AtomicU32::new(0);
static CHECKPOINT_WRITE_ERRORS: AtomicU32 = AtomicU32::new(0);
static ASSISTANCE_REFRESHES: AtomicU32 = AtomicU32::new(0);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub duty_cycles: u32,
    pub fixes_acquired: u32,
    pub fixes_rejected: u32,
    pub fixes_buffered: u32,
    pub fixes_evicted: u32,
    pub fixes_sent: u32,
    pub send_failures: u32,
    pub reconnect_attempts: u32,
    pub reconnect_exhausted: u32,
    pub waypoints_reached: u32,
    pub checkpoint_write_errors: u32,
    pub assistance_refreshes: u32,
}

pub fn snapshot() -> TelemetrySnapshot {
    TelemetrySnapshot {
        duty_cycles: DUTY_CYCLES.load(Ordering::Relaxed),
        fixes_acquired: FIXES_ACQUIRED.load(Ordering::Relaxed),
        fixes_rejected: FIXES_REJECTED.load(Ordering::Relaxed),
        fixes_buffered: FIXES_BUFFERED.load(Ordering::Relaxed),
        fixes_evicted: FIXES_EVICTED.load(Ordering::Relaxed),
        fixes_sent: FIXES_SENT.load(Ordering::Relaxed),
        send_failures: SEND_FAILURES.load(Ordering::Relaxed),
        reconnect_attempts: RECONNECT_ATTEMPTS.load(Ordering::Relaxed),
        reconnect_exhausted: RECONNECT_EXHAUSTED.load(Ordering::Relaxed),
        waypoints_reached: WAYPOINTS_REACHED.load(Ordering::Relaxed),
        checkpoint_write_errors: CHECKPOINT_WRITE_ERRORS.load(Ordering::Relaxed),
        assistance_refreshes: ASSISTANCE_REFRESHES.load(Ordering::Relaxed),
    }
}

pub(crate) fn record_duty_cycle() {
    DUTY_CYCLES.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_fix_acquired() {
    FIXES_ACQUIRED.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_fix_rejected() {
    FIXES_REJECTED.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_fix_buffered() {
    FIXES_BUFFERED.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_fix_evicted() {
    FIXES_EVICTED.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_fix_sent() {
    FIXES_SENT.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_send_failure() {
    SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_reconnect_attempt() {
    RECONNECT_ATTEMPTS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_reconnect_exhausted() {
    RECONNECT_EXHAUSTED.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_waypoint_reached() {
    WAYPOINTS_REACHED.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_checkpoint_write_error() {
    CHECKPOINT_WRITE_ERRORS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_assistance_refresh() {
    ASSISTANCE_REFRESHES.fetch_add(1, Ordering::Relaxed);
}
