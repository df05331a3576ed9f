use log::{info, warn};

use super::config::{CHECKPOINT_MAGIC, CHECKPOINT_RECORD_LEN, CHECKPOINT_VERSION};
use super::ports::{CheckpointRecord, PersistError, PersistenceIo};
use super::telemetry;
use super::types::Timestamp;

mod region;

pub use region::StorageRegion;

const VISITED_OFFSET: usize = 5;
const FAST_FIX_OFFSET: usize = 9;
const RESET_OFFSET: usize = 17;

/// Route progress that has to survive deep sleep and power loss.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pub visited_waypoint_count: u32,
    pub last_fast_fix_update: Timestamp,
    pub last_reset_time: Timestamp,
}

impl Checkpoint {
    pub fn to_record(self) -> CheckpointRecord {
        let mut record = [0xFFu8; CHECKPOINT_RECORD_LEN];
        record[0..4].copy_from_slice(&CHECKPOINT_MAGIC.to_le_bytes());
        record[4] = CHECKPOINT_VERSION;
        record[VISITED_OFFSET..VISITED_OFFSET + 4]
            .copy_from_slice(&self.visited_waypoint_count.to_le_bytes());
        record[FAST_FIX_OFFSET..FAST_FIX_OFFSET + 8]
            .copy_from_slice(&self.last_fast_fix_update.to_le_bytes());
        record[RESET_OFFSET..RESET_OFFSET + 8]
            .copy_from_slice(&self.last_reset_time.to_le_bytes());
        record[CHECKPOINT_RECORD_LEN - 1] = checksum8(&record[..CHECKPOINT_RECORD_LEN - 1]);
        record
    }

    pub fn from_record(record: &CheckpointRecord) -> Option<Self> {
        if record.iter().all(|&byte| byte == 0xFF) {
            return None;
        }
        if u32::from_le_bytes([record[0], record[1], record[2], record[3]]) != CHECKPOINT_MAGIC {
            return None;
        }
        if record[4] != CHECKPOINT_VERSION {
            return None;
        }
        let expected = checksum8(&record[..CHECKPOINT_RECORD_LEN - 1]);
        if record[CHECKPOINT_RECORD_LEN - 1] != expected {
            return None;
        }
        Some(Self {
            visited_waypoint_count: read_u32(record, VISITED_OFFSET),
            last_fast_fix_update: read_u64(record, FAST_FIX_OFFSET),
            last_reset_time: read_u64(record, RESET_OFFSET),
        })
    }
}

fn read_u32(record: &CheckpointRecord, offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&record[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(record: &CheckpointRecord, offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&record[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

pub(crate) fn checksum8(bytes: &[u8]) -> u8 {
    let mut acc = 0x5Au8;
    for &byte in bytes {
        acc ^= byte.rotate_left(1);
    }
    acc
}

/// In-memory checkpoint mirrored to [`PersistenceIo`]. Every mutation is
/// written through before the call returns.
pub struct CheckpointStore<P: PersistenceIo> {
    io: P,
    current: Checkpoint,
}

impl<P: PersistenceIo> CheckpointStore<P> {
    /// Missing or corrupt records start the route from the beginning.
    pub fn load(mut io: P) -> Self {
        let current = match io.load() {
            Ok(Some(record)) => match Checkpoint::from_record(&record) {
                Some(checkpoint) => {
                    info!(
                        "checkpoint: loaded visited={} fast_fix={} reset={}",
                        checkpoint.visited_waypoint_count,
                        checkpoint.last_fast_fix_update,
                        checkpoint.last_reset_time
                    );
                    checkpoint
                }
                None => {
                    warn!("checkpoint: record rejected, starting from defaults");
                    Checkpoint::default()
                }
            },
            Ok(None) => {
                info!("checkpoint: no record, starting from defaults");
                Checkpoint::default()
            }
            Err(err) => {
                warn!("checkpoint: load failed err={}, starting from defaults", err);
                Checkpoint::default()
            }
        };
        Self { io, current }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.current
    }

    pub fn into_inner(self) -> P {
        self.io
    }

    /// Returns whether the new count reached storage. Counts never move backwards.
    pub(crate) fn record_visited(&mut self, visited_waypoint_count: u32) -> bool {
        if visited_waypoint_count <= self.current.visited_waypoint_count {
            return true;
        }
        self.current.visited_waypoint_count = visited_waypoint_count;
        self.flush().is_ok()
    }

    pub(crate) fn record_fast_fix_update(&mut self, at: Timestamp) -> bool {
        if self.current.last_fast_fix_update == at {
            return true;
        }
        self.current.last_fast_fix_update = at;
        self.flush().is_ok()
    }

    pub(crate) fn record_reset_time(&mut self, at: Timestamp) -> bool {
        if self.current.last_reset_time == at {
            return true;
        }
        self.current.last_reset_time = at;
        self.flush().is_ok()
    }

    /// Caps a stale count after the route was shortened between boots.
    pub(crate) fn clamp_visited(&mut self, route_len: u32) {
        if self.current.visited_waypoint_count > route_len {
            warn!(
                "checkpoint: visited={} exceeds route_len={}, clamping",
                self.current.visited_waypoint_count, route_len
            );
            self.current.visited_waypoint_count = route_len;
            let _ = self.flush();
        }
    }

    /// Operator factory reset.
    pub fn clear(&mut self) -> Result<(), PersistError> {
        self.current = Checkpoint::default();
        let result = self.io.erase();
        match result {
            Ok(()) => info!("checkpoint: cleared"),
            Err(err) => {
                telemetry::record_checkpoint_write_error();
                warn!("checkpoint: clear failed err={}", err);
            }
        }
        result
    }

    fn flush(&mut self) -> Result<(), PersistError> {
        let record = self.current.to_record();
        let result = self.io.save(&record);
        if let Err(err) = result {
            telemetry::record_checkpoint_write_error();
            warn!(
                "checkpoint: write failed err={} visited={}",
                err, self.current.visited_waypoint_count
            );
        }
        result
    }
}
