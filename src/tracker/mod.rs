//! Target-independent tracker core: route progress, the offline replay
//! buffer, layered link recovery and the per-cycle power decision.

pub mod buffer;
pub mod checkpoint;
pub mod config;
pub mod connectivity;
pub mod geofence;
pub mod orchestrator;
pub mod policy;
pub mod ports;
pub mod report;
pub mod sim;
pub mod telemetry;
pub mod types;

pub use buffer::PositionBuffer;
pub use checkpoint::{Checkpoint, CheckpointStore, StorageRegion};
pub use config::TrackerConfig;
pub use connectivity::{Connectivity, ConnectivityError, LinkState};
pub use geofence::GeofenceTracker;
pub use orchestrator::{CycleReport, Tracker};
pub use policy::SleepPolicy;
pub use types::{BootContext, Fix, PowerDecision, WakeReason, Waypoint, WaypointReached};
