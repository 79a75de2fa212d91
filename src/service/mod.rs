//! Background process management
//!
//! Detaching the bridge from its terminal and controlling it afterwards
//! through a PID file.

mod daemon;

pub use daemon::{Daemon, DaemonStatus, StopOutcome};
