//! Socket bridge
//!
//! This module provides the components that carry gpg traffic across:
//! - `Listener`: UNIX socket accepting local clients for one endpoint
//! - `Relay`: per-connection session piping bytes to the host agent
//! - `Supervisor`: starts every listener and shuts them down together

mod listener;
mod relay;
mod supervisor;

pub use listener::Listener;
pub use relay::{Direction, Relay, connect_host_agent, pump};
pub use supervisor::{RunningSupervisor, Supervisor};
