//! Emulated Assuan socket support
//!
//! On Windows, libassuan has no UNIX-domain sockets. Instead the agent listens
//! on a loopback TCP port and writes a small "socket" file holding that port
//! and a secret nonce. A client proves it may talk to the agent by sending the
//! nonce as the first bytes of the TCP connection.

pub mod descriptor;

pub use descriptor::{Descriptor, NONCE_LEN};
