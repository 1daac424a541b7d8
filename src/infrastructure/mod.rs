//! Infrastructure Layer
//!
//! Platform-facing plumbing: logging, datagram and stream transports, wired
//! serial, and the Bluetooth stack.

pub mod bluetooth;
pub mod logging;
pub mod net;
pub mod serial;
