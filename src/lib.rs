//! Multi-transport command link for motion devices.
//!
//! Takes abstract `axis:position:duration` commands and delivers them over
//! whatever transport is configured: UDP datagrams, TCP streams, wired
//! serial, classic Bluetooth SPP, or one of two BLE device families. The
//! caller-facing contract is deliberately small: build a command, hand it to
//! the [`Dispatcher`], get back a boolean; failure detail goes to the
//! diagnostic journal and the tracing log.
//!
//! ## Layers
//!
//! - [`domain`] - command codec, range mapping, connection snapshots, and
//!   persisted settings
//! - [`infrastructure`] - the transports themselves plus logging
//! - [`dispatcher`] - routes one command to the configured transport

pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use dispatcher::Dispatcher;
pub use error::LinkError;
