//! Bluetooth Module
//!
//! Provides BLE and classic Bluetooth delivery for device commands.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   BleSessionManager                      │
//! │   (owning task - serializes all connects and writes)     │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │  Session  │  │   Writer   │  │ Protocol │
//! │           │  │            │  │          │
//! │ - retry   │  │ - confirmed│  │ - UUIDs  │
//! │   plan    │  │ - backoff  │  │ - payload│
//! │ - reuse   │  │ - fallback │  │   encode │
//! └─────┬─────┘  └──────┬─────┘  └──────────┘
//!       │               │
//!       ▼               ▼
//! ┌─────────────────────────────┐  ┌──────────┐
//! │     GattBackend (trait)      │  │   SPP    │
//! │  winrt / unsupported / mock  │  │ (rfcomm) │
//! └─────────────────────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Device UUIDs, payload encoding, and address parsing
//! - [`gatt`] - Backend trait, event stream, and target descriptors
//! - [`session`] - Session ownership, connect retry, and reuse
//! - [`writer`] - Confirmed and unconfirmed write disciplines
//! - [`spp`] - Classic Bluetooth Serial Port Profile transport

pub mod gatt;
pub mod protocol;
pub mod session;
pub mod spp;
pub(crate) mod writer;

#[cfg(windows)]
pub mod winrt;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use gatt::{BleTarget, GattBackend, WriteKind};
pub use session::BleSessionManager;

/// Backend for the compile target: the WinRT stack on Windows, a stub that
/// reports the adapter as unavailable elsewhere.
#[cfg(windows)]
pub fn platform_backend() -> winrt::WinRtBackend {
    winrt::WinRtBackend::new()
}

#[cfg(not(windows))]
pub fn platform_backend() -> gatt::UnsupportedBackend {
    gatt::UnsupportedBackend
}
