//! GATT backend contract
//!
//! The session state machine drives an abstract backend through the small
//! set of primitives below and observes outcomes as a stream of
//! [`GattEvent`]s. This decouples the connect and write disciplines from any
//! one OS Bluetooth stack: the production backend wraps the platform radio,
//! while tests drive the same machine through a scripted double.

use crate::error::LinkError;
use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Device address plus the service/characteristic pair to write through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BleTarget {
    pub address: String,
    pub service: Uuid,
    pub characteristic: Uuid,
}

/// How a connection attempt should be made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// Connect now and fail fast if the device is not reachable.
    Direct,
    /// Let the stack keep trying in the background until the device appears.
    Background,
}

/// Write discipline for a characteristic write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Write-with-response: the device acknowledges every write.
    Confirmed,
    /// Write-without-response: fire and forget.
    Unconfirmed,
}

/// Outcome codes reported by the platform stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattStatus {
    Success,
    Unreachable,
    ProtocolError,
    AccessDenied,
}

/// Asynchronous notifications from the backend.
///
/// Each connection attempt gets a fresh event channel, so callbacks from an
/// earlier connection life can never bleed into the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattEvent {
    Connected,
    /// Link dropped. `Success` means an orderly disconnect; anything else is
    /// the stack's error code for why the link died.
    Disconnected { status: GattStatus },
    MtuChanged(u16),
    ServicesDiscovered { status: GattStatus },
    /// A submitted write finished, successfully or not.
    WriteCompleted { status: GattStatus },
}

pub type EventSender = mpsc::UnboundedSender<GattEvent>;

/// Primitive operations a platform Bluetooth stack must provide.
///
/// All methods are driven from the single session task, so implementations
/// never see concurrent calls.
#[async_trait]
pub trait GattBackend: Send {
    /// Begin connecting to `address`. Progress for this attempt flows into
    /// `events`. An `Err` here means the environment cannot connect at all
    /// (no adapter, bad address); link-level trouble is reported via events
    /// instead.
    async fn start_connect(
        &mut self,
        address: &str,
        mode: ConnectMode,
        events: EventSender,
    ) -> Result<(), LinkError>;

    /// Ask the stack for a larger MTU. Best effort: failures are ignored by
    /// the caller, and the negotiated size, if any, arrives as `MtuChanged`.
    async fn request_mtu(&mut self, mtu: u16) -> Result<(), LinkError>;

    /// Start service discovery; completion arrives as `ServicesDiscovered`.
    async fn discover_services(&mut self) -> Result<(), LinkError>;

    /// Resolve the write characteristic inside `service` and pin it for
    /// subsequent writes.
    async fn select_characteristic(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), LinkError>;

    /// Queue one write. `Ok` means the stack accepted the submission; the
    /// device-side outcome, if the stack reports one, arrives later as
    /// `WriteCompleted`.
    async fn submit_write(&mut self, payload: &[u8], kind: WriteKind) -> Result<(), LinkError>;

    /// Tear down the link and drop all platform handles.
    async fn close(&mut self);
}

/// Stand-in backend for targets without a Bluetooth implementation.
/// Every connect reports the adapter as unavailable.
pub struct UnsupportedBackend;

#[async_trait]
impl GattBackend for UnsupportedBackend {
    async fn start_connect(
        &mut self,
        _address: &str,
        _mode: ConnectMode,
        _events: EventSender,
    ) -> Result<(), LinkError> {
        Err(LinkError::AdapterUnavailable)
    }

    async fn request_mtu(&mut self, _mtu: u16) -> Result<(), LinkError> {
        Ok(())
    }

    async fn discover_services(&mut self) -> Result<(), LinkError> {
        Err(LinkError::AdapterUnavailable)
    }

    async fn select_characteristic(
        &mut self,
        _service: Uuid,
        _characteristic: Uuid,
    ) -> Result<(), LinkError> {
        Err(LinkError::AdapterUnavailable)
    }

    async fn submit_write(&mut self, _payload: &[u8], _kind: WriteKind) -> Result<(), LinkError> {
        Err(LinkError::AdapterUnavailable)
    }

    async fn close(&mut self) {}
}
