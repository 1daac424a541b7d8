//! Scripted GATT backend
//!
//! Deterministic stand-in for a platform Bluetooth stack. Tests queue up
//! per-attempt outcomes, run the real session machine against it, and then
//! assert on the recorded calls and their (virtual) timestamps.

use crate::error::LinkError;
use crate::infrastructure::bluetooth::gatt::{
    ConnectMode, EventSender, GattBackend, GattEvent, GattStatus, WriteKind,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use uuid::Uuid;

/// What the next connection attempt does.
#[derive(Debug, Clone, Copy)]
pub enum ConnectOutcome {
    /// `start_connect` itself fails: no adapter.
    Refused,
    /// The attempt starts but no event ever arrives, forcing the 25 s timeout.
    Stall,
    /// Connects, then service discovery reports the given failure status.
    DiscoveryFails(GattStatus),
    /// Connects and discovers, but the write characteristic is missing.
    NoCharacteristic,
    /// Connects, then the link drops during setup.
    DropDuringSetup,
    /// Full setup succeeds.
    Ready,
}

/// What the next submitted write does.
#[derive(Debug, Clone, Copy)]
pub enum WriteOutcome {
    /// The stack refuses the submission outright.
    Rejected,
    /// Submission accepted; completion reports success immediately.
    AckSuccess,
    /// Submission accepted; completion reports a protocol error.
    AckFailure,
    /// Submission accepted; no completion event ever arrives.
    Silent,
    /// Submission accepted, then the link drops before any completion.
    DropLink,
}

#[derive(Debug, Clone)]
pub struct ConnectRecord {
    pub address: String,
    pub mode: ConnectMode,
    pub at: Instant,
}

#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub payload: Vec<u8>,
    pub kind: WriteKind,
    pub at: Instant,
}

#[derive(Default)]
struct MockState {
    connect_script: VecDeque<ConnectOutcome>,
    write_script: VecDeque<WriteOutcome>,
    active: Option<ConnectOutcome>,
    events: Option<EventSender>,
    connects: Vec<ConnectRecord>,
    discoveries: usize,
    selections: usize,
    writes: Vec<WriteRecord>,
    closes: usize,
}

/// Clones share state, so a test keeps one handle for assertions while the
/// session task owns the other. Unscripted attempts default to `Ready` /
/// `AckSuccess`.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_connects(&self, outcomes: &[ConnectOutcome]) {
        let mut state = self.state.lock().unwrap();
        state.connect_script.extend(outcomes.iter().copied());
    }

    pub fn script_writes(&self, outcomes: &[WriteOutcome]) {
        let mut state = self.state.lock().unwrap();
        state.write_script.extend(outcomes.iter().copied());
    }

    pub fn connects(&self) -> Vec<ConnectRecord> {
        self.state.lock().unwrap().connects.clone()
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn discovery_count(&self) -> usize {
        self.state.lock().unwrap().discoveries
    }

    pub fn selection_count(&self) -> usize {
        self.state.lock().unwrap().selections
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait]
impl GattBackend for MockBackend {
    async fn start_connect(
        &mut self,
        address: &str,
        mode: ConnectMode,
        events: EventSender,
    ) -> Result<(), LinkError> {
        let mut state = self.state.lock().unwrap();
        state.connects.push(ConnectRecord {
            address: address.to_string(),
            mode,
            at: Instant::now(),
        });
        let outcome = state
            .connect_script
            .pop_front()
            .unwrap_or(ConnectOutcome::Ready);
        state.active = Some(outcome);
        match outcome {
            ConnectOutcome::Refused => {
                state.events = None;
                Err(LinkError::AdapterUnavailable)
            }
            ConnectOutcome::Stall => {
                // Keep the sender alive without ever emitting, so the
                // machine waits on a channel that never closes.
                state.events = Some(events);
                Ok(())
            }
            _ => {
                let _ = events.send(GattEvent::Connected);
                state.events = Some(events);
                Ok(())
            }
        }
    }

    async fn request_mtu(&mut self, mtu: u16) -> Result<(), LinkError> {
        let state = self.state.lock().unwrap();
        if matches!(state.active, Some(ConnectOutcome::Ready)) {
            if let Some(events) = &state.events {
                let _ = events.send(GattEvent::MtuChanged(mtu));
            }
        }
        Ok(())
    }

    async fn discover_services(&mut self) -> Result<(), LinkError> {
        let mut state = self.state.lock().unwrap();
        state.discoveries += 1;
        let event = match state.active {
            Some(ConnectOutcome::DiscoveryFails(status)) => {
                GattEvent::ServicesDiscovered { status }
            }
            Some(ConnectOutcome::DropDuringSetup) => GattEvent::Disconnected {
                status: GattStatus::Success,
            },
            _ => GattEvent::ServicesDiscovered {
                status: GattStatus::Success,
            },
        };
        if let Some(events) = &state.events {
            let _ = events.send(event);
        }
        Ok(())
    }

    async fn select_characteristic(
        &mut self,
        _service: Uuid,
        _characteristic: Uuid,
    ) -> Result<(), LinkError> {
        let mut state = self.state.lock().unwrap();
        state.selections += 1;
        match state.active {
            Some(ConnectOutcome::NoCharacteristic) => {
                Err(LinkError::ServiceOrCharacteristicNotFound)
            }
            _ => Ok(()),
        }
    }

    async fn submit_write(&mut self, payload: &[u8], kind: WriteKind) -> Result<(), LinkError> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(WriteRecord {
            payload: payload.to_vec(),
            kind,
            at: Instant::now(),
        });
        let outcome = state
            .write_script
            .pop_front()
            .unwrap_or(WriteOutcome::AckSuccess);
        let event = match outcome {
            WriteOutcome::Rejected => {
                return Err(LinkError::WriteRejected("mock stack refused".to_string()))
            }
            WriteOutcome::AckSuccess => Some(GattEvent::WriteCompleted {
                status: GattStatus::Success,
            }),
            WriteOutcome::AckFailure => Some(GattEvent::WriteCompleted {
                status: GattStatus::ProtocolError,
            }),
            WriteOutcome::Silent => None,
            WriteOutcome::DropLink => Some(GattEvent::Disconnected {
                status: GattStatus::ProtocolError,
            }),
        };
        if let (Some(event), Some(events)) = (event, &state.events) {
            let _ = events.send(event);
        }
        Ok(())
    }

    async fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.closes += 1;
        state.events = None;
        state.active = None;
    }
}
