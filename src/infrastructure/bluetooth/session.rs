//! BLE session ownership and connect retry
//!
//! One spawned task owns the one live BLE connection; every connect and
//! write request is serialized through its inbox, so overlapping sends from
//! different tasks can never race on session creation or on an in-flight
//! write. Connection lifecycle:
//!
//! ```text
//! Closed ──direct──► Connecting ──► Ready ──reused while address matches──┐
//!   ▲   ◄─500 ms─── retry direct                                         │
//!   │   ◄─300 ms─── background                                           │
//!   └────────── disconnect / GATT error / explicit invalidate ◄──────────┘
//! ```
//!
//! Each attempt is bounded by a 25 s timeout and runs with a fresh event
//! channel, so callbacks from a torn-down connection cannot leak into a
//! later one.

use crate::error::LinkError;
use crate::infrastructure::bluetooth::gatt::{
    BleTarget, ConnectMode, GattBackend, GattEvent, GattStatus, WriteKind,
};
use crate::infrastructure::bluetooth::{protocol, writer};
use crate::infrastructure::logging::DiagnosticLog;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

/// Per-attempt ceiling on connect plus discovery.
const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(25);
/// Pause before the second, still direct, attempt.
const DIRECT_RETRY_PAUSE: Duration = Duration::from_millis(500);
/// Pause before the final background-mode attempt.
const BACKGROUND_RETRY_PAUSE: Duration = Duration::from_millis(300);
/// MTU we ask for; large enough to fit every payload we produce in one write.
const PREFERRED_MTU: u16 = 247;
/// BLE minimum, assumed until the stack reports otherwise.
const DEFAULT_MTU: u16 = 23;

/// Established connection state held by the session task.
pub(crate) struct LiveSession {
    pub(crate) address: String,
    events: mpsc::UnboundedReceiver<GattEvent>,
    pub(crate) mtu: u16,
    lost: Option<String>,
}

impl LiveSession {
    /// Applies events that arrived since the last poll. Returns the cause
    /// once the link is known to be lost.
    pub(crate) fn poll_health(&mut self) -> Result<(), String> {
        loop {
            if let Some(cause) = &self.lost {
                return Err(cause.clone());
            }
            match self.events.try_recv() {
                Ok(GattEvent::Disconnected { status }) => {
                    self.lost = Some(format!("disconnected ({status:?})"));
                }
                Ok(GattEvent::MtuChanged(mtu)) => self.mtu = mtu,
                Ok(_) => {}
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    self.lost = Some("event stream closed".to_string());
                }
            }
        }
    }

    /// Waits for the next write completion. `None` means the link died
    /// before any completion arrived.
    pub(crate) async fn next_write_ack(&mut self) -> Option<GattStatus> {
        if self.lost.is_some() {
            return None;
        }
        loop {
            match self.events.recv().await {
                Some(GattEvent::WriteCompleted { status }) => return Some(status),
                Some(GattEvent::Disconnected { status }) => {
                    self.lost = Some(format!("disconnected ({status:?})"));
                    return None;
                }
                Some(GattEvent::MtuChanged(mtu)) => self.mtu = mtu,
                Some(_) => {}
                None => {
                    self.lost = Some("event stream closed".to_string());
                    return None;
                }
            }
        }
    }

    pub(crate) fn is_lost(&self) -> bool {
        self.lost.is_some()
    }
}

enum SessionRequest {
    Write {
        target: BleTarget,
        payload: Vec<u8>,
        kind: WriteKind,
        reply: oneshot::Sender<Result<(), LinkError>>,
    },
    Invalidate {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the session task. Cheap to clone; all clones talk to the same
/// single connection.
#[derive(Clone)]
pub struct BleSessionManager {
    requests: mpsc::Sender<SessionRequest>,
}

impl BleSessionManager {
    /// Spawns the owning session task. Must be called within a Tokio runtime.
    pub fn spawn<B>(backend: B, diag: DiagnosticLog) -> Self
    where
        B: GattBackend + 'static,
    {
        let (requests, inbox) = mpsc::channel(16);
        let actor = SessionActor {
            backend,
            session: None,
            diag,
        };
        tokio::spawn(actor.run(inbox));
        Self { requests }
    }

    /// Delivers one payload to `target`, connecting first if needed. An
    /// empty payload is vacuously successful and touches no hardware.
    pub async fn write(
        &self,
        target: BleTarget,
        payload: Vec<u8>,
        kind: WriteKind,
    ) -> Result<(), LinkError> {
        if payload.is_empty() {
            return Ok(());
        }
        let (reply, response) = oneshot::channel();
        self.requests
            .send(SessionRequest::Write {
                target,
                payload,
                kind,
                reply,
            })
            .await
            .map_err(|_| LinkError::ConnectFailed("session task stopped".to_string()))?;
        response
            .await
            .map_err(|_| LinkError::ConnectFailed("session task dropped the request".to_string()))?
    }

    /// Tears down any live session. The next write reconnects from scratch.
    pub async fn invalidate(&self) {
        let (reply, response) = oneshot::channel();
        if self
            .requests
            .send(SessionRequest::Invalidate { reply })
            .await
            .is_ok()
        {
            let _ = response.await;
        }
    }
}

struct SessionActor<B> {
    backend: B,
    session: Option<LiveSession>,
    diag: DiagnosticLog,
}

impl<B: GattBackend> SessionActor<B> {
    async fn run(mut self, mut inbox: mpsc::Receiver<SessionRequest>) {
        while let Some(request) = inbox.recv().await {
            match request {
                SessionRequest::Write {
                    target,
                    payload,
                    kind,
                    reply,
                } => {
                    let result = self.handle_write(&target, &payload, kind).await;
                    let _ = reply.send(result);
                }
                SessionRequest::Invalidate { reply } => {
                    self.teardown().await;
                    let _ = reply.send(());
                }
            }
        }
        // Every handle is gone; release the radio.
        self.teardown().await;
    }

    async fn handle_write(
        &mut self,
        target: &BleTarget,
        payload: &[u8],
        kind: WriteKind,
    ) -> Result<(), LinkError> {
        protocol::parse_mac(&target.address)?;
        self.ensure_ready(target).await?;

        let result = match self.session.as_mut() {
            Some(session) => {
                writer::deliver(&mut self.backend, session, payload, kind, &self.diag).await
            }
            None => Err(LinkError::ConnectFailed(
                "session missing after connect".to_string(),
            )),
        };

        if self
            .session
            .as_ref()
            .map(|s| s.is_lost())
            .unwrap_or(false)
        {
            self.diag
                .append("ble", format!("link to {} lost, session dropped", target.address));
            self.teardown().await;
        }
        result
    }

    /// Reuses the live session when it matches `target`, otherwise runs the
    /// three-attempt connect plan: direct, direct after 500 ms, background
    /// after 300 ms.
    async fn ensure_ready(&mut self, target: &BleTarget) -> Result<(), LinkError> {
        if let Some(session) = self.session.as_mut() {
            if session.address == target.address {
                match session.poll_health() {
                    Ok(()) => return Ok(()),
                    Err(cause) => {
                        self.diag.append(
                            "ble",
                            format!(
                                "session to {} went stale ({cause}), reconnecting",
                                target.address
                            ),
                        );
                        self.teardown().await;
                    }
                }
            } else {
                debug!("BLE target changed to {}, dropping current session", target.address);
                self.teardown().await;
            }
        }

        let plan = [
            (Duration::ZERO, ConnectMode::Direct),
            (DIRECT_RETRY_PAUSE, ConnectMode::Direct),
            (BACKGROUND_RETRY_PAUSE, ConnectMode::Background),
        ];

        let mut last_error = None;
        for (attempt, (pause, mode)) in plan.iter().enumerate() {
            if !pause.is_zero() {
                sleep(*pause).await;
            }
            info!(
                "BLE connect attempt {}/{} ({mode:?}) to {}",
                attempt + 1,
                plan.len(),
                target.address
            );
            match self.attempt_connect(target, *mode).await {
                Ok(session) => {
                    info!("BLE session ready: {} (mtu {})", session.address, session.mtu);
                    self.session = Some(session);
                    return Ok(());
                }
                Err(err) => {
                    self.teardown().await;
                    if err.is_fatal() {
                        self.diag.append("ble", err.to_string());
                        return Err(err);
                    }
                    self.diag
                        .append("ble", format!("connect attempt {} failed: {err}", attempt + 1));
                    last_error = Some(err);
                }
            }
        }

        self.diag.append(
            "ble",
            format!("giving up on {} after direct and background attempts", target.address),
        );
        Err(last_error
            .unwrap_or_else(|| LinkError::ConnectFailed("all attempts failed".to_string())))
    }

    /// One bounded attempt: start the connect, then follow events through
    /// MTU negotiation and discovery until the write characteristic is
    /// pinned.
    async fn attempt_connect(
        &mut self,
        target: &BleTarget,
        mode: ConnectMode,
    ) -> Result<LiveSession, LinkError> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        self.backend
            .start_connect(&target.address, mode, event_tx)
            .await?;

        match timeout(CONNECT_ATTEMPT_TIMEOUT, self.drive_setup(target, &mut event_rx)).await {
            Ok(Ok(mtu)) => Ok(LiveSession {
                address: target.address.clone(),
                events: event_rx,
                mtu,
                lost: None,
            }),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(LinkError::ConnectFailed(format!(
                "no connection result within {} s",
                CONNECT_ATTEMPT_TIMEOUT.as_secs()
            ))),
        }
    }

    async fn drive_setup(
        &mut self,
        target: &BleTarget,
        events: &mut mpsc::UnboundedReceiver<GattEvent>,
    ) -> Result<u16, LinkError> {
        let mut mtu = DEFAULT_MTU;
        loop {
            let Some(event) = events.recv().await else {
                return Err(LinkError::ConnectFailed(
                    "event channel closed during setup".to_string(),
                ));
            };
            match event {
                GattEvent::Connected => {
                    if self.backend.request_mtu(PREFERRED_MTU).await.is_err() {
                        debug!("MTU request failed, continuing with default");
                    }
                    self.backend.discover_services().await?;
                }
                GattEvent::MtuChanged(new_mtu) => mtu = new_mtu,
                GattEvent::ServicesDiscovered {
                    status: GattStatus::Success,
                } => {
                    self.backend
                        .select_characteristic(target.service, target.characteristic)
                        .await?;
                    return Ok(mtu);
                }
                GattEvent::ServicesDiscovered { status } => {
                    return Err(LinkError::ConnectFailed(format!(
                        "service discovery failed ({status:?})"
                    )));
                }
                GattEvent::Disconnected { status } => {
                    return Err(LinkError::ConnectFailed(format!(
                        "disconnected during setup ({status:?})"
                    )));
                }
                // Stale completion from an earlier connection life.
                GattEvent::WriteCompleted { .. } => {}
            }
        }
    }

    async fn teardown(&mut self) {
        if self.session.take().is_some() {
            debug!("BLE session closed");
        }
        self.backend.close().await;
    }
}
