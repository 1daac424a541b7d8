//! Command dispatch over the configured transport.
//!
//! One `Dispatcher` per process. Callers hand it a connection snapshot and a
//! command string; it frames or encodes the command for that transport and
//! reports plain success or failure. Every failure cause lands in the
//! shared [`DiagnosticLog`] before being collapsed to `false`, so callers
//! get a boolean and operators get the story.

use crate::domain::command::parse_axis_command;
use crate::domain::config::{ConnectionConfig, TextFraming};
use crate::domain::range::{mapped_fraction, AxisRanges};
use crate::infrastructure::bluetooth::gatt::{GattBackend, WriteKind};
use crate::infrastructure::bluetooth::{platform_backend, protocol, spp, BleSessionManager};
use crate::infrastructure::logging::DiagnosticLog;
use crate::infrastructure::{net, serial};
use tracing::debug;

/// Representative command used to exercise text transports on demand.
const PROBE_COMMAND: &str = "L0:50:500";

/// Routes commands to the configured transport.
#[derive(Clone)]
pub struct Dispatcher {
    ble: BleSessionManager,
    diag: DiagnosticLog,
}

impl Dispatcher {
    /// Dispatcher over the platform Bluetooth stack. Must be created within
    /// a Tokio runtime.
    pub fn new(diag: DiagnosticLog) -> Self {
        Self::with_backend(platform_backend(), diag)
    }

    /// Dispatcher over a caller-supplied GATT backend.
    pub fn with_backend<B>(backend: B, diag: DiagnosticLog) -> Self
    where
        B: GattBackend + 'static,
    {
        Self {
            ble: BleSessionManager::spawn(backend, diag.clone()),
            diag,
        }
    }

    /// Sends one command over `config`. An empty command is vacuously
    /// successful on every transport and performs no I/O.
    pub async fn send(
        &self,
        config: &ConnectionConfig,
        framing: &TextFraming,
        ranges: &AxisRanges,
        command: &str,
    ) -> bool {
        if command.is_empty() {
            return true;
        }
        debug!("dispatching `{command}` over {}", config.kind_name());

        let result = match config {
            ConnectionConfig::Udp { host, port } => {
                net::send_udp(host, *port, framing.frame(command).as_bytes()).await
            }
            ConnectionConfig::Tcp { host, port } => {
                net::send_tcp(host, *port, framing.frame(command).as_bytes()).await
            }
            ConnectionConfig::Serial { port, baud } => {
                serial::send_serial(port, *baud, framing.frame(command).as_bytes()).await
            }
            ConnectionConfig::BluetoothSerial { address } => {
                spp::send_spp(address, framing.frame(command).as_bytes()).await
            }
            ConnectionConfig::BleText { address } => {
                self.ble
                    .write(
                        protocol::uart_target(address),
                        framing.frame(command).into_bytes(),
                        WriteKind::Unconfirmed,
                    )
                    .await
            }
            ConnectionConfig::BleLinear { address, axis } => {
                match linear_payload(axis, ranges, command) {
                    Some(payload) => {
                        self.ble
                            .write(protocol::linear_target(address), payload, WriteKind::Confirmed)
                            .await
                    }
                    None => {
                        self.diag.append(
                            "ble-linear",
                            format!("no segment for axis {axis} in command, nothing sent"),
                        );
                        return false;
                    }
                }
            }
        };

        match result {
            Ok(()) => true,
            Err(err) => {
                self.diag
                    .append(config.kind_name(), format!("send failed: {err}"));
                false
            }
        }
    }

    /// Exercises the configured transport: a fixed probe move for
    /// linear-motion devices, a representative framed command elsewhere.
    pub async fn test_connection(&self, config: &ConnectionConfig, framing: &TextFraming) -> bool {
        match config {
            ConnectionConfig::BleLinear { address, axis: _ } => {
                let result = self
                    .ble
                    .write(
                        protocol::linear_target(address),
                        protocol::encode_probe(),
                        WriteKind::Confirmed,
                    )
                    .await;
                match result {
                    Ok(()) => true,
                    Err(err) => {
                        self.diag
                            .append(config.kind_name(), format!("connection test failed: {err}"));
                        false
                    }
                }
            }
            _ => {
                self.send(config, framing, &AxisRanges::default(), PROBE_COMMAND)
                    .await
            }
        }
    }

    /// Drops any live BLE session. Call after the connection settings
    /// change; the next send connects against the new target.
    pub async fn invalidate(&self) {
        self.ble.invalidate().await;
    }
}

/// Reduces a multi-axis command to the configured axis and encodes it for a
/// linear-motion device. `None` when the command has no segment for `axis`.
fn linear_payload(axis: &str, ranges: &AxisRanges, command: &str) -> Option<Vec<u8>> {
    let segment = parse_axis_command(command)
        .into_iter()
        .find(|segment| segment.axis == axis)?;
    let range = ranges.get(axis);
    let fraction = mapped_fraction(segment.position, &range);
    Some(protocol::encode_linear_move(fraction, segment.duration_ms))
}
