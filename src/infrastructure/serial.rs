//! Raw serial transport.
//!
//! Ports are opened per command at the configured baud rate with an 8N1
//! frame, written, and dropped. Keeping no port open between commands means
//! unplugging the adapter between sends never wedges the link.

use crate::error::LinkError;
use std::io::Write;
use std::time::Duration;

/// Upper bound on open plus write; a stuck adapter fails the send instead
/// of blocking the caller.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn send_serial(port: &str, baud: u32, payload: &[u8]) -> Result<(), LinkError> {
    if payload.is_empty() {
        return Ok(());
    }
    if port.trim().is_empty() {
        return Err(LinkError::InvalidAddress(port.to_string()));
    }

    let port_name = port.to_string();
    let bytes = payload.to_vec();
    let write = tokio::task::spawn_blocking(move || -> Result<(), LinkError> {
        let mut handle = serialport::new(&port_name, baud)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(WRITE_TIMEOUT)
            .open()
            .map_err(|err| {
                LinkError::TransportIo(std::io::Error::new(std::io::ErrorKind::Other, err))
            })?;
        handle.write_all(&bytes)?;
        handle.flush()?;
        Ok(())
    });

    match tokio::time::timeout(WRITE_TIMEOUT, write).await {
        Ok(Ok(result)) => result?,
        Ok(Err(join_err)) => {
            return Err(LinkError::TransportIo(std::io::Error::new(
                std::io::ErrorKind::Other,
                join_err,
            )))
        }
        Err(_) => return Err(LinkError::WriteTimeout(WRITE_TIMEOUT.as_millis() as u64)),
    }
    tracing::debug!("sent {} bytes to serial {port} @ {baud}", payload.len());
    Ok(())
}
