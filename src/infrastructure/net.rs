//! One-shot UDP and TCP senders.
//!
//! The network transports are sessionless: every command gets a fresh socket
//! which is closed as soon as the payload is out. Failures surface as
//! [`LinkError::TransportIo`] with the underlying OS error.

use crate::error::LinkError;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};

/// Sends one datagram. An empty payload is a vacuous success; nothing is
/// put on the wire.
pub async fn send_udp(host: &str, port: u16, payload: &[u8]) -> Result<(), LinkError> {
    if payload.is_empty() {
        return Ok(());
    }
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.send_to(payload, (host, port)).await?;
    tracing::debug!("sent {} bytes to udp {host}:{port}", payload.len());
    Ok(())
}

/// Connects, writes the whole payload, and closes the stream.
pub async fn send_tcp(host: &str, port: u16, payload: &[u8]) -> Result<(), LinkError> {
    if payload.is_empty() {
        return Ok(());
    }
    let mut stream = TcpStream::connect((host, port)).await?;
    stream.write_all(payload).await?;
    stream.flush().await?;
    stream.shutdown().await?;
    tracing::debug!("sent {} bytes to tcp {host}:{port}", payload.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_udp_payload_is_vacuous() {
        // Port 9 is almost certainly closed; the call must not even bind.
        assert!(send_udp("127.0.0.1", 9, b"").await.is_ok());
    }

    #[tokio::test]
    async fn tcp_to_closed_port_reports_io_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = send_tcp("127.0.0.1", port, b"x").await.unwrap_err();
        assert!(matches!(err, LinkError::TransportIo(_)));
    }

    #[tokio::test]
    async fn unresolvable_host_reports_io_error() {
        let err = send_udp("this-host-does-not-exist.invalid", 8080, b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::TransportIo(_)));
    }
}
