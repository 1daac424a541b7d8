//! Bluetooth classic serial transport
//!
//! Delivers framed text to Serial Port Profile modules. Like the wired
//! serial transport, the socket is opened per command and dropped after the
//! write, so a module that wanders out of range never wedges a held handle.

use crate::error::LinkError;
use crate::infrastructure::bluetooth::protocol;

pub async fn send_spp(address: &str, payload: &[u8]) -> Result<(), LinkError> {
    if payload.is_empty() {
        return Ok(());
    }
    let raw = protocol::parse_mac(address)?;
    platform::send(raw, payload).await?;
    tracing::debug!("sent {} bytes over SPP to {address}", payload.len());
    Ok(())
}

#[cfg(windows)]
mod platform {
    use super::LinkError;
    use crate::infrastructure::bluetooth::protocol;
    use windows::core::GUID;
    use windows::Devices::Bluetooth::BluetoothDevice;
    use windows::Devices::Bluetooth::Rfcomm::RfcommServiceId;
    use windows::Networking::Sockets::StreamSocket;
    use windows::Storage::Streams::DataWriter;

    pub(super) async fn send(address: u64, payload: &[u8]) -> Result<(), LinkError> {
        let device = BluetoothDevice::FromBluetoothAddressAsync(address)
            .map_err(|e| connect_error("resolve device", &e))?
            .await
            .map_err(|e| connect_error("resolve device", &e))?;

        let spp_id = RfcommServiceId::FromUuid(GUID::from_u128(
            protocol::SPP_SERVICE_UUID.as_u128(),
        ))
        .map_err(|e| connect_error("service id", &e))?;
        let result = device
            .GetRfcommServicesForIdAsync(&spp_id)
            .map_err(|e| connect_error("service query", &e))?
            .await
            .map_err(|e| connect_error("service query", &e))?;
        let services = result
            .Services()
            .map_err(|e| connect_error("service list", &e))?;
        if services.Size().map_err(|e| connect_error("service list", &e))? == 0 {
            return Err(LinkError::ServiceOrCharacteristicNotFound);
        }
        let service = services
            .GetAt(0)
            .map_err(|e| connect_error("service list", &e))?;

        let socket = StreamSocket::new().map_err(|e| connect_error("socket", &e))?;
        socket
            .ConnectAsync(
                &service
                    .ConnectionHostName()
                    .map_err(|e| connect_error("host name", &e))?,
                &service
                    .ConnectionServiceName()
                    .map_err(|e| connect_error("service name", &e))?,
            )
            .map_err(|e| connect_error("connect", &e))?
            .await
            .map_err(|e| connect_error("connect", &e))?;

        let writer = DataWriter::CreateDataWriter(
            &socket
                .OutputStream()
                .map_err(|e| connect_error("output stream", &e))?,
        )
        .map_err(|e| connect_error("writer", &e))?;
        writer
            .WriteBytes(payload)
            .map_err(|e| LinkError::WriteRejected(format!("{e:?}")))?;
        writer
            .StoreAsync()
            .map_err(|e| LinkError::WriteRejected(format!("{e:?}")))?
            .await
            .map_err(|e| LinkError::WriteRejected(format!("{e:?}")))?;
        let _ = socket.Close();
        Ok(())
    }

    fn connect_error(what: &str, err: &windows::core::Error) -> LinkError {
        LinkError::ConnectFailed(format!("{what}: {err:?}"))
    }
}

#[cfg(not(windows))]
mod platform {
    use super::LinkError;

    pub(super) async fn send(_address: u64, _payload: &[u8]) -> Result<(), LinkError> {
        Err(LinkError::AdapterUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_payload_needs_no_radio() {
        assert!(send_spp("AA:BB:CC:DD:EE:FF", b"").await.is_ok());
    }

    #[tokio::test]
    async fn malformed_address_is_rejected_up_front() {
        let err = send_spp("garbage", b"x").await.unwrap_err();
        assert!(matches!(err, LinkError::InvalidAddress(_)));
    }
}
