//! Windows GATT backend
//!
//! Maps the backend primitives onto the WinRT Bluetooth stack. A
//! `BluetoothLEDevice` resolved from the raw address is ready for GATT
//! traffic immediately; the physical link comes up on the first operation,
//! so `Connected` is reported as soon as the device object is live. Link
//! drops surface through `ConnectionStatusChanged` and write outcomes
//! through the completion of each `WriteValueWithOptionAsync` operation.

use crate::error::LinkError;
use crate::infrastructure::bluetooth::gatt::{
    ConnectMode, EventSender, GattBackend, GattEvent, GattStatus, WriteKind,
};
use crate::infrastructure::bluetooth::protocol;
use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;
use windows::core::GUID;
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattCommunicationStatus, GattDeviceService, GattSession, GattWriteOption,
};
use windows::Devices::Bluetooth::{BluetoothConnectionStatus, BluetoothLEDevice};
use windows::Foundation::Collections::IVectorView;
use windows::Foundation::TypedEventHandler;
use windows::Storage::Streams::DataWriter;

const E_ACCESS_DENIED: windows::core::HRESULT = windows::core::HRESULT(0x80070005u32 as i32);

/// GATT backend over the WinRT Bluetooth stack.
pub struct WinRtBackend {
    device: Option<BluetoothLEDevice>,
    session: Option<GattSession>,
    services: Option<IVectorView<GattDeviceService>>,
    characteristic: Option<GattCharacteristic>,
    events: Option<EventSender>,
}

impl WinRtBackend {
    pub fn new() -> Self {
        Self {
            device: None,
            session: None,
            services: None,
            characteristic: None,
            events: None,
        }
    }

    /// Create a GattSession for the device. With `maintain` set, Windows
    /// keeps reconnecting in the background until the device appears.
    async fn create_session(
        device: &BluetoothLEDevice,
        maintain: bool,
    ) -> Result<GattSession, LinkError> {
        let device_id = device
            .BluetoothDeviceId()
            .map_err(|e| winrt_error("device id", &e))?;
        let session = GattSession::FromDeviceIdAsync(&device_id)
            .map_err(|e| winrt_error("create session", &e))?
            .await
            .map_err(|e| winrt_error("create session", &e))?;
        if maintain {
            session
                .SetMaintainConnection(true)
                .map_err(|e| winrt_error("maintain connection", &e))?;
        }
        Ok(session)
    }
}

impl Default for WinRtBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GattBackend for WinRtBackend {
    async fn start_connect(
        &mut self,
        address: &str,
        mode: ConnectMode,
        events: EventSender,
    ) -> Result<(), LinkError> {
        let raw = protocol::parse_mac(address)?;
        let device = BluetoothLEDevice::FromBluetoothAddressAsync(raw)
            .map_err(|e| winrt_error("resolve device", &e))?
            .await
            .map_err(|e| winrt_error("resolve device", &e))?;
        if let Ok(name) = device.Name() {
            debug!("resolved BLE device {address} ({name})");
        }

        // Forward link drops for the lifetime of this device object.
        let sender = events.clone();
        let status_handler =
            TypedEventHandler::new(move |dev: windows::core::Ref<BluetoothLEDevice>, _| {
                if let Some(dev) = dev.as_ref() {
                    if let Ok(status) = dev.ConnectionStatus() {
                        if status == BluetoothConnectionStatus::Disconnected {
                            let _ = sender.send(GattEvent::Disconnected {
                                status: GattStatus::Unreachable,
                            });
                        }
                    }
                }
                Ok(())
            });
        device
            .ConnectionStatusChanged(&status_handler)
            .map_err(|e| winrt_error("status handler", &e))?;

        if mode == ConnectMode::Background {
            match Self::create_session(&device, true).await {
                Ok(session) => self.session = Some(session),
                Err(err) => warn!("background session unavailable: {err}"),
            }
        }

        let _ = events.send(GattEvent::Connected);
        self.device = Some(device);
        self.events = Some(events);
        Ok(())
    }

    async fn request_mtu(&mut self, _mtu: u16) -> Result<(), LinkError> {
        // WinRT negotiates the PDU size on its own; report what the stack
        // settled on.
        if self.session.is_none() {
            if let Some(device) = &self.device {
                self.session = Some(Self::create_session(device, false).await?);
            }
        }
        if let (Some(session), Some(events)) = (&self.session, &self.events) {
            if let Ok(size) = session.MaxPduSize() {
                let _ = events.send(GattEvent::MtuChanged(size));
            }
        }
        Ok(())
    }

    async fn discover_services(&mut self) -> Result<(), LinkError> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| LinkError::ConnectFailed("no device resolved".to_string()))?;

        let result = device
            .GetGattServicesAsync()
            .map_err(|e| winrt_error("service discovery", &e))?
            .await
            .map_err(|e| winrt_error("service discovery", &e))?;

        let status = result
            .Status()
            .map_err(|e| winrt_error("discovery status", &e))?;
        if status == GattCommunicationStatus::Success {
            self.services = Some(
                result
                    .Services()
                    .map_err(|e| winrt_error("service list", &e))?,
            );
        }
        if let Some(events) = &self.events {
            let _ = events.send(GattEvent::ServicesDiscovered {
                status: map_status(status),
            });
        }
        Ok(())
    }

    async fn select_characteristic(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), LinkError> {
        let services = self
            .services
            .as_ref()
            .ok_or(LinkError::ServiceOrCharacteristicNotFound)?;
        let service_guid = GUID::from_u128(service.as_u128());
        let char_guid = GUID::from_u128(characteristic.as_u128());

        let mut matched = None;
        let count = services
            .Size()
            .map_err(|e| winrt_error("service list", &e))?;
        for i in 0..count {
            let s = services.GetAt(i).map_err(|e| winrt_error("service list", &e))?;
            if s.Uuid().map_err(|e| winrt_error("service uuid", &e))? == service_guid {
                matched = Some(s);
                break;
            }
        }
        let service = matched.ok_or(LinkError::ServiceOrCharacteristicNotFound)?;

        let access = service
            .RequestAccessAsync()
            .map_err(|e| winrt_error("service access", &e))?
            .await
            .map_err(|e| winrt_error("service access", &e))?;
        debug!("service access status: {access:?}");

        let chars_result = service
            .GetCharacteristicsAsync()
            .map_err(|e| winrt_error("characteristics", &e))?
            .await
            .map_err(|e| winrt_error("characteristics", &e))?;
        let status = chars_result
            .Status()
            .map_err(|e| winrt_error("characteristics status", &e))?;
        if status != GattCommunicationStatus::Success {
            return Err(LinkError::ServiceOrCharacteristicNotFound);
        }

        let characteristics = chars_result
            .Characteristics()
            .map_err(|e| winrt_error("characteristic list", &e))?;
        let count = characteristics
            .Size()
            .map_err(|e| winrt_error("characteristic list", &e))?;
        for i in 0..count {
            let c = characteristics
                .GetAt(i)
                .map_err(|e| winrt_error("characteristic list", &e))?;
            if c.Uuid().map_err(|e| winrt_error("characteristic uuid", &e))? == char_guid {
                debug!("write characteristic pinned");
                self.characteristic = Some(c);
                return Ok(());
            }
        }
        Err(LinkError::ServiceOrCharacteristicNotFound)
    }

    async fn submit_write(&mut self, payload: &[u8], kind: WriteKind) -> Result<(), LinkError> {
        let characteristic = self
            .characteristic
            .as_ref()
            .ok_or(LinkError::ServiceOrCharacteristicNotFound)?;

        let writer = DataWriter::new().map_err(|e| write_error(&e))?;
        writer.WriteBytes(payload).map_err(|e| write_error(&e))?;
        let buffer = writer.DetachBuffer().map_err(|e| write_error(&e))?;

        let option = match kind {
            WriteKind::Confirmed => GattWriteOption::WriteWithResponse,
            WriteKind::Unconfirmed => GattWriteOption::WriteWithoutResponse,
        };
        let operation = characteristic
            .WriteValueWithOptionAsync(&buffer, option)
            .map_err(|e| write_error(&e))?;

        // Completion is reported out of band so slow devices never block the
        // submission path.
        let events = self.events.clone();
        tokio::spawn(async move {
            let status = match operation.await {
                Ok(status) => map_status(status),
                Err(err) => {
                    debug!("write operation failed: {err:?}");
                    GattStatus::ProtocolError
                }
            };
            if let Some(events) = events {
                let _ = events.send(GattEvent::WriteCompleted { status });
            }
        });
        Ok(())
    }

    async fn close(&mut self) {
        self.characteristic = None;
        self.services = None;
        if let Some(session) = self.session.take() {
            let _ = session.Close();
        }
        if let Some(device) = self.device.take() {
            let _ = device.Close();
        }
        self.events = None;
    }
}

fn map_status(status: GattCommunicationStatus) -> GattStatus {
    match status {
        GattCommunicationStatus::Success => GattStatus::Success,
        GattCommunicationStatus::Unreachable => GattStatus::Unreachable,
        GattCommunicationStatus::AccessDenied => GattStatus::AccessDenied,
        _ => GattStatus::ProtocolError,
    }
}

fn winrt_error(what: &str, err: &windows::core::Error) -> LinkError {
    if err.code() == E_ACCESS_DENIED {
        LinkError::PermissionDenied
    } else {
        LinkError::ConnectFailed(format!("{what}: {err:?}"))
    }
}

fn write_error(err: &windows::core::Error) -> LinkError {
    if err.code() == E_ACCESS_DENIED {
        LinkError::PermissionDenied
    } else {
        LinkError::WriteRejected(format!("{err:?}"))
    }
}
