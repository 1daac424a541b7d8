//! Connection target description.
//!
//! A `ConnectionConfig` is an immutable snapshot of where a command should
//! go. Callers build one (usually from [`LinkSettings`]) and hand it to the
//! dispatcher per call, so a settings change never affects a send already in
//! flight.
//!
//! [`LinkSettings`]: super::settings::LinkSettings

use serde::{Deserialize, Serialize};

/// One fully-resolved transport target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionConfig {
    /// Datagram per command, no session.
    Udp { host: String, port: u16 },
    /// Fresh stream per command, closed after the write.
    Tcp { host: String, port: u16 },
    /// Raw serial port (8N1), opened per command.
    Serial { port: String, baud: u32 },
    /// Bluetooth Classic SPP (RFCOMM), one socket per command.
    BluetoothSerial { address: String },
    /// BLE device speaking the binary linear-motion protocol. Commands are
    /// reduced to the one configured axis before encoding.
    BleLinear { address: String, axis: String },
    /// BLE UART bridge that takes the framed command text as-is.
    BleText { address: String },
}

impl ConnectionConfig {
    /// Short tag used in log and diagnostic lines.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ConnectionConfig::Udp { .. } => "udp",
            ConnectionConfig::Tcp { .. } => "tcp",
            ConnectionConfig::Serial { .. } => "serial",
            ConnectionConfig::BluetoothSerial { .. } => "bt-serial",
            ConnectionConfig::BleLinear { .. } => "ble-linear",
            ConnectionConfig::BleText { .. } => "ble-text",
        }
    }
}

/// Prefix/suffix wrapped around command text on the byte-oriented transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFraming {
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

fn default_suffix() -> String {
    "\n".to_string()
}

impl Default for TextFraming {
    fn default() -> Self {
        TextFraming {
            prefix: String::new(),
            suffix: default_suffix(),
        }
    }
}

impl TextFraming {
    pub fn frame(&self, command: &str) -> String {
        format!("{}{}{}", self.prefix, command, self.suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_wraps_command() {
        let framing = TextFraming {
            prefix: "CMD:".to_string(),
            suffix: "\n".to_string(),
        };
        assert_eq!(framing.frame("L0:75:500"), "CMD:L0:75:500\n");
    }

    #[test]
    fn default_framing_appends_newline_only() {
        assert_eq!(TextFraming::default().frame("L0:0:100"), "L0:0:100\n");
    }

    #[test]
    fn config_serializes_tagged() {
        let config = ConnectionConfig::Udp {
            host: "192.168.1.10".to_string(),
            port: 8080,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"udp\""));
        let back: ConnectionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn kind_names_are_stable() {
        let config = ConnectionConfig::BleLinear {
            address: "AA:BB:CC:DD:EE:FF".to_string(),
            axis: "L0".to_string(),
        };
        assert_eq!(config.kind_name(), "ble-linear");
    }
}
