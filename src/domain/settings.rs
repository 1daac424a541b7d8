use crate::domain::config::{ConnectionConfig, TextFraming};
use crate::domain::range::AxisRanges;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "funlink".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    #[default]
    Udp,
    Tcp,
    Serial,
    BluetoothSerial,
    BleLinear,
    BleText,
}

/// Persisted link settings. The per-transport fields are kept flat so that
/// switching `connection_type` back and forth never loses the values entered
/// for the other kinds; `connection()` resolves the selected kind into the
/// snapshot the dispatcher consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSettings {
    // Master switch: when off, no connection resolves and nothing is sent.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub connection_type: ConnectionKind,

    // Network targets (UDP and TCP)
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    // Raw serial
    #[serde(default)]
    pub serial_port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    // Bluetooth targets
    #[serde(default)]
    pub bt_serial_address: String,
    #[serde(default)]
    pub ble_linear_address: String,
    #[serde(default = "default_axis")]
    pub ble_linear_axis: String, // axis forwarded to a linear-protocol device
    #[serde(default)]
    pub ble_text_address: String,

    // Text framing on the byte-oriented transports
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_suffix")]
    pub suffix: String,

    #[serde(default)]
    pub axis_ranges: AxisRanges,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            connection_type: ConnectionKind::default(),
            host: default_host(),
            port: default_port(),
            serial_port: String::new(),
            baud_rate: default_baud_rate(),
            bt_serial_address: String::new(),
            ble_linear_address: String::new(),
            ble_linear_axis: default_axis(),
            ble_text_address: String::new(),
            prefix: String::new(),
            suffix: default_suffix(),
            axis_ranges: AxisRanges::default(),
            log_settings: LogSettings::default(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_baud_rate() -> u32 {
    9600
}
fn default_axis() -> String {
    "L0".to_string()
}
fn default_suffix() -> String {
    "\n".to_string()
}

impl LinkSettings {
    /// Resolves the selected transport into an immutable connection snapshot.
    /// Returns `None` when the link is disabled.
    pub fn connection(&self) -> Option<ConnectionConfig> {
        if !self.enabled {
            return None;
        }
        Some(match self.connection_type {
            ConnectionKind::Udp => ConnectionConfig::Udp {
                host: self.host.clone(),
                port: self.port,
            },
            ConnectionKind::Tcp => ConnectionConfig::Tcp {
                host: self.host.clone(),
                port: self.port,
            },
            ConnectionKind::Serial => ConnectionConfig::Serial {
                port: self.serial_port.clone(),
                baud: self.baud_rate,
            },
            ConnectionKind::BluetoothSerial => ConnectionConfig::BluetoothSerial {
                address: self.bt_serial_address.clone(),
            },
            ConnectionKind::BleLinear => ConnectionConfig::BleLinear {
                address: self.ble_linear_address.clone(),
                axis: self.ble_linear_axis.clone(),
            },
            ConnectionKind::BleText => ConnectionConfig::BleText {
                address: self.ble_text_address.clone(),
            },
        })
    }

    pub fn framing(&self) -> TextFraming {
        TextFraming {
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
        }
    }
}

pub struct SettingsService {
    settings: LinkSettings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::from_path(settings_path))
    }

    /// Opens settings at an explicit path, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn from_path(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("funlink");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<LinkSettings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &LinkSettings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut LinkSettings {
        &mut self.settings
    }

    pub fn update_axis_range(&mut self, axis: &str, min: f32, max: f32) -> anyhow::Result<()> {
        self.settings.axis_ranges.set(axis, min, max);
        self.save()
    }
}
