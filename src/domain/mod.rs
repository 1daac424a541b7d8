//! Transport-independent domain types: commands, ranges, and settings.

pub mod command;
pub mod config;
pub mod range;
pub mod settings;

pub use command::{build_axis_command, parse_axis_command, AxisSegment, AXIS_NAMES};
pub use config::{ConnectionConfig, TextFraming};
pub use range::{mapped_fraction, AxisRange, AxisRanges};
pub use settings::{ConnectionKind, LinkSettings, LogSettings, SettingsService};
