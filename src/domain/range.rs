//! Per-axis motion range limits.
//!
//! Users narrow an axis to a comfortable sub-range (e.g. 20%..80%). Commands
//! still speak the full 0..100 scale; the mapping below rescales a command
//! position into the configured window before it is encoded for the device.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Allowed travel window for one axis, in percent of full scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f32,
    pub max: f32,
}

impl Default for AxisRange {
    fn default() -> Self {
        AxisRange { min: 0.0, max: 100.0 }
    }
}

/// Range settings keyed by axis id. Axes without an entry use the full range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AxisRanges(pub BTreeMap<String, AxisRange>);

impl AxisRanges {
    pub fn get(&self, axis: &str) -> AxisRange {
        self.0.get(axis).copied().unwrap_or_default()
    }

    pub fn set(&mut self, axis: impl Into<String>, min: f32, max: f32) {
        self.0.insert(axis.into(), AxisRange { min, max });
    }
}

/// Maps a command position (percent) into `range` and returns the result as
/// a unit fraction.
///
/// The position is interpreted as a fraction of the way from `range.min` to
/// `range.max`; the mapped percentage is then normalized to `[0.0, 1.0]`.
/// The final clamp keeps inverted or out-of-scale ranges from producing a
/// fraction outside the unit interval.
pub fn mapped_fraction(position: u8, range: &AxisRange) -> f64 {
    let t = f64::from(position.min(100)) / 100.0;
    let mapped = f64::from(range.min) + t * f64::from(range.max - range.min);
    (mapped / 100.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_range_is_identity() {
        let range = AxisRange::default();
        assert_eq!(mapped_fraction(0, &range), 0.0);
        assert_eq!(mapped_fraction(50, &range), 0.5);
        assert_eq!(mapped_fraction(100, &range), 1.0);
    }

    #[test]
    fn narrowed_range_rescales() {
        let range = AxisRange { min: 20.0, max: 80.0 };
        assert_eq!(mapped_fraction(0, &range), 0.2);
        assert_eq!(mapped_fraction(50, &range), 0.5);
        assert_eq!(mapped_fraction(100, &range), 0.8);
        assert!((mapped_fraction(75, &range) - 0.65).abs() < 1e-9);
    }

    #[test]
    fn inverted_range_maps_downward() {
        let range = AxisRange { min: 80.0, max: 20.0 };
        assert_eq!(mapped_fraction(0, &range), 0.8);
        assert_eq!(mapped_fraction(100, &range), 0.2);
    }

    #[test]
    fn result_is_clamped_to_unit_interval() {
        let range = AxisRange { min: -40.0, max: 140.0 };
        assert_eq!(mapped_fraction(0, &range), 0.0);
        assert_eq!(mapped_fraction(100, &range), 1.0);
    }

    #[test]
    fn missing_axis_falls_back_to_full_range() {
        let mut ranges = AxisRanges::default();
        ranges.set("L0", 10.0, 90.0);
        assert_eq!(ranges.get("L0"), AxisRange { min: 10.0, max: 90.0 });
        assert_eq!(ranges.get("R2"), AxisRange::default());
    }
}
