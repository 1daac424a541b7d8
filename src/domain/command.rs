//! Axis command text codec.
//!
//! The wire text format is `axisId:position:durationMs` segments joined by
//! `;`, e.g. `L0:75:500;R1:20:500`. Position is a percentage in `[0, 100]`,
//! duration is milliseconds. The same format is produced by the encoder and
//! consumed by the parser, so `parse(build(..))` returns the input segments.

use std::collections::BTreeMap;

/// Axes a device can expose. `L*` are linear channels, `R*` rotary ones.
pub const AXIS_NAMES: [&str; 6] = ["L0", "L1", "L2", "R0", "R1", "R2"];

/// One parsed `axis:position:duration` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisSegment {
    pub axis: String,
    /// Target position as a percentage, always within `[0, 100]`.
    pub position: u8,
    pub duration_ms: u32,
}

/// Parses a multi-axis command string into its segments.
///
/// Segments that do not have the `axis:position:duration` shape, or whose
/// numeric fields do not parse, are skipped rather than failing the whole
/// command. Out-of-range positions are clamped to `[0, 100]`.
pub fn parse_axis_command(command: &str) -> Vec<AxisSegment> {
    command.split(';').filter_map(parse_segment).collect()
}

fn parse_segment(segment: &str) -> Option<AxisSegment> {
    let mut parts = segment.trim().split(':');
    let axis = parts.next()?.trim();
    let position = parts.next()?.trim();
    let duration = parts.next()?.trim();
    if parts.next().is_some() || axis.is_empty() {
        return None;
    }
    let position: i64 = position.parse().ok()?;
    let duration_ms: u32 = duration.parse().ok()?;
    Some(AxisSegment {
        axis: axis.to_string(),
        position: position.clamp(0, 100) as u8,
        duration_ms,
    })
}

/// Builds a command string from per-axis target positions.
///
/// All axes share the one duration; map iteration order (sorted by axis id)
/// fixes the segment order, which keeps output stable for tests and logs.
pub fn build_axis_command(positions: &BTreeMap<String, u8>, duration_ms: u32) -> String {
    positions
        .iter()
        .map(|(axis, position)| format!("{axis}:{}:{duration_ms}", position.min(&100)))
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_segment() {
        let segments = parse_axis_command("L0:75:500");
        assert_eq!(
            segments,
            vec![AxisSegment {
                axis: "L0".to_string(),
                position: 75,
                duration_ms: 500,
            }]
        );
    }

    #[test]
    fn parses_multi_axis_command() {
        let segments = parse_axis_command("L0:10:200;R1:90:200");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].axis, "L0");
        assert_eq!(segments[1].axis, "R1");
        assert_eq!(segments[1].position, 90);
    }

    #[test]
    fn skips_malformed_segments() {
        let segments = parse_axis_command("L0:10:200;garbage;R0:nope:5;L1:20");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].axis, "L0");

        assert!(parse_axis_command("").is_empty());
        assert!(parse_axis_command(";;;").is_empty());
        assert!(parse_axis_command("L0:1:2:3").is_empty());
    }

    #[test]
    fn clamps_out_of_range_positions() {
        let segments = parse_axis_command("L0:150:100;L1:-5:100");
        assert_eq!(segments[0].position, 100);
        assert_eq!(segments[1].position, 0);
    }

    #[test]
    fn tolerates_trailing_separator_and_whitespace() {
        let segments = parse_axis_command(" L0:50:300 ; ");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].position, 50);
        assert_eq!(segments[0].duration_ms, 300);
    }

    #[test]
    fn builds_in_axis_order() {
        let mut positions = BTreeMap::new();
        positions.insert("R0".to_string(), 30);
        positions.insert("L0".to_string(), 80);
        assert_eq!(build_axis_command(&positions, 500), "L0:80:500;R0:30:500");
    }

    #[test]
    fn build_then_parse_round_trips() {
        let mut positions = BTreeMap::new();
        for (i, axis) in AXIS_NAMES.iter().enumerate() {
            positions.insert(axis.to_string(), (i as u8) * 15);
        }
        let command = build_axis_command(&positions, 250);
        let segments = parse_axis_command(&command);
        assert_eq!(segments.len(), AXIS_NAMES.len());
        for segment in &segments {
            assert_eq!(segment.duration_ms, 250);
            assert_eq!(positions[&segment.axis], segment.position);
        }
    }

    #[test]
    fn empty_positions_build_empty_command() {
        assert_eq!(build_axis_command(&BTreeMap::new(), 500), "");
    }
}
