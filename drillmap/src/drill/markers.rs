//! Marker palette and marker assignment.
//!
//! Each drill type gets a symbol drawn at every hole of that type and in the
//! legend. Symbols are picked from a fixed palette by the rank of the drill
//! type in sorted order; once the palette runs out the last symbol repeats.

use serde::Serialize;

use super::{DrillGroups, DrillType};
use crate::draw::Primitive;
use crate::geometry::{mm_to_iu, Point};

/// Characters used by the lettered markers, in palette order
const GLYPHS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ123456789";

/// Number of shape-only markers at the start of the palette
const SHAPE_MARKERS: usize = 7;

/// Total number of distinct markers
pub const MARKER_PALETTE_LEN: usize = SHAPE_MARKERS + 2 * GLYPHS.len();

pub const PALETTE_EXHAUSTED_WARNING: &str =
    "Found more drill types than available markers. Different drills have been assigned the same marker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarkerKind {
    Cross,
    X,
    CrossCircle,
    XCircle,
    Square,
    Triangle,
    TriangleCircle,
    CharCircle(char),
    CharSquare(char),
}

/// Parts a marker is composed of, drawn in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Circle,
    Cross,
    X,
    Square,
    Triangle,
    Glyph(char),
}

impl MarkerKind {
    /// Palette entry at `index`; indices past the end map to the last entry.
    pub fn from_index(index: usize) -> Self {
        let glyphs = GLYPHS.as_bytes();
        match index.min(MARKER_PALETTE_LEN - 1) {
            0 => MarkerKind::Cross,
            1 => MarkerKind::X,
            2 => MarkerKind::CrossCircle,
            3 => MarkerKind::XCircle,
            4 => MarkerKind::Square,
            5 => MarkerKind::Triangle,
            6 => MarkerKind::TriangleCircle,
            i if i - SHAPE_MARKERS < glyphs.len() => {
                MarkerKind::CharCircle(glyphs[i - SHAPE_MARKERS] as char)
            }
            i => MarkerKind::CharSquare(glyphs[i - SHAPE_MARKERS - glyphs.len()] as char),
        }
    }

    /// The whole palette in assignment order.
    pub fn palette() -> impl Iterator<Item = MarkerKind> {
        (0..MARKER_PALETTE_LEN).map(MarkerKind::from_index)
    }

    pub fn name(&self) -> String {
        match self {
            MarkerKind::Cross => "cross".to_string(),
            MarkerKind::X => "x".to_string(),
            MarkerKind::CrossCircle => "cross in circle".to_string(),
            MarkerKind::XCircle => "x in circle".to_string(),
            MarkerKind::Square => "square".to_string(),
            MarkerKind::Triangle => "triangle".to_string(),
            MarkerKind::TriangleCircle => "triangle in circle".to_string(),
            MarkerKind::CharCircle(c) => format!("'{}' in circle", c),
            MarkerKind::CharSquare(c) => format!("'{}' in square", c),
        }
    }

    fn parts(&self) -> Vec<Part> {
        match *self {
            MarkerKind::Cross => vec![Part::Cross],
            MarkerKind::X => vec![Part::X],
            MarkerKind::CrossCircle => vec![Part::Circle, Part::Cross],
            MarkerKind::XCircle => vec![Part::Circle, Part::X],
            MarkerKind::Square => vec![Part::Square],
            MarkerKind::Triangle => vec![Part::Triangle],
            MarkerKind::TriangleCircle => vec![Part::Circle, Part::Triangle],
            MarkerKind::CharCircle(c) => vec![Part::Circle, Part::Glyph(c)],
            MarkerKind::CharSquare(c) => vec![Part::Square, Part::Glyph(c)],
        }
    }

    /// Primitives for this marker centred on `center`, `size` across (capped at 5mm).
    pub fn primitives(&self, center: Point, size: i64) -> Vec<Primitive> {
        let size = size.min(mm_to_iu(5.0));
        let half = size / 2;
        let width = (0.1 * size as f64).clamp(0.01e6, 0.3e6) as i64;
        let (x, y) = (center.x, center.y);

        let mut out = Vec::new();
        for part in self.parts() {
            match part {
                Part::Circle => out.push(Primitive::circle(center, half, width)),
                Part::Cross => {
                    out.push(Primitive::segment(
                        Point::new(x - half, y),
                        Point::new(x + half, y),
                        width,
                    ));
                    out.push(Primitive::segment(
                        Point::new(x, y - half),
                        Point::new(x, y + half),
                        width,
                    ));
                }
                Part::X => {
                    out.push(Primitive::segment(
                        Point::new(x - half, y - half),
                        Point::new(x + half, y + half),
                        width,
                    ));
                    out.push(Primitive::segment(
                        Point::new(x - half, y + half),
                        Point::new(x + half, y - half),
                        width,
                    ));
                }
                Part::Square => {
                    let corners = [
                        Point::new(x - half, y - half),
                        Point::new(x + half, y - half),
                        Point::new(x + half, y + half),
                        Point::new(x - half, y + half),
                    ];
                    for i in 0..4 {
                        out.push(Primitive::segment(corners[i], corners[(i + 1) % 4], width));
                    }
                }
                Part::Triangle => {
                    let dx = (3f64.sqrt() * half as f64 / 2.0) as i64;
                    let dy = half / 2;
                    let apex = Point::new(x, y - half);
                    let left = Point::new(x - dx, y + dy);
                    let right = Point::new(x + dx, y + dy);
                    out.push(Primitive::segment(left, apex, width));
                    out.push(Primitive::segment(right, apex, width));
                    out.push(Primitive::segment(left, right, width));
                }
                Part::Glyph(c) => {
                    out.push(Primitive::text(c.to_string(), center, (0.7 * size as f64) as i64));
                }
            }
        }
        out
    }
}

/// Palette index per drill type, in sorted drill type order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerAssignment {
    pub entries: Vec<(DrillType, usize)>,
    pub warning: Option<String>,
}

impl MarkerAssignment {
    /// Palette indices in drill type order, the same order `DrillGroups::iter` yields.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|(_, index)| *index)
    }

    pub fn markers(&self) -> impl Iterator<Item = MarkerKind> + '_ {
        self.indices().map(MarkerKind::from_index)
    }
}

/// Assign palette markers to the drill types of `groups`.
pub fn assign_markers(groups: &DrillGroups) -> MarkerAssignment {
    assign_with_palette_len(groups.drill_types().copied(), MARKER_PALETTE_LEN)
}

/// Rank the types in ascending order and give rank `r` palette index
/// `min(r, palette_len - 1)`.
pub fn assign_with_palette_len<I>(types: I, palette_len: usize) -> MarkerAssignment
where
    I: IntoIterator<Item = DrillType>,
{
    let mut types: Vec<DrillType> = types.into_iter().collect();
    types.sort();
    types.dedup();

    let last = palette_len.saturating_sub(1);
    let warning = if types.len() > palette_len {
        tracing::warn!(
            "{} drill types for {} markers, later types share the last marker",
            types.len(),
            palette_len
        );
        Some(PALETTE_EXHAUSTED_WARNING.to_string())
    } else {
        None
    };

    let entries = types
        .into_iter()
        .enumerate()
        .map(|(rank, dt)| (dt, rank.min(last)))
        .collect();

    MarkerAssignment { entries, warning }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drill::HoleShape;
    use crate::geometry::Size;

    fn plated_circle(d: i64) -> DrillType {
        DrillType {
            plated: true,
            size: Size::square(d),
            shape: HoleShape::Circle,
        }
    }

    #[test]
    fn test_palette_layout() {
        let palette: Vec<_> = MarkerKind::palette().collect();
        assert_eq!(palette.len(), MARKER_PALETTE_LEN);
        assert_eq!(palette.len(), 129);
        assert_eq!(palette[0], MarkerKind::Cross);
        assert_eq!(palette[6], MarkerKind::TriangleCircle);
        assert_eq!(palette[7], MarkerKind::CharCircle('a'));
        assert_eq!(palette[67], MarkerKind::CharCircle('9'));
        assert_eq!(palette[68], MarkerKind::CharSquare('a'));
        assert_eq!(palette[128], MarkerKind::CharSquare('9'));
        assert_eq!(MarkerKind::from_index(10_000), MarkerKind::CharSquare('9'));
    }

    #[test]
    fn test_ten_types_eight_markers() {
        let types: Vec<_> = (1..=10).map(|i| plated_circle(i * 100_000)).collect();
        let assignment = assign_with_palette_len(types.iter().rev().copied(), 8);

        let indices: Vec<usize> = assignment.indices().collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5, 6, 7, 7, 7]);
        assert_eq!(assignment.entries[8], (types[8], 7));
        assert_eq!(assignment.entries[9], (types[9], 7));
        assert_eq!(assignment.warning.as_deref(), Some(PALETTE_EXHAUSTED_WARNING));
    }

    #[test]
    fn test_assignment_is_deterministic_and_monotonic() {
        let types: Vec<_> = (0..40).map(|i| plated_circle(200_000 + (i * 7919) % 1_000_000)).collect();
        let forward = assign_with_palette_len(types.clone(), 16);
        let backward = assign_with_palette_len(types.into_iter().rev(), 16);
        assert_eq!(forward, backward);

        for pair in forward.entries.windows(2) {
            assert!(pair[0].0 < pair[1].0);
            assert!(pair[0].1 <= pair[1].1);
            assert!(pair[1].1 <= 15);
        }
    }

    #[test]
    fn test_no_warning_when_palette_suffices() {
        let assignment = assign_with_palette_len((1..=8).map(|i| plated_circle(i * 100_000)), 8);
        assert!(assignment.warning.is_none());
        assert_eq!(assignment.entries.last().map(|e| e.1), Some(7));
    }

    #[test]
    fn test_markers_follow_group_order() {
        use crate::drill::{DrillGroups, HoleRecord};

        let holes = [400_000, 1_000_000, 400_000, 3_200_000].iter().map(|d| HoleRecord {
            plated: true,
            size: Size::square(*d),
            shape: HoleShape::Circle,
            position: Point::new(*d, 0),
        });
        let groups = DrillGroups::classify(holes);
        let assignment = assign_markers(&groups);

        let paired: Vec<(i64, MarkerKind)> = groups
            .drill_types()
            .zip(assignment.markers())
            .map(|(dt, marker)| (dt.size.width, marker))
            .collect();
        assert_eq!(
            paired,
            vec![
                (400_000, MarkerKind::Cross),
                (1_000_000, MarkerKind::from_index(1)),
                (3_200_000, MarkerKind::from_index(2)),
            ]
        );
    }

    #[test]
    fn test_composite_marker_is_union_of_parts() {
        let center = Point::new(0, 0);
        let cross = MarkerKind::Cross.primitives(center, 1_000_000);
        let cross_circle = MarkerKind::CrossCircle.primitives(center, 1_000_000);
        assert_eq!(cross.len(), 2);
        assert_eq!(cross_circle.len(), 3);
        assert_eq!(cross_circle[0], Primitive::circle(center, 500_000, 100_000));
        assert_eq!(&cross_circle[1..], &cross[..]);
    }

    #[test]
    fn test_marker_size_and_width_limits() {
        let big = MarkerKind::Square.primitives(Point::new(0, 0), 20_000_000);
        match &big[0] {
            Primitive::Segment { start, width, .. } => {
                assert_eq!(*start, Point::new(-2_500_000, -2_500_000));
                assert_eq!(*width, 300_000);
            }
            other => panic!("Expected segment, got {:?}", other),
        }

        let tiny = MarkerKind::X.primitives(Point::new(0, 0), 50_000);
        match &tiny[0] {
            Primitive::Segment { width, .. } => assert_eq!(*width, 10_000),
            other => panic!("Expected segment, got {:?}", other),
        }
    }

    #[test]
    fn test_char_marker_has_text() {
        let prims = MarkerKind::CharSquare('Q').primitives(Point::new(5, 5), 1_000_000);
        assert_eq!(prims.len(), 5);
        match &prims[4] {
            Primitive::Text { text, size, position, .. } => {
                assert_eq!(text, "Q");
                assert_eq!(*size, 700_000);
                assert_eq!(*position, Point::new(5, 5));
            }
            other => panic!("Expected text, got {:?}", other),
        }
    }
}
