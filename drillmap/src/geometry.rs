//! Board coordinates and unit conversion.
//!
//! KiCad files store millimetres as decimals; everything inside the drill map
//! works in integer internal units (nanometres) so that grouping and overlap
//! tests are exact.

use serde::{Deserialize, Serialize};

/// Internal units per millimetre
pub const IU_PER_MM: f64 = 1_000_000.0;
/// Internal units per mil (thousandth of an inch)
pub const IU_PER_MILS: f64 = 25_400.0;

/// Convert millimetres to internal units, rounding to the nearest unit.
pub fn mm_to_iu(mm: f64) -> i64 {
    (mm * IU_PER_MM).round() as i64
}

pub fn iu_to_mm(iu: i64) -> f64 {
    iu as f64 / IU_PER_MM
}

pub fn iu_to_mils(iu: i64) -> f64 {
    iu as f64 / IU_PER_MILS
}

/// Millimetre value as written into a board file: at most six decimals, no trailing zeros.
pub fn format_mm(iu: i64) -> String {
    let text = format!("{:.6}", iu_to_mm(iu));
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

/// A point in internal units, y growing downwards as on the board.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn from_mm(x: f64, y: f64) -> Self {
        Self::new(mm_to_iu(x), mm_to_iu(y))
    }

    pub const fn offset(self, dx: i64, dy: i64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Width and height in internal units. Ordered by width, then height.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Size {
    pub width: i64,
    pub height: i64,
}

impl Size {
    pub const fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }

    pub const fn square(side: i64) -> Self {
        Self::new(side, side)
    }

    pub fn min_side(&self) -> i64 {
        self.width.min(self.height)
    }
}

/// Axis-aligned box, inclusive on all edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl BoundingBox {
    pub fn around(point: Point) -> Self {
        Self {
            left: point.x,
            top: point.y,
            right: point.x,
            bottom: point.y,
        }
    }

    pub fn include(&mut self, point: Point) {
        self.left = self.left.min(point.x);
        self.top = self.top.min(point.y);
        self.right = self.right.max(point.x);
        self.bottom = self.bottom.max(point.y);
    }

    pub fn merge(&mut self, other: &BoundingBox) {
        self.include(Point::new(other.left, other.top));
        self.include(Point::new(other.right, other.bottom));
    }

    /// Smallest box holding every point, `None` for an empty iterator.
    pub fn enclosing(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut points = points.into_iter();
        let mut bbox = Self::around(points.next()?);
        for p in points {
            bbox.include(p);
        }
        Some(bbox)
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }
}

/// Rotate a footprint-relative offset by `degrees` (counter-clockwise on screen).
pub fn rotate(dx: f64, dy: f64, degrees: f64) -> (f64, f64) {
    if degrees == 0.0 {
        return (dx, dy);
    }
    let (sin, cos) = degrees.to_radians().sin_cos();
    // y points down, so a screen-CCW rotation flips the sign of the sin terms
    (dx * cos + dy * sin, -dx * sin + dy * cos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mm_round_trip() {
        assert_eq!(mm_to_iu(0.8), 800_000);
        assert_eq!(mm_to_iu(0.799), 799_000);
        assert_eq!(mm_to_iu(-12.7), -12_700_000);
        assert!((iu_to_mils(mm_to_iu(25.4)) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_format_mm() {
        assert_eq!(format_mm(1_500_000), "1.5");
        assert_eq!(format_mm(100_000_000), "100");
        assert_eq!(format_mm(-250_000), "-0.25");
        assert_eq!(format_mm(0), "0");
        assert_eq!(format_mm(1), "0.000001");
    }

    #[test]
    fn test_size_ordering() {
        assert!(Size::new(800_000, 800_000) < Size::new(800_001, 0));
        assert!(Size::new(600_000, 1_200_000) < Size::new(600_000, 1_300_000));
        assert_eq!(Size::new(600_000, 1_200_000).min_side(), 600_000);
    }

    #[test]
    fn test_bounding_box() {
        let bbox = BoundingBox::enclosing([Point::new(5, -2), Point::new(-3, 7), Point::new(0, 0)])
            .unwrap();
        assert_eq!(bbox.left, -3);
        assert_eq!(bbox.top, -2);
        assert_eq!(bbox.right, 5);
        assert_eq!(bbox.bottom, 7);
        assert_eq!(bbox.width(), 8);
        assert_eq!(bbox.height(), 9);
        assert!(BoundingBox::enclosing(std::iter::empty()).is_none());
    }

    #[test]
    fn test_rotate_quarter_turn() {
        // A pad 1mm to the right ends up 1mm above after a 90 degree turn
        let (x, y) = rotate(1.0, 0.0, 90.0);
        assert!(x.abs() < 1e-12);
        assert!((y + 1.0).abs() < 1e-12);
    }
}
