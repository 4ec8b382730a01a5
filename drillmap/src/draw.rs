//! Drawing primitives produced by markers and the legend table.

use serde::Serialize;

use crate::geometry::{mm_to_iu, Point};

/// Horizontal text justification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HAlign {
    Left,
    Center,
}

/// A single shape to be placed on the output layer, in internal units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Primitive {
    Segment {
        start: Point,
        end: Point,
        width: i64,
    },
    Circle {
        center: Point,
        radius: i64,
        width: i64,
    },
    Text {
        text: String,
        position: Point,
        size: i64,
        thickness: i64,
        align: HAlign,
    },
}

impl Primitive {
    pub fn segment(start: Point, end: Point, width: i64) -> Self {
        Primitive::Segment { start, end, width }
    }

    pub fn circle(center: Point, radius: i64, width: i64) -> Self {
        Primitive::Circle {
            center,
            radius,
            width,
        }
    }

    /// Centred text with the default stroke: size / 7.5
    pub fn text(text: impl Into<String>, position: Point, size: i64) -> Self {
        Primitive::Text {
            text: text.into(),
            position,
            size,
            thickness: (size as f64 / 7.5) as i64,
            align: HAlign::Center,
        }
    }
}

/// Stroke width for table rules and separators
pub fn table_line_width() -> i64 {
    mm_to_iu(0.1)
}
