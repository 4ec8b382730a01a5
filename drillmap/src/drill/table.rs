//! Drill legend table: column registry, column widths and layout.
//!
//! Widths are measured in characters and scaled by the text size when the
//! table is laid out. The header row carries a tiny anchor text,
//! `DrillTableLocationMarker(<row height>)`, so a later run can put the table
//! back where the previous one was without being told the position again.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use super::markers::MarkerAssignment;
use super::{DrillGroups, DrillType};
use crate::draw::{table_line_width, HAlign, Primitive};
use crate::geometry::{iu_to_mils, iu_to_mm, mm_to_iu, Point};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid column name: {0}")]
pub struct InvalidColumn(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TableColumn {
    Symbol,
    SizeMils,
    SizeMm,
    Quantity,
    Plated,
    ToleranceMm,
    ToleranceMils,
}

impl TableColumn {
    pub const ALL: [TableColumn; 7] = [
        TableColumn::Symbol,
        TableColumn::SizeMils,
        TableColumn::SizeMm,
        TableColumn::Quantity,
        TableColumn::Plated,
        TableColumn::ToleranceMm,
        TableColumn::ToleranceMils,
    ];

    /// Name used to select the column
    pub fn identifier(&self) -> &'static str {
        match self {
            TableColumn::Symbol => "Symbol",
            TableColumn::SizeMils => "Size (mils)",
            TableColumn::SizeMm => "Size (mm)",
            TableColumn::Quantity => "Quantity",
            TableColumn::Plated => "Plated",
            TableColumn::ToleranceMm => "Tolerance (mm)",
            TableColumn::ToleranceMils => "Tolerance (mils)",
        }
    }

    /// Text drawn in the header row
    pub fn header(&self) -> &'static str {
        match self {
            TableColumn::Symbol => "SYMBOL",
            TableColumn::SizeMils => "SIZE(mils)",
            TableColumn::SizeMm => "SIZE(mm)",
            TableColumn::Quantity => "QTY",
            TableColumn::Plated => "PLATED",
            TableColumn::ToleranceMm => "TOLERANCE(mm)",
            TableColumn::ToleranceMils => "TOLERANCE(mils)",
        }
    }

    /// Minimum width in characters
    pub fn min_width(&self) -> usize {
        match self {
            TableColumn::Symbol => 8,
            TableColumn::SizeMils | TableColumn::SizeMm => 10,
            TableColumn::Quantity => 6,
            TableColumn::Plated => 8,
            TableColumn::ToleranceMm | TableColumn::ToleranceMils => 16,
        }
    }

    /// Cell text for one drill group. Symbol and tolerance cells are left blank.
    pub fn extract(&self, drill_type: &DrillType, positions: &[Point]) -> String {
        let size = drill_type.size;
        match self {
            TableColumn::SizeMils => {
                let mut text = format!("{:.1}", iu_to_mils(size.width));
                if drill_type.is_oblong() {
                    text.push_str(&format!(" x {:.1}", iu_to_mils(size.height)));
                }
                text
            }
            TableColumn::SizeMm => {
                let mut text = format!("{:.3}", iu_to_mm(size.width));
                if drill_type.is_oblong() {
                    text.push_str(&format!(" x {:.3}", iu_to_mm(size.height)));
                }
                text
            }
            TableColumn::Quantity => positions.len().to_string(),
            TableColumn::Plated => {
                if drill_type.plated {
                    "YES".to_string()
                } else {
                    "NO".to_string()
                }
            }
            TableColumn::Symbol | TableColumn::ToleranceMm | TableColumn::ToleranceMils => {
                String::new()
            }
        }
    }
}

impl FromStr for TableColumn {
    type Err = InvalidColumn;

    /// Case-insensitive and whitespace-insensitive: "size(mm)" selects "Size (mm)".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalize = |text: &str| {
            text.chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase()
        };
        let wanted = normalize(s);
        TableColumn::ALL
            .into_iter()
            .find(|col| normalize(col.identifier()) == wanted)
            .ok_or_else(|| InvalidColumn(s.to_string()))
    }
}

/// Validate the requested columns and put `Symbol` first.
pub fn parse_columns<S: AsRef<str>>(names: &[S]) -> Result<Vec<TableColumn>, InvalidColumn> {
    let mut columns = vec![TableColumn::Symbol];
    for name in names {
        let column: TableColumn = name.as_ref().parse()?;
        if column != TableColumn::Symbol {
            columns.push(column);
        }
    }
    Ok(columns)
}

/// Width of each column in characters: the minimum width, widened to fit
/// the longest cell.
pub fn column_widths(columns: &[TableColumn], groups: &DrillGroups) -> Vec<usize> {
    columns
        .iter()
        .map(|col| {
            groups
                .iter()
                .map(|(dt, positions)| col.extract(dt, positions).chars().count())
                .fold(col.min_width(), usize::max)
        })
        .collect()
}

const ANCHOR_PREFIX: &str = "DrillTableLocationMarker";

fn anchor_regex() -> &'static Regex {
    static ANCHOR: OnceLock<Regex> = OnceLock::new();
    ANCHOR.get_or_init(|| {
        Regex::new(r"^DrillTableLocationMarker\(\s*(\d+)\s*\)").expect("anchor pattern is valid")
    })
}

pub fn format_anchor(row_height: i64) -> String {
    format!("{}({})", ANCHOR_PREFIX, row_height)
}

/// Row height encoded in an anchor text, if `text` is one.
pub fn parse_anchor(text: &str) -> Option<i64> {
    anchor_regex()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Table origin recovered from an anchor found at `anchor_position`.
pub fn origin_from_anchor(anchor_position: Point, row_height: i64) -> Point {
    anchor_position.offset(0, -row_height)
}

/// Geometry of a legend table anchored at its top-left corner.
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub origin: Point,
    pub text_size: i64,
    pub row_height: i64,
    pub title: String,
    pub columns: Vec<(TableColumn, usize)>,
}

impl TableLayout {
    pub fn new(
        origin: Point,
        text_size: i64,
        title: impl Into<String>,
        columns: &[TableColumn],
        widths: &[usize],
    ) -> Self {
        Self {
            origin,
            text_size,
            row_height: 2 * text_size,
            title: title.into(),
            columns: columns.iter().copied().zip(widths.iter().copied()).collect(),
        }
    }

    fn column_width(&self, chars: usize) -> i64 {
        chars as i64 * self.text_size
    }

    pub fn row_width(&self) -> i64 {
        self.columns
            .iter()
            .map(|(_, chars)| self.column_width(*chars))
            .sum()
    }

    /// Height of the header plus one row per group, the span of the column separators.
    pub fn body_height(&self, group_count: usize) -> i64 {
        (group_count as i64 + 1) * self.row_height
    }

    /// Where the anchor text goes: the top-left corner of the header row.
    pub fn anchor_position(&self) -> Point {
        self.origin.offset(0, self.row_height)
    }

    fn rule(&self, y: i64) -> Primitive {
        Primitive::segment(
            Point::new(self.origin.x, y),
            Point::new(self.origin.x + self.row_width(), y),
            table_line_width(),
        )
    }

    /// Centres of each column along a row at height `y`, paired with the column.
    fn cell_centres(&self, y: i64) -> Vec<(TableColumn, Point)> {
        let mut x = self.origin.x;
        self.columns
            .iter()
            .map(|(col, chars)| {
                let half = self.column_width(*chars) / 2;
                x += half;
                let centre = Point::new(x, y);
                x += half;
                (*col, centre)
            })
            .collect()
    }

    /// Title, header, one row per group in sorted order and column separators.
    pub fn primitives(&self, groups: &DrillGroups, markers: &MarkerAssignment) -> Vec<Primitive> {
        let mut out = Vec::new();
        let half_row = self.row_height / 2;
        let mut y = self.origin.y + half_row;

        out.push(Primitive::text(
            self.title.clone(),
            Point::new(self.origin.x + self.row_width() / 2, y),
            self.text_size,
        ));
        y += half_row;

        out.push(self.rule(y));
        out.push(Primitive::Text {
            text: format_anchor(self.row_height),
            position: Point::new(self.origin.x, y),
            size: mm_to_iu(0.05),
            thickness: mm_to_iu(0.005),
            align: HAlign::Left,
        });
        y += half_row;

        for (col, centre) in self.cell_centres(y) {
            out.push(Primitive::text(col.header(), centre, self.text_size));
        }
        y += half_row;
        out.push(self.rule(y));
        y += half_row;

        for ((drill_type, positions), marker) in groups.iter().zip(markers.markers()) {
            for (col, centre) in self.cell_centres(y) {
                if col == TableColumn::Symbol {
                    out.extend(marker.primitives(centre, self.text_size));
                    continue;
                }
                let text = col.extract(drill_type, positions);
                if !text.is_empty() {
                    out.push(Primitive::text(text, centre, self.text_size));
                }
            }
            y += half_row;
            out.push(self.rule(y));
            y += half_row;
        }

        let top = self.origin.y + self.row_height;
        let bottom = top + self.body_height(groups.len());
        let mut x = self.origin.x;
        out.push(Primitive::segment(
            Point::new(x, top),
            Point::new(x, bottom),
            table_line_width(),
        ));
        for (_, chars) in &self.columns {
            x += self.column_width(*chars);
            out.push(Primitive::segment(
                Point::new(x, top),
                Point::new(x, bottom),
                table_line_width(),
            ));
        }

        out
    }
}
