//! Drill classification, marker assignment, legend table and overlap checks.
//!
//! Everything here is a pure computation over [`HoleRecord`]s; reading the
//! board and drawing the result live in [`crate::board`].

pub mod classifier;
pub mod markers;
pub mod overlap;
pub mod table;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Size};

pub use classifier::DrillGroups;
pub use markers::{assign_markers, MarkerAssignment, MarkerKind, MARKER_PALETTE_LEN};
pub use overlap::{find_overlaps, OverlapPair};
pub use table::{column_widths, parse_anchor, parse_columns, TableColumn, TableLayout};

/// Drill hole outline. `Circle` sorts before `Oblong`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HoleShape {
    Circle,
    Oblong,
}

/// One drilled hole, in internal units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoleRecord {
    pub plated: bool,
    pub size: Size,
    pub shape: HoleShape,
    pub position: Point,
}

impl HoleRecord {
    pub fn drill_type(&self) -> DrillType {
        DrillType {
            plated: self.plated,
            size: self.size,
            shape: self.shape,
        }
    }
}

/// Grouping key for the legend. The derived order compares `plated`
/// (unplated first), then `size`, then `shape`, and fixes the marker order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DrillType {
    pub plated: bool,
    pub size: Size,
    pub shape: HoleShape,
}

impl DrillType {
    pub fn is_oblong(&self) -> bool {
        self.size.width != self.size.height
    }
}
