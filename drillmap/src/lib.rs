//! drillmap - drill charts for KiCad boards
//!
//! This library reads the drilled holes of a KiCad board, groups them into
//! drill types, draws a marker on every hole and a legend table describing
//! each type onto a drawing layer, and reports holes that overlap. It also
//! writes the component placement files an assembly house asks for.
//!
//! # Quick Start
//!
//! ```no_run
//! use drillmap::{BoardDocument, DrillMap, DrillMapOptions};
//! use std::path::Path;
//!
//! let mut board = BoardDocument::open(Path::new("board.kicad_pcb")).unwrap();
//! let result = DrillMap::run(&mut board, &DrillMapOptions::default()).unwrap();
//!
//! for line in &result.log {
//!     println!("{}", line);
//! }
//! board.save(Path::new("board.kicad_pcb.new")).unwrap();
//! ```
//!
//! # Features
//!
//! - **Drill classification**: holes grouped by plating, size and shape
//! - **Markers**: 129 distinct symbols assigned in drill type order
//! - **Legend table**: configurable columns, re-placed where the last run left it
//! - **Overlap detection**: holes whose extents intersect are reported
//! - **Placement data**: centroid and XYRS files from footprint positions

pub mod board;
pub mod core;
pub mod draw;
pub mod drill;
pub mod geometry;
pub mod parser;
pub mod placement;

// Re-export main types
pub use board::BoardDocument;
pub use crate::core::{DrillMap, DrillMapError, DrillMapOptions, DrillMapResult, DrillTypeSummary};
pub use drill::{
    DrillGroups, DrillType, HoleRecord, HoleShape, MarkerAssignment, MarkerKind, OverlapPair,
    TableColumn,
};
pub use parser::pcb::PcbParser;
pub use parser::pcb_schema::PcbDesign;
pub use placement::{Placement, PlacementRow};

/// Open a board file (convenience wrapper).
pub fn open_board(path: &std::path::Path) -> Result<BoardDocument, DrillMapError> {
    Ok(BoardDocument::open(path)?)
}

/// Parse a PCB file without keeping the document (convenience wrapper).
pub fn parse_pcb(path: &std::path::Path) -> Result<PcbDesign, DrillMapError> {
    Ok(PcbParser::parse_pcb(path)?)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        BoardDocument, DrillMap, DrillMapError, DrillMapOptions, DrillMapResult, DrillType,
        HoleRecord, HoleShape, TableColumn,
    };
}
