//! Drill map engine shared by the CLI and library users.
//! Reads holes from a board document, draws markers and the legend table
//! back onto it and reports what it found.

use serde::{Deserialize, Serialize};

use crate::board::BoardDocument;
use crate::drill::markers::MarkerKind;
use crate::drill::table::{origin_from_anchor, InvalidColumn};
use crate::drill::{
    assign_markers, column_widths, find_overlaps, parse_columns, DrillGroups, DrillType,
    MarkerAssignment, OverlapPair, TableColumn, TableLayout,
};
use crate::geometry::{iu_to_mm, mm_to_iu, BoundingBox, Point};
use crate::parser::pcb::PcbParseError;
use crate::parser::pcb_schema::PcbLayer;

/// Accepted range for the table text size, in millimetres
pub const TEXT_SIZE_RANGE_MM: (f64, f64) = (0.1, 10.0);

/// Offset of an automatically placed table from the board outline: right of
/// its left edge and below its bottom edge.
const TABLE_OFFSET_MM: (f64, f64) = (10.0, 30.0);

#[derive(Debug, thiserror::Error)]
pub enum DrillMapError {
    #[error("Invalid layer name: {0}")]
    InvalidLayer(String),
    #[error("Invalid column name: {0}")]
    InvalidColumn(String),
    #[error("Invalid table text size (mm): {0}")]
    InvalidTextSize(f64),
    #[error("Unknown drill shape: {0}")]
    UnknownDrillShape(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PcbParseError> for DrillMapError {
    fn from(e: PcbParseError) -> Self {
        match e {
            PcbParseError::Io(io) => DrillMapError::Io(io),
            other => DrillMapError::Parse(other.to_string()),
        }
    }
}

impl From<InvalidColumn> for DrillMapError {
    fn from(e: InvalidColumn) -> Self {
        DrillMapError::InvalidColumn(e.0)
    }
}

/// Options for a drill map run. Every field has a default, so a partial
/// JSON document deserializes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrillMapOptions {
    pub layer_name: String,
    pub clear_layer: bool,
    pub table_columns: Vec<String>,
    pub table_text_size_mm: f64,
    pub table_title: String,
    /// Top-left corner of the table; located automatically when unset
    pub table_position_mm: Option<(f64, f64)>,
}

impl Default for DrillMapOptions {
    fn default() -> Self {
        Self {
            layer_name: "Eco1.User".to_string(),
            clear_layer: true,
            table_columns: vec![
                "Size (mils)".to_string(),
                "Size (mm)".to_string(),
                "Quantity".to_string(),
                "Plated".to_string(),
            ],
            table_text_size_mm: 1.5,
            table_title: "DRILL CHART: TOP TO BOTTOM".to_string(),
            table_position_mm: None,
        }
    }
}

impl DrillMapOptions {
    /// Options from a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check the board-independent options and return the table columns,
    /// symbol column first.
    pub fn validate(&self) -> Result<Vec<TableColumn>, DrillMapError> {
        let (min, max) = TEXT_SIZE_RANGE_MM;
        let size = self.table_text_size_mm;
        if !(min..=max).contains(&size) {
            return Err(DrillMapError::InvalidTextSize(size));
        }
        Ok(parse_columns(&self.table_columns)?)
    }
}

/// One legend row as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrillTypeSummary {
    pub plated: bool,
    pub oblong: bool,
    pub width_mm: f64,
    pub height_mm: f64,
    pub count: usize,
    pub marker_index: usize,
    pub marker: String,
}

impl DrillTypeSummary {
    fn new(drill_type: &DrillType, count: usize, marker_index: usize) -> Self {
        Self {
            plated: drill_type.plated,
            oblong: drill_type.is_oblong(),
            width_mm: iu_to_mm(drill_type.size.width),
            height_mm: iu_to_mm(drill_type.size.height),
            count,
            marker_index,
            marker: MarkerKind::from_index(marker_index).name(),
        }
    }
}

/// Outcome of a run: advisory warnings, the progress log and what was drawn.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DrillMapResult {
    pub warnings: Vec<String>,
    pub log: Vec<String>,
    pub drill_types: Vec<DrillTypeSummary>,
    pub holes: usize,
    pub overlaps: Vec<OverlapPair>,
    /// Top-left corner of the drawn table, in internal units
    pub table_origin: Option<Point>,
    pub items_added: usize,
}

impl DrillMapResult {
    pub fn has_overlaps(&self) -> bool {
        !self.overlaps.is_empty()
    }

    fn note(&mut self, line: String) {
        tracing::info!("{}", line);
        self.log.push(line);
    }
}

/// Drill map API used by the CLI.
pub struct DrillMap;

impl DrillMap {
    /// Draw the drill map onto `board`.
    ///
    /// Options and hole data are checked before the board is modified, so
    /// an error leaves the board as it was.
    pub fn run(
        board: &mut BoardDocument,
        options: &DrillMapOptions,
    ) -> Result<DrillMapResult, DrillMapError> {
        let columns = options.validate()?;
        let layer = board
            .layer(&options.layer_name)
            .cloned()
            .ok_or_else(|| DrillMapError::InvalidLayer(options.layer_name.clone()))?;

        let mut result = DrillMapResult::default();
        let (groups, markers) = Self::analyze(board, &mut result)?;

        let text_size = mm_to_iu(options.table_text_size_mm);
        let widths = column_widths(&columns, &groups);
        let origin = Self::table_origin(board, options, &layer, &groups, &mut result);

        if options.clear_layer {
            let removed = board.clear_layer(&layer);
            result.note(format!(
                "Cleared {} drawings from layer {}",
                removed, layer.canonical_name
            ));
        }

        let mut primitives = Vec::new();
        for ((drill_type, positions), marker) in groups.iter().zip(markers.markers()) {
            for position in positions {
                primitives.extend(marker.primitives(*position, drill_type.size.min_side()));
            }
        }
        let layout = TableLayout::new(origin, text_size, options.table_title.as_str(), &columns, &widths);
        primitives.extend(layout.primitives(&groups, &markers));

        result.items_added = board.add_primitives(&layer, &primitives);
        result.table_origin = Some(origin);
        tracing::debug!("Added {} items to {}", result.items_added, layer.canonical_name);

        Self::check_overlaps(&groups, &mut result);
        Ok(result)
    }

    /// Classify the holes and check for overlaps without changing the board.
    pub fn report(board: &BoardDocument) -> Result<DrillMapResult, DrillMapError> {
        let mut result = DrillMapResult::default();
        let (groups, _) = Self::analyze(board, &mut result)?;
        Self::check_overlaps(&groups, &mut result);
        Ok(result)
    }

    fn analyze(
        board: &BoardDocument,
        result: &mut DrillMapResult,
    ) -> Result<(DrillGroups, MarkerAssignment), DrillMapError> {
        let groups = DrillGroups::classify(board.hole_records()?);
        result.holes = groups.hole_count();
        result.note(format!("Found {} drill types", groups.len()));

        let markers = assign_markers(&groups);
        result.warnings.extend(markers.warning.iter().cloned());
        result.drill_types = groups
            .iter()
            .zip(markers.indices())
            .map(|((dt, positions), index)| DrillTypeSummary::new(dt, positions.len(), index))
            .collect();
        Ok((groups, markers))
    }

    fn check_overlaps(groups: &DrillGroups, result: &mut DrillMapResult) {
        result.overlaps = find_overlaps(groups);
        for pair in &result.overlaps {
            let line = pair.describe();
            tracing::warn!("{}", line);
            result.log.push(line);
        }
    }

    /// Explicit position, then an anchor left by an earlier run, then below
    /// the board outline.
    fn table_origin(
        board: &BoardDocument,
        options: &DrillMapOptions,
        layer: &PcbLayer,
        groups: &DrillGroups,
        result: &mut DrillMapResult,
    ) -> Point {
        if let Some((x, y)) = options.table_position_mm {
            return Point::from_mm(x, y);
        }
        if let Some((position, row_height)) = board.find_anchor(layer) {
            tracing::debug!("Reusing table position from anchor at {:?}", position);
            return origin_from_anchor(position, row_height);
        }

        let (dx, dy) = TABLE_OFFSET_MM;
        let below = |bbox: BoundingBox| Point::new(bbox.left + mm_to_iu(dx), bbox.bottom + mm_to_iu(dy));

        if let Some(bbox) = board.outline_bbox() {
            return below(bbox);
        }
        let holes = groups.flatten().into_iter().map(|(p, _)| p);
        match BoundingBox::enclosing(holes) {
            Some(bbox) => {
                let warning = "No board outline found, placing the drill table below the holes";
                tracing::warn!("{}", warning);
                result.warnings.push(warning.to_string());
                below(bbox)
            }
            None => {
                let warning = "No board outline or holes found, placing the drill table at the origin";
                tracing::warn!("{}", warning);
                result.warnings.push(warning.to_string());
                Point::default()
            }
        }
    }
}
