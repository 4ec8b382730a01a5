//! Board document: the parsed KiCad file plus the edits a drill map makes.
//!
//! The S-expression tree is kept as read so that everything the drill map
//! does not touch is written back unchanged; the [`PcbDesign`] view is kept
//! in step with every edit.

use std::path::{Path, PathBuf};

use crate::core::DrillMapError;
use crate::draw::{HAlign, Primitive};
use crate::drill::{parse_anchor, HoleRecord, HoleShape};
use crate::geometry::{format_mm, iu_to_mm, mm_to_iu, rotate, BoundingBox, Point, Size};
use crate::parser::pcb::{PcbParseError, PcbParser};
use crate::parser::pcb_schema::{DrillShape, GraphicItem, GraphicType, PadType, PcbDesign, PcbLayer, Position};
use crate::parser::sexp::{SExp, SExpParser};

/// Layer holding the board outline
pub const OUTLINE_LAYER: &str = "Edge.Cuts";

/// First format version written by KiCad 7, which wraps line widths in `(stroke ...)`
const STROKE_VERSION: u32 = 20_221_018;
/// First format version that names item identifiers `uuid` rather than `tstamp`
const UUID_VERSION: u32 = 20_231_120;
/// Versions before this (KiCad 5) carry no identifiers on board graphics
const TSTAMP_VERSION: u32 = 20_200_000;

/// Board-level items that count as drawings on a layer
const DRAWING_TAGS: &[&str] = &[
    "gr_line", "gr_arc", "gr_circle", "gr_rect", "gr_poly", "gr_curve", "gr_text",
    "gr_text_box", "dimension", "target",
];

pub struct BoardDocument {
    root: SExp,
    design: PcbDesign,
    path: Option<PathBuf>,
}

impl BoardDocument {
    /// Read a `.kicad_pcb` file
    pub fn open(path: &Path) -> Result<Self, PcbParseError> {
        let content = std::fs::read_to_string(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let mut doc = Self::parse(&content, filename)?;
        doc.path = Some(path.to_path_buf());
        Ok(doc)
    }

    pub fn parse(content: &str, filename: &str) -> Result<Self, PcbParseError> {
        let root = SExpParser::new(content).parse()?;
        let design = PcbParser::from_sexp(&root, filename)?;
        tracing::debug!(
            "Parsed {}: {} footprints, {} vias, {} graphics",
            filename,
            design.footprints.len(),
            design.vias.len(),
            design.graphics.len()
        );
        Ok(Self {
            root,
            design,
            path: None,
        })
    }

    pub fn design(&self) -> &PcbDesign {
        &self.design
    }

    /// File this document was opened from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn layer(&self, name: &str) -> Option<&PcbLayer> {
        self.design.find_layer(name)
    }

    /// Every drilled hole: footprint pads first, then vias, in file order.
    pub fn hole_records(&self) -> Result<Vec<HoleRecord>, DrillMapError> {
        let mut records = Vec::new();

        for fp in &self.design.footprints {
            for pad in &fp.pads {
                let Some(drill) = &pad.drill else { continue };
                let plated = pad.pad_type == PadType::ThruHole;
                let shape = match &drill.shape {
                    DrillShape::Circle => HoleShape::Circle,
                    DrillShape::Oval => HoleShape::Oblong,
                    DrillShape::Other(token) => {
                        return Err(DrillMapError::UnknownDrillShape(format!(
                            "{} on pad {} of {}",
                            token, pad.number, fp.reference
                        )))
                    }
                };
                let (dx, dy) = rotate(pad.position.x, pad.position.y, fp.rotation);
                records.push(HoleRecord {
                    plated,
                    size: Size::new(mm_to_iu(drill.width), mm_to_iu(drill.height)),
                    shape,
                    position: Point::from_mm(fp.position.x + dx, fp.position.y + dy),
                });
            }
        }

        for via in &self.design.vias {
            records.push(HoleRecord {
                plated: true,
                size: Size::square(mm_to_iu(via.drill)),
                shape: HoleShape::Circle,
                position: Point::from_mm(via.position.x, via.position.y),
            });
        }

        Ok(records)
    }

    /// Bounding box of the board-level outline graphics
    pub fn outline_bbox(&self) -> Option<BoundingBox> {
        let mut bbox: Option<BoundingBox> = None;
        for item in self
            .design
            .graphics
            .iter()
            .filter(|g| g.layer == OUTLINE_LAYER)
        {
            if let Some(item_box) = graphic_bbox(item) {
                match bbox.as_mut() {
                    Some(b) => b.merge(&item_box),
                    None => bbox = Some(item_box),
                }
            }
        }
        bbox
    }

    /// First table anchor text on `layer`: its position and the row height it encodes.
    pub fn find_anchor(&self, layer: &PcbLayer) -> Option<(Point, i64)> {
        self.design
            .graphics
            .iter()
            .filter(|g| g.item_type == GraphicType::Text && on_layer(&g.layer, layer))
            .find_map(|g| {
                let row_height = parse_anchor(g.text.as_deref()?)?;
                let at = g.points.first()?;
                Some((Point::from_mm(at.x, at.y), row_height))
            })
    }

    /// Remove every board drawing on `layer`; returns how many were removed.
    pub fn clear_layer(&mut self, layer: &PcbLayer) -> usize {
        let Some(items) = self.root.as_list_mut() else {
            return 0;
        };
        let before = items.len();
        items.retain(|item| {
            let is_drawing = item.tag().is_some_and(|t| DRAWING_TAGS.contains(&t));
            let item_layer = item.value_of("layer").unwrap_or_default();
            !(is_drawing && on_layer(item_layer, layer))
        });
        let removed = before - items.len();

        self.design.graphics.retain(|g| !on_layer(&g.layer, layer));
        tracing::debug!("Removed {} drawings from {}", removed, layer.canonical_name);
        removed
    }

    /// Append primitives to the board as graphics on `layer`.
    pub fn add_primitives(&mut self, layer: &PcbLayer, primitives: &[Primitive]) -> usize {
        let version = self.design.version.unwrap_or(0);
        let new_items: Vec<SExp> = primitives
            .iter()
            .map(|p| primitive_to_sexp(p, &layer.canonical_name, version))
            .collect();
        if let Some(items) = self.root.as_list_mut() {
            items.extend(new_items);
        }
        self.design.graphics.extend(
            primitives
                .iter()
                .map(|p| primitive_to_graphic(p, &layer.canonical_name)),
        );
        primitives.len()
    }

    /// The board in KiCad's file layout
    pub fn to_kicad_string(&self) -> String {
        self.root.to_pretty_string()
    }

    pub fn save(&self, path: &Path) -> Result<(), DrillMapError> {
        std::fs::write(path, self.to_kicad_string())?;
        tracing::info!("Saved board to {}", path.display());
        Ok(())
    }
}

fn on_layer(item_layer: &str, layer: &PcbLayer) -> bool {
    item_layer == layer.canonical_name || layer.user_name.as_deref() == Some(item_layer)
}

fn to_point(p: &Position) -> Point {
    Point::from_mm(p.x, p.y)
}

fn graphic_bbox(item: &GraphicItem) -> Option<BoundingBox> {
    match item.item_type {
        GraphicType::Circle => {
            let center = to_point(item.points.first()?);
            let edge = to_point(item.points.get(1)?);
            let radius = ((edge.x - center.x) as f64).hypot((edge.y - center.y) as f64) as i64;
            BoundingBox::enclosing([
                center.offset(-radius, -radius),
                center.offset(radius, radius),
            ])
        }
        GraphicType::Arc => arc_bbox(item)
            .or_else(|| BoundingBox::enclosing(item.points.iter().map(to_point))),
        _ => BoundingBox::enclosing(item.points.iter().map(to_point)),
    }
}

/// Box of an arc: both ends plus every axis extreme the sweep passes.
/// Angles are measured from +x towards +y, in board coordinates.
fn arc_bbox(item: &GraphicItem) -> Option<BoundingBox> {
    let (center, start, sweep) = match (item.points.as_slice(), item.arc_angle) {
        ([center, start], Some(angle)) => (*center, *start, angle),
        ([start, mid, end], None) => {
            let center = circumcentre(start, mid, end)?;
            let first = polar_angle(&center, start);
            let ccw = |p: &Position| (polar_angle(&center, p) - first).rem_euclid(360.0);
            let to_end = ccw(end);
            let sweep = if ccw(mid) <= to_end { to_end } else { to_end - 360.0 };
            (center, *start, sweep)
        }
        _ => return None,
    };

    let radius = (start.x - center.x).hypot(start.y - center.y);
    let first = polar_angle(&center, &start);
    let (lo, hi) = if sweep >= 0.0 {
        (first, first + sweep)
    } else {
        (first + sweep, first)
    };
    let on_arc = |deg: f64| {
        let rad = deg.to_radians();
        Position::new(center.x + radius * rad.cos(), center.y + radius * rad.sin())
    };

    let mut points = vec![on_arc(first), on_arc(first + sweep)];
    let mut quadrant = (lo / 90.0).ceil() * 90.0;
    while quadrant <= hi {
        points.push(on_arc(quadrant));
        quadrant += 90.0;
    }
    BoundingBox::enclosing(points.iter().map(to_point))
}

fn polar_angle(center: &Position, p: &Position) -> f64 {
    (p.y - center.y).atan2(p.x - center.x).to_degrees()
}

/// Centre of the circle through three points; `None` when they are collinear.
fn circumcentre(a: &Position, b: &Position, c: &Position) -> Option<Position> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < 1e-12 {
        return None;
    }
    let (a2, b2, c2) = (
        a.x * a.x + a.y * a.y,
        b.x * b.x + b.y * b.y,
        c.x * c.x + c.y * c.y,
    );
    Some(Position::new(
        (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
        (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
    ))
}

fn xy(tag: &str, p: Point) -> SExp {
    SExp::node(tag, vec![SExp::atom(format_mm(p.x)), SExp::atom(format_mm(p.y))])
}

fn stroke(width: i64, version: u32) -> SExp {
    let width = SExp::node("width", vec![SExp::atom(format_mm(width))]);
    if version >= STROKE_VERSION {
        SExp::node("stroke", vec![width, SExp::node("type", vec![SExp::atom("solid")])])
    } else {
        width
    }
}

fn identifier(version: u32) -> Option<SExp> {
    let id = uuid::Uuid::new_v4().to_string();
    if version >= UUID_VERSION {
        Some(SExp::node("uuid", vec![SExp::string(id)]))
    } else if version >= TSTAMP_VERSION {
        Some(SExp::node("tstamp", vec![SExp::atom(id)]))
    } else {
        None
    }
}

fn primitive_to_sexp(primitive: &Primitive, layer: &str, version: u32) -> SExp {
    let layer_node = SExp::node("layer", vec![SExp::string(layer)]);
    let mut node = match primitive {
        Primitive::Segment { start, end, width } => SExp::node(
            "gr_line",
            vec![xy("start", *start), xy("end", *end), stroke(*width, version), layer_node],
        ),
        Primitive::Circle {
            center,
            radius,
            width,
        } => SExp::node(
            "gr_circle",
            vec![
                xy("center", *center),
                xy("end", center.offset(*radius, 0)),
                stroke(*width, version),
                layer_node,
            ],
        ),
        Primitive::Text {
            text,
            position,
            size,
            thickness,
            align,
        } => {
            let size = SExp::atom(format_mm(*size));
            let font = SExp::node(
                "font",
                vec![
                    SExp::node("size", vec![size.clone(), size]),
                    SExp::node("thickness", vec![SExp::atom(format_mm(*thickness))]),
                ],
            );
            let mut effects = vec![font];
            if *align == HAlign::Left {
                effects.push(SExp::node("justify", vec![SExp::atom("left")]));
            }
            SExp::node(
                "gr_text",
                vec![
                    SExp::string(text.clone()),
                    xy("at", *position),
                    layer_node,
                    SExp::node("effects", effects),
                ],
            )
        }
    };
    if let (Some(id), Some(items)) = (identifier(version), node.as_list_mut()) {
        items.push(id);
    }
    node
}

fn primitive_to_graphic(primitive: &Primitive, layer: &str) -> GraphicItem {
    let pos = |p: Point| Position::new(iu_to_mm(p.x), iu_to_mm(p.y));
    let (item_type, points, text) = match primitive {
        Primitive::Segment { start, end, .. } => (GraphicType::Line, vec![pos(*start), pos(*end)], None),
        Primitive::Circle { center, radius, .. } => (
            GraphicType::Circle,
            vec![pos(*center), pos(center.offset(*radius, 0))],
            None,
        ),
        Primitive::Text { text, position, .. } => {
            (GraphicType::Text, vec![pos(*position)], Some(text.clone()))
        }
    };
    GraphicItem {
        item_type,
        layer: layer.to_string(),
        points,
        arc_angle: None,
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD: &str = r#"(kicad_pcb (version 20221018) (generator pcbnew)
  (layers (0 "F.Cu" signal) (31 "B.Cu" signal) (44 "Edge.Cuts" user) (48 "Eco1.User" user "User.Eco1"))
  (footprint "R_THT" (layer "F.Cu") (at 10 20 90)
    (property "Reference" "R1")
    (pad "1" thru_hole circle (at 0 0) (size 1.6 1.6) (drill 0.8) (layers "*.Cu"))
    (pad "2" thru_hole circle (at 5 0) (size 1.6 1.6) (drill 0.8) (layers "*.Cu"))
  )
  (via (at 30 40) (size 0.6) (drill 0.3) (layers "F.Cu" "B.Cu") (net 0))
  (gr_rect (start 0 0) (end 50 40) (layer "Edge.Cuts") (stroke (width 0.1) (type solid)))
  (gr_circle (center 48 38) (end 52 38) (layer "Edge.Cuts") (stroke (width 0.1) (type solid)))
  (gr_text "old note" (at 5 60) (layer "Eco1.User"))
  (gr_text "DrillTableLocationMarker(3000000)" (at 10 73) (layer "Eco1.User"))
  (gr_line (start 0 70) (end 10 70) (layer "Eco1.User") (stroke (width 0.1) (type solid)))
  (gr_text "keep me" (at 5 60) (layer "Cmts.User"))
)"#;

    fn doc() -> BoardDocument {
        BoardDocument::parse(BOARD, "test.kicad_pcb").unwrap()
    }

    #[test]
    fn test_hole_records_are_absolute_and_rotated() {
        let holes = doc().hole_records().unwrap();
        assert_eq!(holes.len(), 3);
        assert_eq!(holes[0].position, Point::from_mm(10.0, 20.0));
        // pad 2 sits 5mm along x, turned 90 degrees it ends up 5mm above
        assert_eq!(holes[1].position, Point::from_mm(10.0, 15.0));
        assert_eq!(holes[1].size, Size::square(800_000));
        assert!(holes[2].plated);
        assert_eq!(holes[2].size, Size::square(300_000));
    }

    #[test]
    fn test_broken_hole_pad_fails_to_open() {
        let board = BOARD.replace("(at 5 0) (size 1.6 1.6) (drill 0.8)", "(at 5 0) (size 1.6 1.6) (drill)");
        let err = BoardDocument::parse(&board, "bad.kicad_pcb").err().unwrap();
        assert_eq!(err.to_string(), "Pad 2 of R1: Missing required field: drill size");
        assert!(matches!(DrillMapError::from(err), DrillMapError::Parse(ref s) if s.contains("R1")));
    }

    #[test]
    fn test_unknown_drill_shape_fails() {
        let board = BOARD.replace("(drill 0.8)", "(drill hexagon 0.8)");
        let doc = BoardDocument::parse(&board, "bad.kicad_pcb").unwrap();
        let err = doc.hole_records().unwrap_err();
        assert!(matches!(err, DrillMapError::UnknownDrillShape(ref s) if s.contains("hexagon")));
    }

    #[test]
    fn test_outline_bbox_includes_circles() {
        let bbox = doc().outline_bbox().unwrap();
        assert_eq!(bbox.left, 0);
        assert_eq!(bbox.top, 0);
        assert_eq!(bbox.right, mm_to_iu(52.0));
        assert_eq!(bbox.bottom, mm_to_iu(42.0));
    }

    fn outline_of(items: &str) -> BoundingBox {
        let board = format!(
            "(kicad_pcb (version 20171130) (layers (0 F.Cu signal) (44 Edge.Cuts user)) {})",
            items
        );
        BoardDocument::parse(&board, "arcs.kicad_pcb")
            .unwrap()
            .outline_bbox()
            .unwrap()
    }

    #[test]
    fn test_outline_bbox_legacy_arc() {
        // Centre (10, 10), from (20, 10) through (10, 20) to (0, 10)
        let bbox = outline_of("(gr_arc (start 10 10) (end 20 10) (angle 180) (layer Edge.Cuts) (width 0.1))");
        assert_eq!(
            (bbox.left, bbox.top, bbox.right, bbox.bottom),
            (0, mm_to_iu(10.0), mm_to_iu(20.0), mm_to_iu(20.0))
        );

        // A negative angle sweeps the other way, through (10, 0)
        let bbox = outline_of("(gr_arc (start 10 10) (end 20 10) (angle -180) (layer Edge.Cuts) (width 0.1))");
        assert_eq!((bbox.top, bbox.bottom), (0, mm_to_iu(10.0)));
    }

    #[test]
    fn test_outline_bbox_three_point_arc() {
        // Three quarters of the circle around (10, 10), passing (20, 10) and (10, 20)
        let bbox = outline_of(
            "(gr_arc (start 0 10) (mid 10 0) (end 10 20) (layer Edge.Cuts) (stroke (width 0.1) (type solid)))",
        );
        assert_eq!(
            (bbox.left, bbox.top, bbox.right, bbox.bottom),
            (0, 0, mm_to_iu(20.0), mm_to_iu(20.0))
        );
    }

    #[test]
    fn test_find_anchor() {
        let doc = doc();
        let layer = doc.layer("Eco1.User").unwrap().clone();
        assert_eq!(doc.find_anchor(&layer), Some((Point::from_mm(10.0, 73.0), 3_000_000)));

        let edge = doc.layer("Edge.Cuts").unwrap().clone();
        assert_eq!(doc.find_anchor(&edge), None);
    }

    #[test]
    fn test_clear_layer_only_touches_that_layer() {
        let mut doc = doc();
        let layer = doc.layer("User.Eco1").unwrap().clone();
        assert_eq!(doc.clear_layer(&layer), 3);
        let out = doc.to_kicad_string();
        assert!(!out.contains("old note"));
        assert!(out.contains("keep me"));
        assert!(out.contains("Edge.Cuts"));
        assert!(doc.find_anchor(&layer).is_none());
    }

    #[test]
    fn test_added_primitives_parse_back() {
        let mut doc = doc();
        let layer = doc.layer("Eco1.User").unwrap().clone();
        doc.clear_layer(&layer);
        let added = doc.add_primitives(
            &layer,
            &[
                Primitive::segment(Point::new(0, 0), Point::new(1_000_000, 0), 100_000),
                Primitive::circle(Point::from_mm(3.0, 3.0), 500_000, 100_000),
                Primitive::Text {
                    text: "DrillTableLocationMarker(4000000)".to_string(),
                    position: Point::from_mm(1.5, 2.25),
                    size: 50_000,
                    thickness: 5_000,
                    align: HAlign::Left,
                },
            ],
        );
        assert_eq!(added, 3);
        assert_eq!(doc.find_anchor(&layer), Some((Point::from_mm(1.5, 2.25), 4_000_000)));

        let text = doc.to_kicad_string();
        assert!(text.contains("(stroke\n"));
        assert!(text.contains("(justify left)"));
        assert!(text.contains("(tstamp "));

        let reparsed = BoardDocument::parse(&text, "out.kicad_pcb").unwrap();
        assert_eq!(reparsed.find_anchor(&layer), Some((Point::from_mm(1.5, 2.25), 4_000_000)));
        let circles = reparsed
            .design()
            .graphics
            .iter()
            .filter(|g| g.item_type == GraphicType::Circle && g.layer == "Eco1.User")
            .count();
        assert_eq!(circles, 1);
        assert_eq!(reparsed.hole_records().unwrap().len(), 3);
    }

    #[test]
    fn test_legacy_output_uses_width() {
        let mut doc = BoardDocument::parse(
            "(kicad_pcb (version 20171130) (layers (0 F.Cu signal) (48 Eco1.User user)))",
            "legacy.kicad_pcb",
        )
        .unwrap();
        let layer = doc.layer("Eco1.User").unwrap().clone();
        doc.add_primitives(
            &layer,
            &[Primitive::segment(Point::new(0, 0), Point::new(1_000_000, 0), 100_000)],
        );
        let text = doc.to_kicad_string();
        assert!(text.contains("(width 0.1)"));
        assert!(!text.contains("stroke"));
        assert!(!text.contains("tstamp"));
    }
}
