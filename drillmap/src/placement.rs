//! Component placement data for assembly: a centroid file for SMT pick and
//! place and a MacroFab style XYRS file.
//!
//! Coordinates are taken relative to the board's auxiliary origin with the
//! Y axis pointing up, the convention assembly houses expect.

use serde::Serialize;

use crate::geometry::{iu_to_mils, iu_to_mm, mm_to_iu, rotate, BoundingBox, Point, Size};
use crate::parser::pcb_schema::{Footprint, MountType, PcbDesign, Position};

/// Field names searched, in order, for a manufacturer part number
pub const MPN_FIELDS: &[&str] = &["MPN", "Manuf Part", "Manufacturer_Part_Number"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Bottom,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Top => "top",
            Side::Bottom => "bottom",
        }
    }
}

/// One placed part, positions in internal units relative to the aux origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacementRow {
    pub reference: String,
    pub value: String,
    pub footprint: String,
    /// Footprint origin
    pub position: Point,
    /// Centre of the pads' bounding box
    pub pad_center: Point,
    /// Pad extent along the part's own axes
    pub pad_size: Size,
    pub rotation: f64,
    pub side: Side,
    pub mount: MountType,
    pub populate: bool,
    pub mpn: Option<String>,
}

/// Placement output API used by the CLI.
pub struct Placement;

impl Placement {
    /// Every part that gets placed, sorted by reference. Virtual footprints
    /// and those excluded from position files are left out.
    pub fn rows(design: &PcbDesign) -> Vec<PlacementRow> {
        let mut rows: Vec<PlacementRow> = design
            .footprints
            .iter()
            .filter(|fp| fp.mount != MountType::Virtual && !fp.exclude_from_pos)
            .map(|fp| placement_row(fp, &design.aux_origin))
            .collect();
        rows.sort_by(|a, b| a.reference.cmp(&b.reference));
        tracing::debug!("{} parts to place", rows.len());
        rows
    }

    /// Centroid file: populated SMT parts, millimetres, every field quoted.
    pub fn centroid(rows: &[PlacementRow]) -> String {
        let mut out = String::from("Units used = mm / deg\n");
        out.push_str("\"RefDes\",\"Layer\",\"LocationX\",\"LocationY\",\"Rotation\"\n");
        for row in rows
            .iter()
            .filter(|r| r.populate && r.mount == MountType::Smd)
        {
            let fields = [
                row.reference.clone(),
                row.side.as_str().to_string(),
                format!("{:.4}", iu_to_mm(row.position.x)),
                format!("{:.4}", iu_to_mm(row.position.y)),
                format!("{:.4}", row.rotation),
            ];
            let quoted: Vec<String> = fields.iter().map(|f| quote(f)).collect();
            out.push_str(&quoted.join(","));
            out.push('\n');
        }
        out
    }

    /// XYRS file: populated parts, tab separated, mils. Through-hole parts
    /// are listed unless `include_th` is false.
    pub fn xyrs(rows: &[PlacementRow], include_th: bool) -> String {
        let mut out = String::from("#Units used = mils / deg\n");
        out.push_str(
            "#Designator\tX-Loc\tY-Loc\tRotation\tSide\tType\tX-Size\tY-Size\tValue\tFootprint\tPopulate\tMPN\n",
        );
        for row in rows
            .iter()
            .filter(|r| r.populate && (include_th || r.mount == MountType::Smd))
        {
            let kind = if row.mount == MountType::Smd { 1 } else { 2 };
            let fields = [
                row.reference.clone(),
                format!("{:.2}", iu_to_mils(row.pad_center.x)),
                format!("{:.2}", iu_to_mils(row.pad_center.y)),
                format!("{:.0}", row.rotation),
                row.side.as_str().to_string(),
                kind.to_string(),
                format!("{:.2}", iu_to_mils(row.pad_size.width)),
                format!("{:.2}", iu_to_mils(row.pad_size.height)),
                row.value.clone(),
                row.footprint.clone(),
                "1".to_string(),
                row.mpn.clone().unwrap_or_default(),
            ];
            let cleaned: Vec<String> = fields.iter().map(|f| f.replace(['\t', '\n'], " ")).collect();
            out.push_str(&cleaned.join("\t"));
            out.push('\n');
        }
        out
    }
}

fn placement_row(fp: &Footprint, aux_origin: &Position) -> PlacementRow {
    let origin = Point::from_mm(aux_origin.x, aux_origin.y);
    let relative = |p: Point| Point::new(p.x - origin.x, origin.y - p.y);
    let position = Point::from_mm(fp.position.x, fp.position.y);

    let (pad_center, pad_size) = match pad_bbox(fp) {
        Some(bbox) => {
            let center = Point::new((bbox.left + bbox.right) / 2, (bbox.top + bbox.bottom) / 2);
            // Board extents turned back onto the part's axes
            let quarter_turn = (fp.rotation.rem_euclid(180.0) - 90.0).abs() < 1e-6;
            let size = if quarter_turn {
                Size::new(bbox.height(), bbox.width())
            } else {
                Size::new(bbox.width(), bbox.height())
            };
            (center, size)
        }
        None => (position, Size::square(0)),
    };

    PlacementRow {
        reference: fp.reference.clone(),
        value: fp.value.clone(),
        footprint: fp.name().to_string(),
        position: relative(position),
        pad_center: relative(pad_center),
        pad_size,
        rotation: fp.rotation,
        side: if fp.is_bottom() { Side::Bottom } else { Side::Top },
        mount: fp.mount,
        populate: !fp.dnp,
        mpn: MPN_FIELDS
            .iter()
            .find_map(|name| fp.property(name))
            .map(str::to_string),
    }
}

/// Board-space box of every pad's copper, pads turned by their own angle.
fn pad_bbox(fp: &Footprint) -> Option<BoundingBox> {
    let mut bbox: Option<BoundingBox> = None;
    for pad in &fp.pads {
        let (dx, dy) = rotate(pad.position.x, pad.position.y, fp.rotation);
        let center = Point::from_mm(fp.position.x + dx, fp.position.y + dy);
        let (sin, cos) = pad.angle.to_radians().sin_cos();
        let (w, h) = (pad.size.0 / 2.0, pad.size.1 / 2.0);
        let half_x = mm_to_iu((w * cos).abs() + (h * sin).abs());
        let half_y = mm_to_iu((w * sin).abs() + (h * cos).abs());

        let pad_box = BoundingBox {
            left: center.x - half_x,
            top: center.y - half_y,
            right: center.x + half_x,
            bottom: center.y + half_y,
        };
        match bbox.as_mut() {
            Some(b) => b.merge(&pad_box),
            None => bbox = Some(pad_box),
        }
    }
    bbox
}

/// Quote a field for the centroid file, doubling embedded quotes
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::pcb::PcbParser;

    const BOARD: &str = r#"(kicad_pcb (version 20240108) (generator "pcbnew")
  (layers (0 "F.Cu" signal) (31 "B.Cu" signal) (44 "Edge.Cuts" user))
  (setup (aux_axis_origin 100 100))
  (footprint "Resistor_SMD:R_0603_1608Metric" (layer "F.Cu") (at 110 95)
    (property "Reference" "R1") (property "Value" "10k") (property "MPN" "RC0603FR-0710KL")
    (attr smd)
    (pad "1" smd roundrect (at -0.825 0) (size 0.8 0.95) (layers "F.Cu"))
    (pad "2" smd roundrect (at 0.825 0) (size 0.8 0.95) (layers "F.Cu")))
  (footprint "Capacitor_SMD:C_0805_2012Metric" (layer "B.Cu") (at 120 90 90)
    (property "Reference" "C1") (property "Value" "100n \"X7R\"")
    (attr smd)
    (pad "1" smd roundrect (at -0.95 0 90) (size 1 1.45) (layers "B.Cu"))
    (pad "2" smd roundrect (at 0.95 0 90) (size 1 1.45) (layers "B.Cu")))
  (footprint "Connector_PinHeader_2.54mm:PinHeader_1x02_P2.54mm_Vertical" (layer "F.Cu") (at 105 105)
    (property "Reference" "J1") (property "Value" "Conn_01x02")
    (attr through_hole)
    (pad "1" thru_hole rect (at 0 0) (size 1.7 1.7) (drill 1) (layers "*.Cu"))
    (pad "2" thru_hole oval (at 0 2.54) (size 1.7 1.7) (drill 1) (layers "*.Cu")))
  (footprint "Package_SO:SOIC-8" (layer "F.Cu") (at 130 80)
    (property "Reference" "U1") (property "Value" "NE555")
    (attr smd dnp)
    (pad "1" smd rect (at 0 0) (size 1.5 0.6) (layers "F.Cu")))
  (footprint "Fiducial:Fiducial_1mm" (layer "F.Cu") (at 101 99)
    (property "Reference" "FID1") (property "Value" "Fiducial")
    (attr smd exclude_from_pos_files))
  (footprint "Symbol:Logo" (layer "F.Cu") (at 135 105)
    (property "Reference" "G1") (property "Value" "LOGO")
    (attr board_only exclude_from_bom))
)"#;

    fn rows() -> Vec<PlacementRow> {
        let design = PcbParser::parse_pcb_str(BOARD, "placement.kicad_pcb").unwrap();
        Placement::rows(&design)
    }

    #[test]
    fn test_rows_sorted_and_filtered() {
        let refs: Vec<_> = rows().iter().map(|r| r.reference.clone()).collect();
        assert_eq!(refs, vec!["C1", "J1", "R1", "U1"]);
    }

    #[test]
    fn test_row_geometry() {
        let rows = rows();
        let c1 = &rows[0];
        assert_eq!(c1.position, Point::from_mm(20.0, 10.0));
        assert_eq!(c1.pad_center, Point::from_mm(20.0, 10.0));
        // 2.9 x 1.45 on the board, turned back by the 90 degree rotation
        assert_eq!(c1.pad_size, Size::new(mm_to_iu(2.9), mm_to_iu(1.45)));
        assert_eq!(c1.side, Side::Bottom);

        let j1 = &rows[1];
        assert_eq!(j1.pad_center, Point::from_mm(5.0, -6.27));
        assert_eq!(j1.pad_size, Size::new(mm_to_iu(1.7), mm_to_iu(4.24)));
        assert_eq!(j1.mount, MountType::ThroughHole);

        let r1 = &rows[2];
        assert_eq!(r1.mpn.as_deref(), Some("RC0603FR-0710KL"));
        assert_eq!(r1.footprint, "R_0603_1608Metric");
        assert!(!rows[3].populate);
    }

    #[test]
    fn test_centroid_file() {
        assert_eq!(
            Placement::centroid(&rows()),
            "Units used = mm / deg\n\
             \"RefDes\",\"Layer\",\"LocationX\",\"LocationY\",\"Rotation\"\n\
             \"C1\",\"bottom\",\"20.0000\",\"10.0000\",\"90.0000\"\n\
             \"R1\",\"top\",\"10.0000\",\"5.0000\",\"0.0000\"\n"
        );
    }

    #[test]
    fn test_xyrs_file() {
        let text = Placement::xyrs(&rows(), true);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#Units used = mils / deg");
        assert!(lines[1].starts_with("#Designator\tX-Loc\tY-Loc\tRotation"));
        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[2],
            "C1\t787.40\t393.70\t90\tbottom\t1\t114.17\t57.09\t100n \"X7R\"\tC_0805_2012Metric\t1\t"
        );
        assert_eq!(
            lines[3],
            "J1\t196.85\t-246.85\t0\ttop\t2\t66.93\t166.93\tConn_01x02\tPinHeader_1x02_P2.54mm_Vertical\t1\t"
        );
        assert!(lines[4].starts_with("R1\t393.70\t196.85\t0\ttop\t1\t96.46\t37.40\t10k\t"));
        assert!(lines[4].ends_with("\tRC0603FR-0710KL"));

        let smd_only = Placement::xyrs(&rows(), false);
        assert!(!smd_only.contains("J1"));
        assert!(smd_only.contains("C1"));
    }

    #[test]
    fn test_quote_doubles_quotes() {
        assert_eq!(quote("100n \"X7R\""), "\"100n \"\"X7R\"\"\"");
    }
}
