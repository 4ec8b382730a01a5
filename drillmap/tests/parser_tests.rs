//! Tests for KiCad board parsing

use drillmap::parser::pcb_schema::{DrillShape, GraphicType, MountType, PadType, Position};
use drillmap::{open_board, parse_pcb};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn test_parse_simple_board() {
    let pcb = parse_pcb(&fixture_path("simple_board.kicad_pcb")).expect("Should parse");

    assert_eq!(pcb.version, Some(20221018));
    assert_eq!(pcb.footprints.len(), 3);
    assert_eq!(pcb.vias.len(), 3);
    let pad_holes = pcb
        .footprints
        .iter()
        .flat_map(|fp| fp.pads.iter())
        .filter(|p| p.drill.is_some())
        .count();
    assert_eq!(pad_holes + pcb.vias.len(), 11);

    let eco = pcb.find_layer("User.Eco1").expect("Should resolve layer alias");
    assert_eq!(eco.canonical_name, "Eco1.User");
}

#[test]
fn test_parse_invalid_file() {
    let result = parse_pcb(&PathBuf::from("not_a_real_file.kicad_pcb"));
    assert!(result.is_err(), "Should fail on nonexistent file");
}

#[test]
fn test_parse_footprint_rotation_and_drills() {
    let pcb = parse_pcb(&fixture_path("simple_board.kicad_pcb")).expect("Should parse");

    let usb = pcb
        .footprints
        .iter()
        .find(|fp| fp.reference == "J2")
        .expect("Should find USB connector");
    assert_eq!(usb.rotation, 90.0);

    let slots: Vec<_> = usb
        .pads
        .iter()
        .filter(|p| p.pad_type == PadType::ThruHole)
        .collect();
    assert_eq!(slots.len(), 2);
    let drill = slots[0].drill.as_ref().expect("Slot should have a drill");
    assert_eq!(drill.shape, DrillShape::Oval);
    assert_eq!((drill.width, drill.height), (0.6, 1.7));

    let smd = usb.pads.iter().find(|p| p.pad_type == PadType::SMD).unwrap();
    assert!(smd.drill.is_none());
}

#[test]
fn test_parse_legacy_modules() {
    let pcb = parse_pcb(&fixture_path("legacy_board.kicad_pcb")).expect("Should parse");

    assert_eq!(pcb.version, Some(20171130));
    let refs: Vec<_> = pcb.footprints.iter().map(|fp| fp.reference.as_str()).collect();
    assert_eq!(refs, vec!["R1", "H1"]);

    let edges = pcb
        .graphics
        .iter()
        .filter(|g| g.layer == "Edge.Cuts" && g.item_type == GraphicType::Line)
        .count();
    assert_eq!(edges, 4);
}

#[test]
fn test_open_board_keeps_unrelated_content() {
    let board = open_board(&fixture_path("simple_board.kicad_pcb")).expect("Should open");
    let text = board.to_kicad_string();

    assert!(text.starts_with("(kicad_pcb"));
    assert!(text.contains("(net 2 \"VCC\")"));
    assert!(text.contains("\"Rev A\""));
    assert!(text.contains("(paper \"A4\")"));
}

#[test]
fn test_parse_broken_hole_pad_fails() {
    let err = parse_pcb(&fixture_path("broken_pad.kicad_pcb")).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Parse error: Pad 2 of J9: Missing required field: drill size"
    );
}

#[test]
fn test_parse_placement_fields() {
    let pcb = parse_pcb(&fixture_path("placement_board.kicad_pcb")).expect("Should parse");

    assert_eq!(pcb.aux_origin, Position::new(100.0, 100.0));
    let c1 = pcb.footprints.iter().find(|fp| fp.reference == "C1").unwrap();
    assert!(c1.is_bottom());
    assert_eq!(c1.mount, MountType::Smd);
    assert_eq!(c1.pads[0].angle, 90.0);

    let r1 = pcb.footprints.iter().find(|fp| fp.reference == "R1").unwrap();
    assert_eq!(r1.property("MPN"), Some("RC0603FR-0710KL"));

    let u1 = pcb.footprints.iter().find(|fp| fp.reference == "U1").unwrap();
    assert!(u1.dnp);
    let fid = pcb.footprints.iter().find(|fp| fp.reference == "FID1").unwrap();
    assert!(fid.exclude_from_pos);
}
