//! KiCAD PCB Parser
//!
//! This module parses KiCAD PCB files (.kicad_pcb) into the parts of the
//! design the drill map consumes: layers, footprint pads, vias and board
//! graphics.
//!
//! Key format details:
//! - All values are in millimeters
//! - Layers are identified by ordinal number and canonical name
//! - Pad positions are relative to their footprint and rotate with it
//! - KiCad 5 files use `module` where later versions use `footprint`

use std::path::Path;

use crate::parser::pcb_schema::*;
use crate::parser::sexp::{ParseError, SExp, SExpParser};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PcbParseError {
    #[error("S-expression parse error: {0}")]
    SExpParse(#[from] ParseError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid PCB format: {0}")]
    InvalidFormat(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Footprint {reference}: {error}")]
    Footprint {
        reference: String,
        error: Box<PcbParseError>,
    },
    #[error("Pad {number} of {reference}: {error}")]
    Pad {
        reference: String,
        number: String,
        error: Box<PcbParseError>,
    },
    #[error("Via {index}: {error}")]
    Via {
        index: usize,
        error: Box<PcbParseError>,
    },
}

/// Parser for KiCAD PCB files
pub struct PcbParser;

impl PcbParser {
    /// Read and parse a PCB file
    pub fn parse_pcb(path: &Path) -> Result<PcbDesign, PcbParseError> {
        let content = std::fs::read_to_string(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        Self::parse_pcb_str(&content, filename)
    }

    /// Parse PCB from string
    pub fn parse_pcb_str(content: &str, filename: &str) -> Result<PcbDesign, PcbParseError> {
        let root = SExpParser::new(content).parse()?;
        Self::from_sexp(&root, filename)
    }

    /// Build the design from an already parsed `(kicad_pcb ...)` tree.
    ///
    /// A footprint, a through-hole pad or a via that cannot be read fails the
    /// whole parse, since dropping it would leave a hole out of the drill map.
    pub fn from_sexp(root: &SExp, filename: &str) -> Result<PcbDesign, PcbParseError> {
        Self::check_root(root)?;

        let mut pcb = PcbDesign {
            filename: filename.to_string(),
            version: root.value_of("version").and_then(|v| v.parse().ok()),
            ..Default::default()
        };

        for item in root.as_list().unwrap_or(&[]).iter().skip(1) {
            let Some(tag) = item.tag() else { continue };
            match tag {
                "layers" => pcb.layers = Self::parse_layers(item),
                "setup" => {
                    if let Some(origin) = item.find("aux_axis_origin") {
                        pcb.aux_origin = Self::parse_xy(origin)?;
                    }
                }
                "footprint" | "module" => pcb.footprints.push(Self::parse_footprint(item)?),
                "via" => {
                    let via = Self::parse_via(item).map_err(|e| PcbParseError::Via {
                        index: pcb.vias.len(),
                        error: Box::new(e),
                    })?;
                    pcb.vias.push(via);
                }
                _ => {
                    if let Some(item_type) = GraphicType::from_tag(tag) {
                        pcb.graphics.push(Self::parse_graphic(item, item_type));
                    }
                }
            }
        }

        Ok(pcb)
    }

    /// Root must be a list tagged `kicad_pcb`
    pub fn check_root(root: &SExp) -> Result<(), PcbParseError> {
        match root.tag() {
            Some("kicad_pcb") => Ok(()),
            Some(other) => Err(PcbParseError::InvalidFormat(format!(
                "Expected kicad_pcb, found {}",
                other
            ))),
            None => Err(PcbParseError::InvalidFormat(
                "Expected kicad_pcb root".to_string(),
            )),
        }
    }

    fn parse_layers(sexp: &SExp) -> Vec<PcbLayer> {
        let mut layers = Vec::new();

        for item in sexp.as_list().unwrap_or(&[]).iter().skip(1) {
            let Some(layer_list) = item.as_list() else { continue };
            if layer_list.len() < 3 {
                continue;
            }
            let canonical_name = layer_list[1].as_atom().unwrap_or("").to_string();
            let user_name = layer_list
                .get(3)
                .and_then(|s| s.as_atom())
                .map(|s| s.to_string());

            layers.push(PcbLayer {
                canonical_name,
                user_name,
            });
        }

        layers
    }

    fn parse_footprint(sexp: &SExp) -> Result<Footprint, PcbParseError> {
        let reference = Self::parse_field(sexp, "Reference").unwrap_or_default();
        let at = sexp.find("at").ok_or_else(|| PcbParseError::Footprint {
            reference: reference.clone(),
            error: Box::new(PcbParseError::MissingField("at".to_string())),
        })?;
        let position = Self::parse_xy(at).map_err(|e| PcbParseError::Footprint {
            reference: reference.clone(),
            error: Box::new(e),
        })?;
        let rotation = at.arg(3).and_then(SExp::as_f64).unwrap_or(0.0);

        let mut pads = Vec::new();
        for pad_exp in sexp.find_all("pad") {
            let number = pad_exp.arg(1).and_then(SExp::as_atom).unwrap_or_default();
            let pad_type = pad_exp
                .arg(2)
                .and_then(SExp::as_atom)
                .and_then(PadType::from_token);
            match Self::parse_pad(pad_exp) {
                Ok(pad) => pads.push(pad),
                // SMD and connector pads have no hole; anything else might
                Err(e) if pad_type.is_some_and(|t| !t.has_hole()) => {
                    tracing::debug!("Skipping pad {} in {}: {}", number, reference, e)
                }
                Err(e) => {
                    return Err(PcbParseError::Pad {
                        reference,
                        number: number.to_string(),
                        error: Box::new(e),
                    })
                }
            }
        }

        let (mount, dnp, exclude_from_pos) = Self::parse_attributes(sexp);
        let properties = sexp
            .find_all("property")
            .filter_map(|prop| {
                let key = prop.arg(1)?.as_atom()?;
                let value = prop.arg(2)?.as_atom()?;
                (key != "Reference" && key != "Value").then(|| (key.to_string(), value.to_string()))
            })
            .collect();

        Ok(Footprint {
            value: Self::parse_field(sexp, "Value").unwrap_or_default(),
            lib_id: sexp
                .arg(1)
                .and_then(SExp::as_atom)
                .unwrap_or_default()
                .to_string(),
            layer: sexp.value_of("layer").unwrap_or("F.Cu").to_string(),
            reference,
            position,
            rotation,
            mount,
            dnp,
            exclude_from_pos,
            properties,
            pads,
        })
    }

    /// Reference or Value from `(property "Reference" ..)` or the older `(fp_text reference ..)`
    fn parse_field(sexp: &SExp, name: &str) -> Option<String> {
        let from_property = sexp.find_all("property").find_map(|prop| {
            let key = prop.arg(1)?.as_atom()?;
            let value = prop.arg(2)?.as_atom()?;
            (key == name).then(|| value.to_string())
        });
        from_property.or_else(|| {
            sexp.find_all("fp_text").find_map(|text| {
                let kind = text.arg(1)?.as_atom()?;
                let value = text.arg(2)?.as_atom()?;
                kind.eq_ignore_ascii_case(name).then(|| value.to_string())
            })
        })
    }

    /// `(attr smd|through_hole|virtual [board_only] [exclude_from_pos_files] [dnp] ..)`
    fn parse_attributes(sexp: &SExp) -> (MountType, bool, bool) {
        let Some(attr) = sexp.find("attr") else {
            return (MountType::default(), false, false);
        };
        let mount = if attr.has_flag("smd") {
            MountType::Smd
        } else if attr.has_flag("through_hole") {
            MountType::ThroughHole
        } else if attr.has_flag("virtual") || attr.has_flag("board_only") {
            MountType::Virtual
        } else {
            MountType::default()
        };
        (
            mount,
            attr.has_flag("dnp"),
            attr.has_flag("exclude_from_pos_files"),
        )
    }

    fn parse_pad(sexp: &SExp) -> Result<Pad, PcbParseError> {
        let list = sexp
            .as_list()
            .ok_or_else(|| PcbParseError::InvalidFormat("Pad must be a list".to_string()))?;

        if list.len() < 4 {
            return Err(PcbParseError::InvalidFormat(
                "Pad requires number, type, shape".to_string(),
            ));
        }

        let number = list[1].as_atom().unwrap_or("").to_string();

        let token = list[2].as_atom().unwrap_or("");
        let pad_type = PadType::from_token(token)
            .ok_or_else(|| PcbParseError::InvalidFormat(format!("Unknown pad type: {}", token)))?;

        let (position, angle) = match sexp.find("at") {
            Some(at) => (
                Self::parse_xy(at)?,
                at.arg(3).and_then(SExp::as_f64).unwrap_or(0.0),
            ),
            None => (Position::default(), 0.0),
        };
        let size = sexp
            .find("size")
            .and_then(|s| Self::parse_xy(s).ok())
            .map_or((0.0, 0.0), |p| (p.x, p.y));

        let drill = if pad_type.has_hole() {
            let drill = sexp
                .find("drill")
                .ok_or_else(|| PcbParseError::MissingField("drill".to_string()))?;
            Some(Self::parse_drill(drill)?)
        } else {
            None
        };

        Ok(Pad {
            number,
            pad_type,
            position,
            angle,
            size,
            drill,
        })
    }

    /// `(drill D)`, `(drill oval W [H])`, each optionally followed by `(offset X Y)`
    fn parse_drill(sexp: &SExp) -> Result<DrillInfo, PcbParseError> {
        let args = sexp.as_list().unwrap_or(&[]);
        let mut shape = DrillShape::Circle;
        let mut dims = Vec::new();

        for (i, arg) in args.iter().enumerate().skip(1) {
            // `(offset ..)` moves the hole within the pad; holes are placed at the pad centre
            if let SExp::List(_) = arg {
                continue;
            }
            let token = arg.as_atom().unwrap_or_default();
            if let Ok(value) = token.parse::<f64>() {
                dims.push(value);
            } else if i == 1 && token == "oval" {
                shape = DrillShape::Oval;
            } else if i == 1 {
                shape = DrillShape::Other(token.to_string());
            }
        }

        let width = dims
            .first()
            .copied()
            .ok_or_else(|| PcbParseError::MissingField("drill size".to_string()))?;
        let height = match shape {
            DrillShape::Circle => width,
            _ => dims.get(1).copied().unwrap_or(width),
        };

        Ok(DrillInfo {
            shape,
            width,
            height,
        })
    }

    fn parse_via(sexp: &SExp) -> Result<Via, PcbParseError> {
        let at = sexp
            .find("at")
            .ok_or_else(|| PcbParseError::MissingField("via at".to_string()))?;
        let position = Self::parse_xy(at)?;
        let drill = Self::get_float_value(sexp, "drill")
            .ok_or_else(|| PcbParseError::MissingField("via drill".to_string()))?;

        Ok(Via { position, drill })
    }

    fn parse_graphic(sexp: &SExp, item_type: GraphicType) -> GraphicItem {
        let layer = sexp.value_of("layer").unwrap_or_default().to_string();

        let mut points = Vec::new();
        let keys: &[&str] = match item_type {
            GraphicType::Circle => &["center", "end"],
            GraphicType::Arc => &["start", "mid", "end"],
            GraphicType::Text => &["at"],
            _ => &["start", "end"],
        };
        for key in keys {
            if let Some(point) = sexp.find(key).and_then(|e| Self::parse_xy(e).ok()) {
                points.push(point);
            }
        }
        if let Some(pts) = sexp.find("pts") {
            points.extend(Self::parse_pts(pts));
        }

        // KiCad 5 arcs: (start) is the centre, (end) the first point, (angle) the sweep
        let arc_angle = match item_type {
            GraphicType::Arc if sexp.find("mid").is_none() => Self::get_float_value(sexp, "angle"),
            _ => None,
        };

        let text = match item_type {
            GraphicType::Text => sexp.arg(1).and_then(|t| t.as_atom()).map(str::to_string),
            _ => None,
        };

        GraphicItem {
            item_type,
            layer,
            points,
            arc_angle,
            text,
        }
    }

    fn get_float_value(sexp: &SExp, key: &str) -> Option<f64> {
        sexp.value_of(key).and_then(|s| s.parse().ok())
    }

    /// Read `(tag X Y ...)` into a position
    fn parse_xy(sexp: &SExp) -> Result<Position, PcbParseError> {
        let x = sexp.arg(1).and_then(SExp::as_f64);
        let y = sexp.arg(2).and_then(SExp::as_f64);
        match (x, y) {
            (Some(x), Some(y)) => Ok(Position::new(x, y)),
            _ => Err(PcbParseError::InvalidFormat(format!(
                "Invalid '{}' format",
                sexp.tag().unwrap_or("?")
            ))),
        }
    }

    fn parse_pts(sexp: &SExp) -> Vec<Position> {
        sexp.find_all("xy")
            .filter_map(|xy| Self::parse_xy(xy).ok())
            .collect()
    }
}
