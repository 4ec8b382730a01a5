//! PCB Schema Definitions
//!
//! Data structures for the parts of a KiCad PCB file (.kicad_pcb) the drill
//! map and placement outputs need. Values are kept in millimetres, as written
//! in the file.

use serde::{Deserialize, Serialize};

/// The drill and placement relevant content of a PCB file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PcbDesign {
    pub filename: String,
    /// File format version, a date such as 20221018
    pub version: Option<u32>,
    /// Auxiliary axis origin from `(setup ..)`, (0, 0) when the board sets none
    pub aux_origin: Position,
    pub layers: Vec<PcbLayer>,
    pub footprints: Vec<Footprint>,
    pub vias: Vec<Via>,
    pub graphics: Vec<GraphicItem>,
}

impl PcbDesign {
    /// Find a layer by canonical name ("Eco1.User") or user alias ("User.Eco1").
    pub fn find_layer(&self, name: &str) -> Option<&PcbLayer> {
        self.layers
            .iter()
            .find(|l| l.canonical_name == name || l.user_name.as_deref() == Some(name))
    }
}

/// PCB Layer definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcbLayer {
    pub canonical_name: String, // e.g., "F.Cu", "Eco1.User"
    pub user_name: Option<String>,
}

/// 2D position in millimetres
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Footprint (component) on PCB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Footprint {
    pub reference: String,
    pub value: String,
    /// Library identifier, "Library:Name"
    pub lib_id: String,
    /// Copper side the footprint is placed on, "F.Cu" or "B.Cu"
    pub layer: String,
    pub position: Position,
    /// Orientation in degrees
    pub rotation: f64,
    pub mount: MountType,
    /// Marked "do not populate"
    pub dnp: bool,
    pub exclude_from_pos: bool,
    /// Fields other than Reference and Value, in file order
    pub properties: Vec<(String, String)>,
    pub pads: Vec<Pad>,
}

impl Footprint {
    /// Name part of the library identifier
    pub fn name(&self) -> &str {
        self.lib_id
            .split_once(':')
            .map_or(self.lib_id.as_str(), |(_, name)| name)
    }

    pub fn is_bottom(&self) -> bool {
        self.layer == "B.Cu"
    }

    /// Field value by name, ignoring case
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Assembly type from the footprint's `(attr ..)`. A footprint without one
/// is a plain through-hole part.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum MountType {
    Smd,
    #[default]
    ThroughHole,
    Virtual,
}

/// Pad on a footprint; `position` is relative to the footprint origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pad {
    pub number: String,
    pub pad_type: PadType,
    pub position: Position,
    /// Board orientation in degrees, footprint rotation included
    pub angle: f64,
    /// Copper size (width, height); zero when the file gives none
    pub size: (f64, f64),
    /// Set on every through-hole pad, never on SMD or connector pads
    pub drill: Option<DrillInfo>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PadType {
    ThruHole,
    SMD,
    Connect,
    NPThruHole, // Non-plated through hole
}

impl PadType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "thru_hole" => Some(PadType::ThruHole),
            "smd" => Some(PadType::SMD),
            "connect" => Some(PadType::Connect),
            "np_thru_hole" => Some(PadType::NPThruHole),
            _ => None,
        }
    }

    pub fn has_hole(&self) -> bool {
        matches!(self, PadType::ThruHole | PadType::NPThruHole)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrillShape {
    Circle,
    Oval,
    /// Leading drill token the parser did not recognise
    Other(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrillInfo {
    pub shape: DrillShape,
    pub width: f64,
    pub height: f64,
}

/// Via (vertical interconnect)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Via {
    pub position: Position,
    pub drill: f64, // Drill diameter (mm)
}

/// Board-level graphic item (gr_line, gr_circle, gr_text, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicItem {
    pub item_type: GraphicType,
    pub layer: String,
    /// Defining points: start/end, center/end for circles, start/mid/end for
    /// arcs, corners for polygons, the anchor for text. KiCad 5 arcs give
    /// center/start with `arc_angle` set.
    pub points: Vec<Position>,
    /// Swept angle in degrees of a KiCad 5 arc
    pub arc_angle: Option<f64>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GraphicType {
    Line,
    Arc,
    Circle,
    Rect,
    Polygon,
    Text,
}

impl GraphicType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "gr_line" => Some(GraphicType::Line),
            "gr_arc" => Some(GraphicType::Arc),
            "gr_circle" => Some(GraphicType::Circle),
            "gr_rect" => Some(GraphicType::Rect),
            "gr_poly" => Some(GraphicType::Polygon),
            "gr_text" => Some(GraphicType::Text),
            _ => None,
        }
    }
}
