//! drillmap CLI - draw drill charts onto KiCad boards from the command line.

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use drillmap::{
    BoardDocument, DrillMap, DrillMapOptions, DrillMapResult, MarkerKind, Placement, TableColumn,
};
use drillmap::drill::MARKER_PALETTE_LEN;
use drillmap::geometry::iu_to_mm;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "drillmap")]
#[command(about = "Drill marker and legend table generator for KiCad boards", long_about = None)]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug); RUST_LOG applies otherwise
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Draw hole markers and the drill table onto a board
    Map {
        /// Path to .kicad_pcb file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Layer to draw on (canonical name or user alias)
        #[arg(short, long)]
        layer: Option<String>,

        /// Remove existing drawings on the layer first
        #[arg(long, conflicts_with = "keep_layer")]
        clear_layer: bool,

        /// Keep existing drawings on the layer
        #[arg(long)]
        keep_layer: bool,

        /// Table columns after the symbol column, comma separated
        #[arg(short, long, value_delimiter = ',')]
        columns: Option<Vec<String>>,

        /// Table text size in mm
        #[arg(long, value_name = "MM")]
        text_size: Option<f64>,

        /// Table title
        #[arg(long)]
        title: Option<String>,

        /// Top-left corner of the table in mm, instead of locating it
        #[arg(long, value_name = "X,Y", value_parser = parse_position)]
        position: Option<(f64, f64)>,

        /// JSON file with drill map options; flags override it
        #[arg(long, value_name = "JSON")]
        config: Option<PathBuf>,

        /// Where to write the updated board (default: <FILE>.new)
        #[arg(short, long, conflicts_with = "overwrite")]
        output: Option<PathBuf>,

        /// Write the updated board back to FILE
        #[arg(long)]
        overwrite: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Show drill types, markers and overlaps without changing the board
    Report {
        /// Path to .kicad_pcb file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Write component placement data for assembly
    Placement {
        /// Path to .kicad_pcb file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Placement file format
        #[arg(short, long, value_enum, default_value = "centroid")]
        format: PlacementFormat,

        /// Leave through-hole parts out of the XYRS file
        #[arg(long)]
        smt_only: bool,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available table columns
    Columns,

    /// List the marker palette
    Markers {
        /// List every lettered marker too
        #[arg(short, long)]
        all: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for scripts
    Json,
}

#[derive(Clone, ValueEnum)]
enum PlacementFormat {
    /// Quoted CSV of SMT parts in mm
    Centroid,
    /// Tab separated MacroFab XYRS in mils
    Xyrs,
    /// JSON rows for scripts
    Json,
}

/// Flags given on the command line for `map`; each one overrides the config file.
struct MapOverrides {
    layer: Option<String>,
    clear_layer: Option<bool>,
    columns: Option<Vec<String>>,
    text_size: Option<f64>,
    title: Option<String>,
    position: Option<(f64, f64)>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match cli.command {
        Commands::Map {
            file,
            layer,
            clear_layer,
            keep_layer,
            columns,
            text_size,
            title,
            position,
            config,
            output,
            overwrite,
            format,
        } => {
            let overrides = MapOverrides {
                layer,
                clear_layer: match (clear_layer, keep_layer) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
                columns,
                text_size,
                title,
                position,
            };
            let output = if overwrite {
                file.clone()
            } else {
                output.unwrap_or_else(|| default_output(&file))
            };
            handle_map(&file, &output, config.as_deref(), overrides, format)
        }
        Commands::Report { file, format } => handle_report(&file, format),
        Commands::Placement {
            file,
            format,
            smt_only,
            output,
        } => handle_placement(&file, format, !smt_only, output.as_deref()),
        Commands::Columns => {
            handle_columns();
            0
        }
        Commands::Markers { all } => {
            handle_markers(all);
            0
        }
    };

    process::exit(exit_code);
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_position(value: &str) -> Result<(f64, f64), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{}'", value))?;
    let x = x.trim().parse().map_err(|_| format!("invalid X coordinate '{}'", x))?;
    let y = y.trim().parse().map_err(|_| format!("invalid Y coordinate '{}'", y))?;
    Ok((x, y))
}

fn default_output(file: &Path) -> PathBuf {
    let mut name = OsString::from(file.as_os_str());
    name.push(".new");
    PathBuf::from(name)
}

fn load_options(config: Option<&Path>, overrides: MapOverrides) -> anyhow::Result<DrillMapOptions> {
    let mut options = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            DrillMapOptions::from_json(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => DrillMapOptions::default(),
    };

    if let Some(layer) = overrides.layer {
        options.layer_name = layer;
    }
    if let Some(clear) = overrides.clear_layer {
        options.clear_layer = clear;
    }
    if let Some(columns) = overrides.columns {
        options.table_columns = columns;
    }
    if let Some(size) = overrides.text_size {
        options.table_text_size_mm = size;
    }
    if let Some(title) = overrides.title {
        options.table_title = title;
    }
    if let Some(position) = overrides.position {
        options.table_position_mm = Some(position);
    }
    Ok(options)
}

fn map_board(
    file: &Path,
    output: &Path,
    config: Option<&Path>,
    overrides: MapOverrides,
) -> anyhow::Result<DrillMapResult> {
    let options = load_options(config, overrides)?;
    tracing::debug!("Drill map options: {:?}", options);
    let mut board = BoardDocument::open(file)
        .with_context(|| format!("Failed to read board {}", file.display()))?;
    let result = DrillMap::run(&mut board, &options)?;
    board.save(output)?;
    Ok(result)
}

fn handle_map(
    file: &Path,
    output: &Path,
    config: Option<&Path>,
    overrides: MapOverrides,
    format: OutputFormat,
) -> i32 {
    match map_board(file, output, config, overrides) {
        Ok(result) => {
            match format {
                OutputFormat::Human => {
                    output_human(file, &result);
                    println!("\n  Saved to: {}", output.display());
                }
                OutputFormat::Json => output_json(file, Some(output), &result),
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn handle_report(file: &Path, format: OutputFormat) -> i32 {
    let result = BoardDocument::open(file)
        .map_err(drillmap::DrillMapError::from)
        .and_then(|board| DrillMap::report(&board));

    match result {
        Ok(result) => {
            match format {
                OutputFormat::Human => output_human(file, &result),
                OutputFormat::Json => output_json(file, None, &result),
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn output_human(file: &Path, result: &DrillMapResult) {
    println!("\nFile: {}", file.display());
    println!("{}", "─".repeat(60));

    for line in &result.log {
        println!("  {}", line);
    }

    if !result.warnings.is_empty() {
        println!("\n  WARNINGS:");
        for warning in &result.warnings {
            println!("    - {}", warning);
        }
    }

    if !result.drill_types.is_empty() {
        println!("\n  Drill types:");
        for drill in &result.drill_types {
            let size = if drill.oblong {
                format!("{:.3} x {:.3} mm", drill.width_mm, drill.height_mm)
            } else {
                format!("{:.3} mm", drill.width_mm)
            };
            let plating = if drill.plated { "plated" } else { "unplated" };
            println!(
                "    {:<20} {:<9} {:>5}  {}",
                size, plating, drill.count, drill.marker
            );
        }
    }

    println!("\n  Summary:");
    println!("    Holes:       {}", result.holes);
    println!("    Drill types: {}", result.drill_types.len());
    println!("    Overlaps:    {}", result.overlaps.len());
    if let Some(origin) = result.table_origin {
        println!(
            "    Table at:    ({:.3}, {:.3}) mm",
            iu_to_mm(origin.x),
            iu_to_mm(origin.y)
        );
    }
}

fn output_json(file: &Path, output: Option<&Path>, result: &DrillMapResult) {
    let table_origin = result
        .table_origin
        .map(|p| serde_json::json!({ "x_mm": iu_to_mm(p.x), "y_mm": iu_to_mm(p.y) }));
    let overlaps: Vec<_> = result
        .overlaps
        .iter()
        .map(|pair| {
            serde_json::json!({
                "first_mm": [iu_to_mm(pair.first.0.x), iu_to_mm(pair.first.0.y)],
                "second_mm": [iu_to_mm(pair.second.0.x), iu_to_mm(pair.second.0.y)],
            })
        })
        .collect();

    let report = serde_json::json!({
        "file": file.display().to_string(),
        "output": output.map(|p| p.display().to_string()),
        "holes": result.holes,
        "drill_types": result.drill_types,
        "overlaps": overlaps,
        "warnings": result.warnings,
        "log": result.log,
        "table_origin": table_origin,
        "items_added": result.items_added,
    });
    match serde_json::to_string_pretty(&report) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: {}", e),
    }
}

fn write_placement(
    file: &Path,
    format: PlacementFormat,
    include_th: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let design = drillmap::parse_pcb(file)
        .with_context(|| format!("Failed to read board {}", file.display()))?;
    let rows = Placement::rows(&design);
    let text = match format {
        PlacementFormat::Centroid => Placement::centroid(&rows),
        PlacementFormat::Xyrs => Placement::xyrs(&rows, include_th),
        PlacementFormat::Json => serde_json::to_string_pretty(&rows)? + "\n",
    };

    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote placement data to {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn handle_placement(
    file: &Path,
    format: PlacementFormat,
    include_th: bool,
    output: Option<&Path>,
) -> i32 {
    match write_placement(file, format, include_th, output) {
        Ok(()) => {
            if let Some(path) = output {
                println!("Placement data saved to: {}", path.display());
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn handle_columns() {
    println!("Available table columns:\n");
    for column in TableColumn::ALL {
        println!(
            "  {:<18} header {:<16} min width {}",
            column.identifier(),
            column.header(),
            column.min_width()
        );
    }
    println!("\nThe symbol column is always added first.");
}

fn handle_markers(all: bool) {
    println!("Marker palette ({} markers):\n", MARKER_PALETTE_LEN);

    for (index, marker) in MarkerKind::palette().enumerate() {
        let lettered = matches!(marker, MarkerKind::CharCircle(_) | MarkerKind::CharSquare(_));
        if lettered && !all {
            continue;
        }
        println!("  {:>3}  {}", index, marker.name());
    }

    if !all {
        println!("\n  ... followed by lettered markers: 'a'-'z', 'A'-'Z', '1'-'9' in a circle, then in a square");
        println!("  Use --all to list every marker.");
    }
}
