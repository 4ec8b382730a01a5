//! Drill summary example: print the drill types of a board without changing it.

use drillmap::prelude::*;
use std::path::Path;

fn main() -> Result<(), DrillMapError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/simple_board.kicad_pcb".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example drill_summary [path/to/file.kicad_pcb]");
        std::process::exit(1);
    }

    let board = BoardDocument::open(path)?;
    let result = DrillMap::report(&board)?;

    println!("Drill summary for: {}", path.display());
    println!("Total holes: {}", result.holes);
    println!();

    for drill in &result.drill_types {
        let size = if drill.oblong {
            format!("{:.3} x {:.3} mm", drill.width_mm, drill.height_mm)
        } else {
            format!("{:.3} mm", drill.width_mm)
        };
        let plating = if drill.plated { "plated" } else { "unplated" };
        println!("  {:<20} {:<9} x{:<5} {}", size, plating, drill.count, drill.marker);
    }

    if result.has_overlaps() {
        println!("\nOverlapping drills:");
        for pair in &result.overlaps {
            println!("  - {}", pair.describe());
        }
        std::process::exit(1);
    }

    println!("\nNo overlapping drills.");
    Ok(())
}
