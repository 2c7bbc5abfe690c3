use std::path::PathBuf;

use clap::Parser;

/// G-code interpreter, optimizer and Grbl streamer.
#[derive(Parser, Debug, Clone)]
#[command(name = "millstream", version, about)]
pub struct Args {
    /// Input G-code file
    pub input: PathBuf,

    /// Write the generated G-code to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Stream to a Grbl controller on this serial device
    #[arg(short, long)]
    pub device: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    pub baud: Option<u32>,

    /// Print the generated G-code to stdout as well
    #[arg(long)]
    pub stdout: bool,

    /// Print the interpreted position trace
    #[arg(long)]
    pub debug_dump: bool,

    /// Print bounding box, feedrates and estimated runtime
    #[arg(long)]
    pub stats: bool,

    /// Disable the drill-speed optimization
    #[arg(long)]
    pub no_opt_drill: bool,

    /// Disable the lift-speed optimization
    #[arg(long)]
    pub no_opt_lifts: bool,

    /// Disable the collinear-move collapse
    #[arg(long)]
    pub no_opt_vector: bool,

    /// Disable route grouping
    #[arg(long)]
    pub no_opt_route: bool,

    /// Collapse positioning moves above Z0 (experimental)
    #[arg(long)]
    pub opt_floating_z: bool,

    /// Decimal digits in emitted coordinates
    #[arg(long)]
    pub precision: Option<usize>,

    /// Maximum deviation from a perfect arc during tessellation, in mm
    #[arg(long)]
    pub max_arc_deviation: Option<f64>,

    /// Minimum length of a tessellated arc segment, in mm
    #[arg(long)]
    pub min_arc_line_length: Option<f64>,

    /// Geometric tolerance used by the optimizers, in mm
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Clamp all feedrates to this value, in mm/min
    #[arg(long)]
    pub feed_limit: Option<f64>,

    /// Replace the detected safety height
    #[arg(long)]
    pub safety_height: Option<f64>,

    /// Multiply all feedrates
    #[arg(long)]
    pub feed_multiplier: Option<f64>,

    /// Force a clockwise spindle at this speed across the whole program
    #[arg(long, conflicts_with = "spindle_ccw")]
    pub spindle_cw: Option<f64>,

    /// Force a counter-clockwise spindle at this speed
    #[arg(long)]
    pub spindle_ccw: Option<f64>,

    /// End the program at X0 Y0 Z0
    #[arg(long)]
    pub enforce_return: bool,

    /// Swap the X and Y axes
    #[arg(long)]
    pub flip_xy: bool,

    /// Pause for the operator on tool changes
    #[arg(long)]
    pub manual_toolchange: bool,

    /// Pause for the operator on spindle changes
    #[arg(long)]
    pub manual_spindle: bool,

    /// Pause for the operator on coolant changes
    #[arg(long)]
    pub manual_coolant: bool,

    /// Warn about unsupported words instead of failing
    #[arg(long)]
    pub lenient: bool,

    /// Configuration file (defaults to millstream.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
