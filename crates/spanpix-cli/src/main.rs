//! spanpix - span compositing engine CLI
//!
//! Inspects the format registry and backend, and runs synthetic fills.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "spanpix")]
#[command(author, version, about = "Span compositing engine CLI")]
#[command(long_about = "
Inspect and exercise the spanpix compositing engine.

Examples:
  spanpix formats                          # List pixel formats
  spanpix caps                             # Detected CPU features and kernels
  spanpix fill --paint linear --size 1920x1080
  spanpix fill --paint texture --rotate 30 --smooth --tile
  spanpix fill --format rgba64-pm --mode multiply --coverage 128 --repeat 20
  spanpix -v fill --paint radial -j 4
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported pixel formats
    #[command(visible_alias = "f")]
    Formats(FormatsArgs),

    /// Show detected CPU capabilities and substituted kernels
    Caps(CapsArgs),

    /// Run a synthetic fill and report timing
    Fill(FillArgs),
}

#[derive(Args)]
struct FormatsArgs {
    /// Only show formats whose name contains this text
    filter: Option<String>,
}

#[derive(Args)]
struct CapsArgs {
    /// Report the portable scalar backend instead of the detected one
    #[arg(long)]
    scalar: bool,
}

/// Paint kinds the fill command can draw with.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum PaintKind {
    Solid,
    Linear,
    Radial,
    Conical,
    Texture,
}

/// Gradient spread.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum SpreadArg {
    Pad,
    Repeat,
    Reflect,
}

#[derive(Args)]
struct FillArgs {
    /// Destination pixel format
    #[arg(short, long, default_value = "argb32-pm")]
    format: String,

    /// Composition mode
    #[arg(short, long, default_value = "source-over")]
    mode: String,

    /// Paint to draw with
    #[arg(short, long, value_enum, default_value = "solid")]
    paint: PaintKind,

    /// Surface size as WIDTHxHEIGHT
    #[arg(short, long, default_value = "512x512")]
    size: String,

    /// Span coverage (0-255)
    #[arg(short, long, default_value = "255")]
    coverage: u8,

    /// Solid color as hex AARRGGBB
    #[arg(long, default_value = "ff3366cc")]
    color: String,

    /// Rotation in degrees about the surface center
    #[arg(long, default_value = "0")]
    rotate: f64,

    /// Uniform scale factor
    #[arg(long, default_value = "1")]
    scale: f64,

    /// Horizontal perspective term
    #[arg(long, default_value = "0")]
    perspective: f64,

    /// Bilinear texture filtering
    #[arg(long)]
    smooth: bool,

    /// Tile the texture instead of clamping
    #[arg(long)]
    tile: bool,

    /// Gradient spread
    #[arg(long, value_enum, default_value = "pad")]
    spread: SpreadArg,

    /// Number of fills to time
    #[arg(short = 'n', long, default_value = "1")]
    repeat: u32,

    /// Use the portable scalar backend
    #[arg(long)]
    scalar: bool,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Configure thread pool
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match cli.command {
        Commands::Formats(args) => commands::formats::run(args, cli.verbose),
        Commands::Caps(args) => commands::caps::run(args, cli.verbose),
        Commands::Fill(args) => commands::fill::run(args, cli.verbose),
    }
}
