//! Gridlabel: anchor discovery and grid target encoding for YOLO-style
//! object detectors.
//!
//! Gridlabel reads bounding-box annotations from a headerless CSV, finds
//! representative anchor shapes with k-means, and encodes every box into a
//! fixed `(grid_h, grid_w, anchors * 5)` label grid alongside the resized
//! image, producing two half-precision tensors ready for training.
//!
//! # Modules
//!
//! - [`ir`]: annotation and anchor types, plus the CSV reader
//! - [`anchors`]: anchor discovery (box preprocessing and k-means)
//! - [`matcher`]: IoU and best-anchor selection
//! - [`encode`]: batch target encoding
//! - [`imaging`]: image loading and resizing
//! - [`persist`]: saving and loading tensors and anchors
//! - [`config`]: pipeline configuration
//! - [`error`]: error types for gridlabel operations

pub mod anchors;
pub mod config;
pub mod encode;
pub mod error;
pub mod imaging;
pub mod ir;
pub mod matcher;
pub mod persist;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};

use config::PipelineConfig;
use encode::{EncodeOptions, Encoder, Layout, MissingImagePolicy};
use ir::io_annotations_csv::read_annotations_csv;
use persist::{Stamp, Store};

pub use error::GridLabelError;

/// The gridlabel CLI application.
#[derive(Parser)]
#[command(name = "gridlabel")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Discover anchor boxes from the annotation file with k-means.
    Anchors(AnchorsArgs),
    /// Encode images and annotations into X and Y tensors.
    Encode(EncodeArgs),
    /// Extract resized images only, without labels.
    Images(ImagesArgs),
}

/// Config file plus the fields that can be overridden on the command line.
#[derive(clap::Args)]
struct ConfigArgs {
    /// YAML pipeline config.
    #[arg(long, env = "GRIDLABEL_CONFIG")]
    config: PathBuf,

    /// Override the config's data_path.
    #[arg(long)]
    data_path: Option<PathBuf>,

    /// Override the config's save_path.
    #[arg(long)]
    save_path: Option<PathBuf>,

    /// Only read the first N annotation rows.
    #[arg(long)]
    limit: Option<usize>,
}

/// Arguments for the anchors subcommand.
#[derive(clap::Args)]
struct AnchorsArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Number of anchors (defaults to the config's anchor_count).
    #[arg(long)]
    count: Option<usize>,

    /// Seed for reproducible clustering.
    #[arg(long)]
    seed: Option<u64>,

    /// Save the anchors under this name in the save directory.
    #[arg(long)]
    save: Option<String>,
}

/// Arguments for the encode subcommand.
#[derive(clap::Args)]
struct EncodeArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Name of a saved anchor set. Defaults to the config's anchor_boxes.
    #[arg(long)]
    anchors: Option<String>,

    /// Base name of the saved image tensor.
    #[arg(long, default_value = "X_Train")]
    images_name: String,

    /// Base name of the saved label tensor.
    #[arg(long, default_value = "Y_Train")]
    labels_name: String,

    /// How annotation rows map onto batch entries.
    #[arg(long, value_enum, default_value_t = LayoutArg::PerAnnotation)]
    layout: LayoutArg,

    /// Leave entries with unreadable images empty instead of failing.
    #[arg(long)]
    skip_missing: bool,

    /// Worker threads (defaults to one per core).
    #[arg(long)]
    jobs: Option<usize>,

    /// Save under the bare names instead of appending a timestamp.
    #[arg(long)]
    no_timestamp: bool,

    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    report: ReportFormat,
}

/// Arguments for the images subcommand.
#[derive(clap::Args)]
struct ImagesArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Base name of the saved image tensor.
    #[arg(long, default_value = "X_Train")]
    name: String,

    /// How annotation rows map onto batch entries.
    #[arg(long, value_enum, default_value_t = LayoutArg::PerAnnotation)]
    layout: LayoutArg,

    /// Worker threads (defaults to one per core).
    #[arg(long)]
    jobs: Option<usize>,

    /// Save under the bare name instead of appending a timestamp.
    #[arg(long)]
    no_timestamp: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LayoutArg {
    PerAnnotation,
    PerImage,
}

impl From<LayoutArg> for Layout {
    fn from(value: LayoutArg) -> Self {
        match value {
            LayoutArg::PerAnnotation => Layout::PerAnnotation,
            LayoutArg::PerImage => Layout::PerImage,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

/// Run the gridlabel CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), GridLabelError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Anchors(args)) => run_anchors(args),
        Some(Commands::Encode(args)) => run_encode(args),
        Some(Commands::Images(args)) => run_images(args),
        None => {
            println!("gridlabel {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Anchor discovery and grid target encoding for YOLO-style detectors.");
            println!();
            println!("Run 'gridlabel --help' for usage information.");
            Ok(())
        }
    }
}

/// `RUST_LOG` wins when set; otherwise `-v` flags pick the level.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env = env_logger::Env::default().default_filter_or(default_level);
    // a logger may already be installed when embedded
    let _ = env_logger::Builder::from_env(env).try_init();
}

fn load_config(args: &ConfigArgs) -> Result<PipelineConfig, GridLabelError> {
    let mut config = PipelineConfig::from_yaml_file(&args.config)?;
    if let Some(data_path) = &args.data_path {
        config.data_path = data_path.clone();
    }
    if let Some(save_path) = &args.save_path {
        config.save_path = save_path.clone();
    }
    if let Some(device) = &config.compute_device {
        info!("compute_device '{}' requested; encoding runs on the CPU", device);
    }
    Ok(config)
}

fn stamp(no_timestamp: bool) -> Stamp {
    if no_timestamp {
        Stamp::None
    } else {
        Stamp::now()
    }
}

/// Execute the anchors subcommand.
fn run_anchors(args: AnchorsArgs) -> Result<(), GridLabelError> {
    let config = load_config(&args.config)?;
    let annotations = read_annotations_csv(&config.annotations_path(), args.config.limit)?;
    let k = args.count.unwrap_or_else(|| config.effective_anchor_count());

    let opts = anchors::KMeansOptions {
        seed: args.seed,
        ..Default::default()
    };
    let found = anchors::discover_from_annotations(
        &annotations,
        &config.data_path,
        config.image_size(),
        k,
        &opts,
    )?;

    println!("{} anchors (width x height):", found.len());
    for anchor in found.as_slice() {
        println!("  {:.3} x {:.3}", anchor.width, anchor.height);
    }

    if let Some(name) = &args.save {
        let path = Store::new(&config.save_path).save_anchors(&found, name)?;
        println!("Saved anchors to {}", path.display());
    }

    Ok(())
}

/// Execute the encode subcommand.
fn run_encode(args: EncodeArgs) -> Result<(), GridLabelError> {
    let config = load_config(&args.config)?;
    let store = Store::new(&config.save_path);

    let anchors = match (&args.anchors, config.explicit_anchors()) {
        (Some(name), _) => store.load_anchors(name)?,
        (None, Some(explicit)) => explicit,
        (None, None) => {
            return Err(GridLabelError::InvalidConfig {
                message: "no anchors: pass --anchors NAME or set anchor_boxes in the config"
                    .to_string(),
            });
        }
    };

    let annotations = read_annotations_csv(&config.annotations_path(), args.config.limit)?;
    let encoder = Encoder::from_config(&config, anchors)?;
    let opts = EncodeOptions {
        layout: args.layout.into(),
        missing_images: if args.skip_missing {
            MissingImagePolicy::Skip
        } else {
            MissingImagePolicy::Fail
        },
        jobs: args.jobs,
        ..Default::default()
    };

    let (batch, report) = encoder.encode(&annotations, &opts)?;

    let stamp_mode = stamp(args.no_timestamp);
    let images_path = store.save_tensor(&batch.images, &args.images_name, stamp_mode)?;
    let labels_path = store.save_tensor(&batch.labels, &args.labels_name, stamp_mode)?;

    match args.report {
        ReportFormat::Json => {
            let json =
                serde_json::to_string_pretty(&report).map_err(GridLabelError::ReportSerialize)?;
            println!("{json}");
        }
        ReportFormat::Text => {
            print!("{}", report);
            println!("Saved images to {}", images_path.display());
            println!("Saved labels to {}", labels_path.display());
        }
    }

    if !report.skipped.is_empty() {
        warn!("{} entries were left empty", report.skipped.len());
    }

    Ok(())
}

/// Execute the images subcommand.
fn run_images(args: ImagesArgs) -> Result<(), GridLabelError> {
    let config = load_config(&args.config)?;
    let annotations = read_annotations_csv(&config.annotations_path(), args.config.limit)?;

    let opts = EncodeOptions {
        layout: args.layout.into(),
        jobs: args.jobs,
        ..Default::default()
    };
    let images =
        encode::extract_images(&config.data_path, config.image_size(), &annotations, &opts)?;

    let store = Store::new(&config.save_path);
    let path = store.save_tensor(&images, &args.name, stamp(args.no_timestamp))?;
    println!(
        "Extracted {} images to {}",
        images.len_of(ndarray::Axis(0)),
        path.display()
    );

    Ok(())
}
