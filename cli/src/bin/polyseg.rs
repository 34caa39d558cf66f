use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use polyseg::{convert_yolo_dataset, PluginKind, YoloDataset};
use polyseg_cli::{run_detect, DetectOverrides, DetectRequest, DetectStatus, PolysegConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use strum::IntoEnumIterator;
use tracing::info;
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "PolySeg mask-to-polygon plugins", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract polygon detections from model masks and print the JSON envelope
    Detect {
        /// Plugin to run (smp, detectron2, yolact)
        #[arg(short, long, value_parser = parse_plugin)]
        plugin: Option<PluginKind>,
        /// Path to the input image
        #[arg(short, long)]
        image: Option<PathBuf>,
        /// Per-class probability map, repeat for each class
        #[arg(short, long = "mask")]
        masks: Vec<PathBuf>,
        /// JSON manifest of instance masks with class ids and scores
        #[arg(long, conflicts_with = "masks")]
        instances: Option<PathBuf>,
        /// Configuration file (.toml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Confidence threshold
        #[arg(long)]
        conf: Option<f32>,
        /// Minimum contour area in square pixels
        #[arg(long)]
        min_area: Option<f64>,
        /// Keep only the largest contour of each mask
        #[arg(long, conflicts_with_all = ["min_area", "no_area_filter"])]
        largest_only: bool,
        /// Keep every contour regardless of area
        #[arg(long, conflicts_with = "min_area")]
        no_area_filter: bool,
        /// Simplification tolerance relative to the contour perimeter
        #[arg(long)]
        epsilon_ratio: Option<f64>,
        /// Keep at most this many instances
        #[arg(long)]
        top_k: Option<usize>,
        /// Also write the detections as GeoJSON
        #[arg(long)]
        geojson: Option<PathBuf>,
        /// Also write the detections as YOLO segmentation labels
        #[arg(long)]
        yolo: Option<PathBuf>,
    },
    /// Convert a YOLO segmentation dataset into COCO JSON
    Convert {
        /// Directory of images
        #[arg(long)]
        images: PathBuf,
        /// Directory of <stem>.txt label files
        #[arg(long)]
        labels: PathBuf,
        /// Path of the COCO JSON to write
        #[arg(short, long)]
        output: PathBuf,
        /// Text file with one class name per line
        #[arg(long)]
        classes: Option<PathBuf>,
    },
    /// Describe the available plugins and their defaults
    Plugins,
    /// Print the JSON schema of the configuration file
    Schema,
}

fn parse_plugin(value: &str) -> std::result::Result<PluginKind, String> {
    PluginKind::from_str(value).map_err(|_| {
        format!("unknown plugin '{}', expected one of: {}", value, PluginKind::names().join(", "))
    })
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    // stdout carries the JSON envelope
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect {
            plugin,
            image,
            masks,
            instances,
            config,
            conf,
            min_area,
            largest_only,
            no_area_filter,
            epsilon_ratio,
            top_k,
            geojson,
            yolo,
        } => {
            let request = DetectRequest {
                plugin,
                image,
                masks,
                instances,
                config,
                overrides: DetectOverrides { conf, min_area, largest_only, no_area_filter, epsilon_ratio, top_k },
                geojson,
                yolo,
            };
            let outcome = run_detect(&request);
            println!("{}", outcome.response.to_json_pretty()?);
            Ok(match outcome.status {
                DetectStatus::Completed => ExitCode::SUCCESS,
                DetectStatus::UsageError => ExitCode::FAILURE,
            })
        }
        Commands::Convert { images, labels, output, classes } => {
            convert(&images, &labels, &output, classes.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Plugins => {
            print_plugins();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&PolysegConfig::schema())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn convert(images: &Path, labels: &Path, output: &Path, classes: Option<&Path>) -> Result<()> {
    let mut dataset = YoloDataset::new(images, labels);
    if let Some(classes) = classes {
        dataset = dataset.with_class_names_file(classes)?;
    }

    info!("Converting {} with labels from {}", images.display(), labels.display());
    let coco = convert_yolo_dataset(&dataset)?;
    coco.save(output)?;

    info!(
        "✅ Wrote {} images and {} annotations to {}",
        coco.images.len(),
        coco.annotations.len(),
        output.display()
    );
    Ok(())
}

fn print_plugins() {
    for kind in PluginKind::iter() {
        let profile = kind.default_profile();
        println!("{}", kind);
        println!("  {}", kind.description());
        println!("  model:      {}", profile.model.summary());
        println!("  threshold:  {}", profile.extractor.threshold);
        println!("  contours:   {:?}", profile.extractor.contour_policy);
        println!("  confidence: {:?}", profile.confidence_mode);
        if let Some(top_k) = profile.top_k {
            println!("  top_k:      {}", top_k);
        }
    }
}
