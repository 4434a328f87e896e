//! cam-rs CLI: classify images and render class activation maps.

mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cam::data::{ImageSource, LabelSource, LabelTable};
use cam::explain::Colormap;
use cam::models::{ResNetArch, RESNET_LAYERS};
use cam::{explain, load_classifier, predict, Prediction};

use crate::config::ExplainConfig;

/// Backend type for inference.
#[cfg(feature = "backend-wgpu")]
type CliBackend = cam::core::backend::Wgpu;
/// Backend type for inference.
#[cfg(not(feature = "backend-wgpu"))]
type CliBackend = cam::core::backend::NdArray;

#[derive(Parser)]
#[command(name = "cam")]
#[command(author, version)]
#[command(about = "Class activation maps for pretrained image classifiers")]
#[command(long_about = "cam-rs: see which image regions drive a CNN's prediction.

EXAMPLES:
  # Explain the top prediction for an image
  cam explain --image https://example.com/cat.jpg

  # Explain the three most probable classes with the inferno colormap
  cam explain --image cat.jpg --explain-top 3 --colormap inferno --report

  # Explain fixed ImageNet classes with ResNet-34
  cam explain --image cat.jpg --arch resnet34 --class 281 --class 285

  # Only classify
  cam predict --image cat.jpg --top-k 10

  # Search the label table
  cam labels --search retriever

AVAILABLE MODELS:
  resnet18 - ResNet-18, torchvision ImageNet weights [default]
  resnet34 - ResNet-34, torchvision ImageNet weights")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify an image and write CAM overlays
    Explain {
        /// Image URL or local path
        #[arg(long, value_name = "URL|PATH")]
        image: String,

        /// JSON config file; flags below override it
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Label file URL or path (default: ImageNet class index)
        #[arg(long, value_name = "URL|PATH")]
        labels: Option<String>,

        /// Model architecture: resnet18, resnet34
        #[arg(long, value_name = "MODEL")]
        arch: Option<String>,

        /// Local safetensors weights instead of the Hugging Face hub
        #[arg(long, value_name = "PATH")]
        weights: Option<PathBuf>,

        /// Use randomly initialized weights
        #[arg(long)]
        random_init: bool,

        /// Number of predictions to print
        #[arg(long, value_name = "K")]
        top_k: Option<usize>,

        /// Explain this many of the top predictions
        #[arg(long, value_name = "N")]
        explain_top: Option<usize>,

        /// Explain a fixed class index (repeatable)
        #[arg(long = "class", value_name = "IDX")]
        classes: Vec<usize>,

        /// Layer to take activations from
        #[arg(long, value_name = "NAME")]
        layer: Option<String>,

        /// Heatmap opacity in [0, 1]
        #[arg(long, value_name = "ALPHA")]
        alpha: Option<f32>,

        /// Colormap: jet, inferno, gray
        #[arg(long, value_name = "NAME")]
        colormap: Option<String>,

        /// Output directory for overlays
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Also write report.json
        #[arg(long)]
        report: bool,
    },
    /// Classify an image without computing CAMs
    Predict {
        /// Image URL or local path
        #[arg(long, value_name = "URL|PATH")]
        image: String,

        /// Label file URL or path (default: ImageNet class index)
        #[arg(long, value_name = "URL|PATH")]
        labels: Option<String>,

        /// Model architecture: resnet18, resnet34
        #[arg(long, default_value = "resnet18", value_name = "MODEL")]
        arch: String,

        /// Local safetensors weights instead of the Hugging Face hub
        #[arg(long, value_name = "PATH")]
        weights: Option<PathBuf>,

        /// Number of predictions to print
        #[arg(long, default_value = "5", value_name = "K")]
        top_k: usize,
    },
    /// List available model architectures
    Models,
    /// Show or search a class label table
    Labels {
        /// Label file URL or path (default: ImageNet class index)
        #[arg(long, value_name = "URL|PATH")]
        labels: Option<String>,

        /// Case-insensitive substring to search for
        #[arg(long, value_name = "TEXT")]
        search: Option<String>,

        /// Maximum number of entries to print
        #[arg(long, default_value = "20", value_name = "N")]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Explain {
            image,
            config,
            labels,
            arch,
            weights,
            random_init,
            top_k,
            explain_top,
            classes,
            layer,
            alpha,
            colormap,
            output_dir,
            report,
        } => {
            let mut cfg = match config {
                Some(path) => ExplainConfig::from_file(&path)?,
                None => ExplainConfig::default(),
            };
            if let Some(labels) = labels {
                cfg.labels = Some(labels);
            }
            if let Some(arch) = arch {
                cfg.arch = arch;
            }
            if let Some(weights) = weights {
                cfg.weights = Some(weights);
            }
            if random_init {
                cfg.pretrained = false;
            }
            if let Some(top_k) = top_k {
                cfg.top_k = top_k;
            }
            if let Some(explain_top) = explain_top {
                cfg.explain_top = explain_top;
            }
            if !classes.is_empty() {
                cfg.classes = classes;
            }
            if let Some(layer) = layer {
                cfg.layer = Some(layer);
            }
            if let Some(alpha) = alpha {
                cfg.alpha = alpha;
            }
            if let Some(colormap) = colormap {
                cfg.colormap = colormap.parse::<Colormap>()?;
            }
            if let Some(output_dir) = output_dir {
                cfg.output_dir = output_dir;
            }
            cfg.report |= report;

            handle_explain(&image, &cfg)
        }
        Commands::Predict {
            image,
            labels,
            arch,
            weights,
            top_k,
        } => handle_predict(&image, labels.as_deref(), &arch, weights.as_deref(), top_k),
        Commands::Models => {
            handle_models();
            Ok(())
        }
        Commands::Labels {
            labels,
            search,
            limit,
        } => handle_labels(labels.as_deref(), search.as_deref(), limit),
    }
}

fn load_labels(labels: Option<&str>) -> Result<LabelTable> {
    let source = match labels {
        Some(s) => s.parse::<LabelSource>()?,
        None => LabelSource::imagenet(),
    };
    LabelTable::load(&source, None).with_context(|| format!("Failed to load labels from {}", source))
}

fn print_predictions(predictions: &[Prediction]) {
    println!("{:>4}  {:>5}  {:>8}  {:<10}  label", "rank", "class", "prob", "code");
    println!("─────────────────────────────────────────────────────");
    for (rank, p) in predictions.iter().enumerate() {
        println!(
            "{:>4}  {:>5}  {:>8.4}  {:<10}  {}",
            rank + 1,
            p.class_index,
            p.probability,
            p.code,
            p.label
        );
    }
}

fn handle_explain(image: &str, cfg: &ExplainConfig) -> Result<()> {
    let device = <CliBackend as Backend>::Device::default();
    let source: ImageSource = image.parse()?;
    let labels = load_labels(cfg.labels.as_deref())?;

    info!("Loading {} (pretrained: {})", cfg.arch, cfg.pretrained);
    let classifier = load_classifier::<CliBackend>(
        &cfg.arch,
        cfg.weights.as_deref(),
        cfg.pretrained,
        cfg.layer.as_deref(),
        &device,
    )
    .with_context(|| format!("Failed to load model '{}'", cfg.arch))?;

    let explanation = explain(&classifier, &source, &labels, &cfg.request())
        .with_context(|| format!("Failed to explain {}", source))?;

    println!("Image: {}", source);
    println!("Model: {} (layer {})\n", explanation.arch, explanation.layer);
    print_predictions(&explanation.predictions);

    let paths = explanation
        .save(&cfg.output_dir)
        .with_context(|| format!("Failed to write overlays to {}", cfg.output_dir.display()))?;
    println!();
    for (path, activation) in paths.iter().zip(&explanation.activations) {
        println!(
            "CAM for {} ({}): {}",
            activation.prediction.class_index,
            activation.prediction.label,
            path.display()
        );
    }

    if cfg.report {
        let report_path = cfg.output_dir.join("report.json");
        explanation.report().write(&report_path)?;
        println!("Report: {}", report_path.display());
    }

    Ok(())
}

fn handle_predict(
    image: &str,
    labels: Option<&str>,
    arch: &str,
    weights: Option<&Path>,
    top_k: usize,
) -> Result<()> {
    let device = <CliBackend as Backend>::Device::default();
    let source: ImageSource = image.parse()?;
    let labels = load_labels(labels)?;
    let classifier = load_classifier::<CliBackend>(arch, weights, true, None, &device)
        .with_context(|| format!("Failed to load model '{}'", arch))?;

    let predictions = predict(&classifier, &source, &labels, top_k)
        .with_context(|| format!("Failed to classify {}", source))?;

    println!("Image: {}\n", source);
    print_predictions(&predictions);
    Ok(())
}

fn handle_models() {
    println!("Available models:\n");
    for arch in ResNetArch::ALL {
        let blocks = arch.blocks();
        println!(
            "  {:<10} blocks {:?}  weights: {}",
            arch.name(),
            blocks,
            arch.hub_repo()
        );
    }
    println!("\nLayers: {}", RESNET_LAYERS.join(", "));
    println!("CAM layer: layer4");
}

fn handle_labels(labels: Option<&str>, search: Option<&str>, limit: usize) -> Result<()> {
    let table = load_labels(labels)?;
    println!("{} classes\n", table.len());

    let entries: Vec<_> = match search {
        Some(query) => table.search(query),
        None => table.iter().collect(),
    };
    if entries.is_empty() {
        println!("No matching labels.");
        return Ok(());
    }

    for (index, label) in entries.iter().take(limit) {
        println!("{:>5}  {:<10}  {}", index, label.code, label.name);
    }
    if entries.len() > limit {
        println!("... {} more", entries.len() - limit);
    }
    Ok(())
}
