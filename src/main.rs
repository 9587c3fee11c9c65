//! Potato leaf blight classifier CLI
//!
//! `train` runs the whole pipeline, `stats` inspects a dataset directory and
//! `infer` classifies images with a saved model.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::error;

use plant_disease::backend::{backend_name, default_device, DefaultBackend};
use plant_disease::config::{ConfigOverrides, PipelineConfig};
use plant_disease::dataset::{DatasetSplit, ImageFolder};
use plant_disease::inference::Predictor;
use plant_disease::training::run_pipeline;
use plant_disease::utils::logging::{init_logging, LogConfig};

/// Potato leaf blight classification with Burn
#[derive(Parser, Debug)]
#[command(name = "plant_disease")]
#[command(version)]
#[command(about = "Healthy / Early blight / Late blight potato leaf classifier", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train, evaluate and save a model
    Train {
        /// TOML pipeline configuration (defaults apply to missing fields)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Dataset directory with one subdirectory per class
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        #[arg(short, long)]
        epochs: Option<usize>,

        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Directory for history.json, charts and the sample grid
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show class table, per-class counts, batch count and split sizes
    Stats {
        /// Dataset directory (default: from config, else PlantVillage)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Batch size (default: from config, else 32)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// TOML configuration supplying data, batching and split settings
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Classify one or more images with a saved model
    Infer {
        /// Saved model path, e.g. ../models/1
        #[arg(short, long)]
        model: PathBuf,

        /// Image files
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    print_banner();

    let result = match cli.command {
        Commands::Train {
            config,
            data_dir,
            epochs,
            batch_size,
            output_dir,
            seed,
        } => cmd_train(
            config,
            ConfigOverrides {
                data_dir,
                batch_size,
                epochs,
                report_dir: output_dir,
                seed,
            },
        ),
        Commands::Stats {
            data_dir,
            batch_size,
            config,
        } => cmd_stats(
            config,
            ConfigOverrides {
                data_dir,
                batch_size,
                ..Default::default()
            },
        ),
        Commands::Infer { model, input } => cmd_infer(model, input),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════════╗
 ║   🥔 Potato Leaf Blight Classifier                   ║
 ║   Healthy / Early blight / Late blight with Burn     ║
 ╚══════════════════════════════════════════════════════╝
  "#
        .green()
    );
}

fn load_config(path: Option<PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(&path).with_context(|| format!("loading {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn cmd_train(config: Option<PathBuf>, overrides: ConfigOverrides) -> Result<()> {
    let config = load_config(config)?.with_overrides(&overrides);
    config.validate()?;

    println!("{}", "Training Configuration:".cyan().bold());
    println!("  📂 Data:          {:?}", config.data.data_dir);
    println!("  🔄 Epochs:        {}", config.training.epochs);
    println!("  📦 Batch size:    {}", config.data.batch_size);
    println!("  📈 Learning rate: {}", config.training.learning_rate);
    println!("  ✂️  Split:         {:?}", config.split);
    println!("  🧠 Backend:       {}", backend_name());
    println!();

    let report = run_pipeline(&config)?;

    if let Some(test) = &report.test {
        println!(
            "  🎯 Test accuracy: {:.2}% (loss {:.4})",
            test.accuracy * 100.0,
            test.loss
        );
    }
    if let Some(demo) = &report.demonstration {
        println!("  🔍 Actual: {} | Predicted: {}", demo.actual, demo.predicted);
    }

    println!();
    println!("{}", "Next steps:".cyan().bold());
    println!(
        "  • Run inference: plant_disease infer --model {:?} --input <image>",
        report.model_path
    );

    Ok(())
}

fn cmd_stats(config: Option<PathBuf>, overrides: ConfigOverrides) -> Result<()> {
    let config = load_config(config)?.with_overrides(&overrides);
    let batch_size = config.data.batch_size;
    let folder = ImageFolder::open(&config.data.data_dir)?;

    folder.stats().print();

    let batches = folder.batches(batch_size)?;
    println!();
    println!("  Batches of {}: {}", batch_size, batches.len());

    match DatasetSplit::from_sequence(batches, &config.split) {
        Ok(split) => println!("  Split ({:?}): {}", config.split, split),
        Err(e) => println!("  {} {}", "Split not possible:".yellow(), e),
    }

    Ok(())
}

fn cmd_infer(model: PathBuf, inputs: Vec<PathBuf>) -> Result<()> {
    let predictor = Predictor::<DefaultBackend>::load(&model, default_device())?;

    for result in predictor.predict_files(&inputs)? {
        println!("{}", result.display());
    }

    Ok(())
}
