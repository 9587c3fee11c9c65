//! End-to-end training run
//!
//! load -> split -> preload -> fit -> test evaluation -> demonstration ->
//! save model, history and charts

use std::path::PathBuf;

use burn::module::AutodiffModule;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::history::TrainingHistory;
use super::supervised::{demonstrate_prediction, evaluate, fit, Demonstration, Evaluation, FitOptions};
use crate::backend::{backend_name, default_device, TrainingBackend};
use crate::config::PipelineConfig;
use crate::dataset::burn_dataset::preload_batches;
use crate::dataset::loader::ImageFolder;
use crate::dataset::preview::write_sample_grid;
use crate::dataset::split::DatasetSplit;
use crate::model::checkpoint::{save_model, ModelMeta};
use crate::utils::charts::write_history_charts;
use crate::utils::error::Result;

/// Everything a training run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub class_names: Vec<String>,
    /// Batch counts of (train, validation, test)
    pub split: (usize, usize, usize),
    pub history: TrainingHistory,
    /// `None` when the test split came out empty
    pub test: Option<Evaluation>,
    pub demonstration: Option<Demonstration>,
    pub model_path: PathBuf,
}

/// Run the whole pipeline described by `config`
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineReport> {
    config.validate()?;

    let device = default_device();
    let image_size = config.data.image_size;
    info!("Backend: {}", backend_name());

    println!("{}", "Loading Dataset...".cyan());
    let mut folder = ImageFolder::open(&config.data.data_dir)?;
    if config.data.shuffle {
        folder.shuffle(config.seed);
    }
    let class_names = folder.class_names().to_vec();
    folder.stats().print();

    let batches = folder.batches(config.data.batch_size)?;
    info!("{} batches of up to {} images", batches.len(), config.data.batch_size);

    let split = DatasetSplit::from_sequence(batches, &config.split)?;
    println!("{} {}", "Split:".cyan(), split);

    println!("{}", "Pre-loading Images...".cyan());
    let train = preload_batches(&split.train, image_size as u32, "train")?;
    let validation = preload_batches(&split.validation, image_size as u32, "validation")?;
    let test = preload_batches(&split.test, image_size as u32, "test")?;

    if config.output.sample_grid {
        if let Some(first) = train.first() {
            write_sample_grid(first, &class_names, &config.output.report_dir.join("samples.png"))?;
        }
    }

    println!("{}", "Creating Model...".cyan());
    let model_config = config.classifier_config(class_names.len());
    let model = model_config.init::<TrainingBackend>(&device)?;

    println!("{}", "Starting Training...".green().bold());
    let options = FitOptions::from_config(config);
    let (model, history) = fit(model, &train, &validation, &class_names, &options, &device)?;

    let inference_model = model.valid();

    let test_eval = if test.iter().any(|b| !b.is_empty()) {
        let eval = evaluate(&inference_model, &test, &class_names, image_size, &device)?;
        println!("{}", "Test Evaluation:".cyan().bold());
        println!("{}", eval.metrics.display(&class_names));
        Some(eval)
    } else {
        warn!("Test split is empty; skipping test evaluation");
        None
    };

    let demonstration = if test_eval.is_some() {
        Some(demonstrate_prediction(&inference_model, &test, &class_names, image_size, &device)?)
    } else {
        None
    };

    println!("{}", "Saving Model...".cyan());
    let meta = ModelMeta::new(model_config, class_names.clone(), config.training.epochs);
    let model_path = save_model(inference_model, &meta, &config.output.model_path())?;

    history.save_json(&config.output.report_dir.join("history.json"))?;
    write_history_charts(&history, &config.output.report_dir)?;

    println!("{}", "Training Complete!".green().bold());
    println!("  💾 Model: {:?}", model_path);
    println!("  📈 Reports: {:?}", config.output.report_dir);

    Ok(PipelineReport {
        class_names,
        split: split.lens(),
        history,
        test: test_eval,
        demonstration,
        model_path,
    })
}
