//! # Potato Leaf Blight Classifier
//!
//! Trains a small convolutional network with the Burn framework to tell
//! healthy potato leaves from early-blight and late-blight ones.
//!
//! ## Modules
//!
//! - `dataset`: Image folder loading, positional splitting, augmentation and batching
//! - `model`: CNN architecture and checkpoints
//! - `training`: Training loop, evaluation and the end-to-end pipeline
//! - `inference`: Prediction with a saved model
//! - `config`: Pipeline configuration (TOML)
//! - `utils`: Logging, metrics, charts and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use plant_disease::config::PipelineConfig;
//! use plant_disease::training::run_pipeline;
//!
//! let report = run_pipeline(&PipelineConfig::default())?;
//! println!("{:?}", report.history.last());
//! ```

pub mod backend;
pub mod config;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

pub use config::PipelineConfig;
pub use dataset::{DatasetSplit, ImageFolder, SplitStrategy};
pub use inference::Predictor;
pub use model::cnn::{PlantClassifier, PlantClassifierConfig};
pub use training::{run_pipeline, Evaluation, TrainingHistory};
pub use utils::error::{PlantDiseaseError, Result};
pub use utils::metrics::{ConfusionMatrix, Metrics};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
