//! Training module
//!
//! This module provides:
//! - The supervised training loop and evaluation (`supervised`)
//! - Per-epoch loss / accuracy history (`history`)
//! - The end-to-end run wiring loader, split, model and artifacts (`pipeline`)

pub mod history;
pub mod pipeline;
pub mod supervised;

pub use history::{EpochRecord, TrainingHistory};
pub use pipeline::{run_pipeline, PipelineReport};
pub use supervised::{demonstrate_prediction, evaluate, fit, Demonstration, Evaluation, FitOptions};

/// Default number of training epochs
pub const DEFAULT_EPOCHS: usize = 10;

/// Default Adam learning rate
pub const DEFAULT_LEARNING_RATE: f64 = 1e-3;
