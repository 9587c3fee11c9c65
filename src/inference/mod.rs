//! Inference module
//!
//! Single-image and batch prediction with a saved classifier.

pub mod predictor;

pub use predictor::{PredictionResult, Predictor};
