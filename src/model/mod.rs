//! Model module for the leaf classifier CNN
//!
//! The network is a plain stack of valid 3x3 convolutions, each followed by
//! ReLU and 2x2 max pooling, then a flatten and two dense layers. It returns
//! logits; [`PlantClassifier::forward_softmax`] gives class probabilities.

pub mod checkpoint;
pub mod cnn;

pub use checkpoint::{load_model, save_model, ModelMeta};
pub use cnn::{feature_map_size, PlantClassifier, PlantClassifierConfig};
