//! Dataset module for potato leaf images
//!
//! This module provides functionality for:
//! - Scanning a class-per-directory image folder into positional batches
//! - Splitting the batch sequence into train / validation / test
//! - Resizing, rescaling and train-time augmentation
//! - Turning decoded batches into Burn tensors
//!
//! ## Pipeline
//!
//! ```text
//! ImageFolder::open -> shuffle(seed) -> batches(32) -> DatasetSplit
//!     -> preload_batches -> LeafBatcher / AugmentingBatcher -> ClassificationBatch
//! ```

pub mod augmentation;
pub mod burn_dataset;
pub mod loader;
pub mod preview;
pub mod split;

pub use augmentation::{AugmentationConfig, Augmenter};
pub use burn_dataset::{
    decode_batch, preload_batches, AugmentingBatcher, ClassificationBatch, LeafBatcher, LeafItem,
};
pub use loader::{DatasetStats, ImageFolder, ImageSample, SampleBatch};
pub use split::{DatasetSplit, SplitStrategy};

/// The three PlantVillage potato classes, in label order
pub const POTATO_CLASSES: [&str; 3] = ["Potato___Early_blight", "Potato___Late_blight", "Potato___healthy"];

/// Default square input size
pub const DEFAULT_IMAGE_SIZE: usize = 256;

/// Default number of images per batch
pub const DEFAULT_BATCH_SIZE: usize = 32;
