//! Pipeline configuration
//!
//! Every path and hyperparameter the pipeline uses lives here. The defaults
//! are `PlantVillage/` input, 256x256 RGB images, batches of 32, an 80/10/10
//! fractional split, 10 epochs of Adam and a model saved to `../models/1`.
//! The fixed 54 / 6 / remainder batch layout needs `SplitStrategy::legacy()`;
//! the fractional default only lands on it for 67 batches.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::augmentation::AugmentationConfig;
use crate::dataset::split::SplitStrategy;
use crate::dataset::{DEFAULT_BATCH_SIZE, DEFAULT_IMAGE_SIZE};
use crate::model::cnn::{feature_map_size, PlantClassifierConfig};
use crate::training::{DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE};
use crate::utils::error::{PlantDiseaseError, Result, ResultExt};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub split: SplitStrategy,
    pub augmentation: AugmentationConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub output: OutputConfig,
    /// Seed for sample shuffling, batch order and augmentation
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            split: SplitStrategy::default(),
            augmentation: AugmentationConfig::default(),
            model: ModelConfig::default(),
            training: TrainingConfig::default(),
            output: OutputConfig::default(),
            seed: 42,
        }
    }
}

/// Dataset location and batching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Root directory with one subdirectory per class
    pub data_dir: PathBuf,
    /// Square side length images are resized to
    pub image_size: usize,
    /// Color channels (RGB only)
    pub channels: usize,
    pub batch_size: usize,
    /// Shuffle samples once at load time
    pub shuffle: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("PlantVillage"),
            image_size: DEFAULT_IMAGE_SIZE,
            channels: 3,
            batch_size: DEFAULT_BATCH_SIZE,
            shuffle: true,
        }
    }
}

/// Convolutional stack layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Output channels of each conv + max-pool block
    pub conv_channels: Vec<usize>,
    pub kernel_size: usize,
    /// Units of the hidden dense layer
    pub hidden_units: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            conv_channels: vec![32, 64, 64, 64, 64, 64],
            kernel_size: 3,
            hidden_units: 64,
        }
    }
}

/// Optimizer and schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    /// Adam learning rate
    pub learning_rate: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            learning_rate: DEFAULT_LEARNING_RATE,
        }
    }
}

/// Where artifacts are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory the model is saved into
    pub model_dir: PathBuf,
    /// Model file stem inside `model_dir`
    pub model_version: u32,
    /// Directory for charts, history and the sample grid
    pub report_dir: PathBuf,
    /// Render the first batch into `samples.png`
    pub sample_grid: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("../models"),
            model_version: 1,
            report_dir: PathBuf::from("output"),
            sample_grid: true,
        }
    }
}

impl OutputConfig {
    /// Path of the saved model, without the recorder's extension
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(self.model_version.to_string())
    }
}

/// Optional command-line values that win over the file and the defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub epochs: Option<usize>,
    pub report_dir: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl PipelineConfig {
    /// Load a TOML file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;

        let config: Self =
            toml::from_str(&content).with_context(|| format!("Failed to parse config {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PlantDiseaseError::Serialization(e.to_string()))
    }

    /// Check every field for a usable value
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(PlantDiseaseError::Config(msg));

        if self.data.batch_size == 0 {
            return fail("batch_size must be greater than 0".into());
        }
        if self.data.channels != 3 {
            return fail(format!("only 3-channel RGB input is supported, got {}", self.data.channels));
        }
        if self.model.conv_channels.is_empty() {
            return fail("conv_channels must have at least one block".into());
        }
        if self.model.conv_channels.contains(&0) || self.model.hidden_units == 0 {
            return fail("layer widths must be greater than 0".into());
        }
        if self.model.kernel_size == 0 || self.model.kernel_size % 2 == 0 {
            return fail("kernel_size must be a positive odd number".into());
        }
        if feature_map_size(self.data.image_size, self.model.conv_channels.len(), self.model.kernel_size) == 0 {
            return fail(format!(
                "image_size {} is too small for {} conv blocks with kernel {}",
                self.data.image_size,
                self.model.conv_channels.len(),
                self.model.kernel_size
            ));
        }
        if self.training.epochs == 0 {
            return fail("epochs must be greater than 0".into());
        }
        if !(self.training.learning_rate > 0.0) {
            return fail("learning_rate must be positive".into());
        }

        self.split.validate()?;
        self.augmentation.validate()?;

        Ok(())
    }

    /// Layer command-line values over this config; `None` keeps the loaded value
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(data_dir) = &overrides.data_dir {
            self.data.data_dir = data_dir.clone();
        }
        if let Some(batch_size) = overrides.batch_size {
            self.data.batch_size = batch_size;
        }
        if let Some(epochs) = overrides.epochs {
            self.training.epochs = epochs;
        }
        if let Some(report_dir) = &overrides.report_dir {
            self.output.report_dir = report_dir.clone();
        }
        if let Some(seed) = overrides.seed {
            self.seed = seed;
        }
        self
    }

    /// Model config for a dataset with `num_classes` classes
    pub fn classifier_config(&self, num_classes: usize) -> PlantClassifierConfig {
        PlantClassifierConfig::new(num_classes)
            .with_image_size(self.data.image_size)
            .with_in_channels(self.data.channels)
            .with_conv_channels(self.model.conv_channels.clone())
            .with_kernel_size(self.model.kernel_size)
            .with_hidden_units(self.model.hidden_units)
    }
}
