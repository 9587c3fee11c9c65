//! CNN architecture for potato leaf classification
//!
//! ```text
//! [B, 3, 256, 256]
//!   conv 3x3 (32) + relu + maxpool 2x2   -> [B, 32, 127, 127]
//!   conv 3x3 (64) + relu + maxpool 2x2   -> [B, 64, 62, 62]
//!   conv 3x3 (64) + relu + maxpool 2x2   -> [B, 64, 30, 30]
//!   conv 3x3 (64) + relu + maxpool 2x2   -> [B, 64, 14, 14]
//!   conv 3x3 (64) + relu + maxpool 2x2   -> [B, 64, 6, 6]
//!   conv 3x3 (64) + relu + maxpool 2x2   -> [B, 64, 2, 2]
//!   flatten                              -> [B, 256]
//!   dense 64 + relu                      -> [B, 64]
//!   dense num_classes                    -> [B, 3]
//! ```

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::CrossEntropyLossConfig,
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Int, Tensor},
};

use crate::utils::error::{self, PlantDiseaseError};

/// Spatial size after `num_blocks` valid convolutions of `kernel_size`,
/// each followed by a 2x2 stride-2 max pool. Zero means the input is too
/// small.
pub fn feature_map_size(image_size: usize, num_blocks: usize, kernel_size: usize) -> usize {
    let mut size = image_size;
    for _ in 0..num_blocks {
        if size < kernel_size {
            return 0;
        }
        size = (size - kernel_size + 1) / 2;
    }
    size
}

/// Configuration for the PlantClassifier CNN model
#[derive(Config, Debug)]
pub struct PlantClassifierConfig {
    /// Number of output classes
    pub num_classes: usize,

    /// Input image size (square)
    #[config(default = "256")]
    pub image_size: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Output channels of each conv block
    #[config(default = "vec![32, 64, 64, 64, 64, 64]")]
    pub conv_channels: Vec<usize>,

    #[config(default = "3")]
    pub kernel_size: usize,

    /// Width of the hidden dense layer
    #[config(default = "64")]
    pub hidden_units: usize,
}

impl PlantClassifierConfig {
    /// Spatial size of the last feature map
    pub fn feature_map_size(&self) -> usize {
        feature_map_size(self.image_size, self.conv_channels.len(), self.kernel_size)
    }

    /// Input width of the first dense layer
    pub fn flattened_size(&self) -> usize {
        let side = self.feature_map_size();
        self.conv_channels.last().copied().unwrap_or(0) * side * side
    }

    pub fn validate(&self) -> error::Result<()> {
        if self.num_classes < 2 {
            return Err(PlantDiseaseError::Model(format!(
                "need at least 2 classes, got {}",
                self.num_classes
            )));
        }
        if self.conv_channels.is_empty() {
            return Err(PlantDiseaseError::Model("at least one conv block is required".into()));
        }
        if self.feature_map_size() == 0 {
            return Err(PlantDiseaseError::Model(format!(
                "input {}x{} is too small for {} conv blocks",
                self.image_size,
                self.image_size,
                self.conv_channels.len()
            )));
        }
        Ok(())
    }

    /// Validate and build the model
    pub fn init<B: Backend>(&self, device: &B::Device) -> error::Result<PlantClassifier<B>> {
        self.validate()?;
        Ok(PlantClassifier::new(self, device))
    }
}

/// Conv2d (valid padding) + ReLU + 2x2 MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub relu: Relu,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);

        Self {
            conv,
            relu: Relu::new(),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Potato leaf classifier
#[derive(Module, Debug)]
pub struct PlantClassifier<B: Backend> {
    pub blocks: Vec<ConvBlock<B>>,
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
    relu: Relu,
    num_classes: usize,
}

impl<B: Backend> PlantClassifier<B> {
    /// Build from a config; call [`PlantClassifierConfig::validate`] first
    /// (or use [`PlantClassifierConfig::init`]) since an undersized input
    /// makes the first dense layer zero-width.
    pub fn new(config: &PlantClassifierConfig, device: &B::Device) -> Self {
        let mut blocks = Vec::with_capacity(config.conv_channels.len());
        let mut in_channels = config.in_channels;
        for &out_channels in &config.conv_channels {
            blocks.push(ConvBlock::new(in_channels, out_channels, config.kernel_size, device));
            in_channels = out_channels;
        }

        let fc1 = LinearConfig::new(config.flattened_size(), config.hidden_units).init(device);
        let fc2 = LinearConfig::new(config.hidden_units, config.num_classes).init(device);

        Self {
            blocks,
            fc1,
            fc2,
            relu: Relu::new(),
            num_classes: config.num_classes,
        }
    }

    /// Images `[batch, channels, height, width]` to logits `[batch, num_classes]`
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for block in &self.blocks {
            x = block.forward(x);
        }

        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        let x = self.fc1.forward(x);
        let x = self.relu.forward(x);
        self.fc2.forward(x)
    }

    /// Class probabilities; each row sums to 1
    pub fn forward_softmax(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        burn::tensor::activation::softmax(self.forward(images), 1)
    }

    /// Mean cross-entropy loss and logits for a labeled batch
    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), targets);
        (loss, logits)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{ElementConversion, TensorData};
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_feature_map_size() {
        assert_eq!(feature_map_size(256, 6, 3), 2);
        assert_eq!(feature_map_size(256, 1, 3), 127);
        assert_eq!(feature_map_size(190, 6, 3), 1);
        assert_eq!(feature_map_size(128, 6, 3), 0);
        assert_eq!(feature_map_size(2, 1, 3), 0);
    }

    #[test]
    fn test_default_config() {
        let config = PlantClassifierConfig::new(3);
        assert_eq!(config.image_size, 256);
        assert_eq!(config.conv_channels.len(), 6);
        assert_eq!(config.flattened_size(), 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = PlantClassifierConfig::new(3)
            .with_image_size(190)
            .with_hidden_units(32);

        let json = serde_json::to_string(&config).unwrap();
        let restored: PlantClassifierConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.image_size, 190);
        assert_eq!(restored.hidden_units, 32);
        assert_eq!(restored.conv_channels, config.conv_channels);
    }

    #[test]
    fn test_invalid_config() {
        assert!(PlantClassifierConfig::new(3).with_image_size(64).validate().is_err());
        assert!(PlantClassifierConfig::new(1).validate().is_err());
        assert!(PlantClassifierConfig::new(3).with_conv_channels(vec![]).validate().is_err());

        let device = Default::default();
        assert!(PlantClassifierConfig::new(3)
            .with_image_size(100)
            .init::<TestBackend>(&device)
            .is_err());
    }

    #[test]
    fn test_plant_classifier_output_shape() {
        let device = Default::default();
        let model = PlantClassifierConfig::new(3).init::<TestBackend>(&device).unwrap();

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 256, 256], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [1, 3]);
        assert_eq!(model.num_classes(), 3);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let device = Default::default();
        let config = PlantClassifierConfig::new(3)
            .with_image_size(32)
            .with_conv_channels(vec![8, 8]);
        let model = config.init::<TestBackend>(&device).unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [4, 3, 32, 32],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let probs = model.forward_softmax(input);
        assert_eq!(probs.dims(), [4, 3]);

        let sums: Vec<f32> = probs.sum_dim(1).into_data().to_vec().unwrap();
        for sum in sums {
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_forward_classification_loss() {
        let device = Default::default();
        let config = PlantClassifierConfig::new(3)
            .with_image_size(32)
            .with_conv_channels(vec![4, 4]);
        let model = config.init::<TestBackend>(&device).unwrap();

        let images = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let targets = Tensor::<TestBackend, 1, Int>::from_data(TensorData::new(vec![0i64, 2], [2]), &device);

        let (loss, logits) = model.forward_classification(images, targets);
        assert_eq!(logits.dims(), [2, 3]);

        let loss = loss.into_scalar().elem::<f32>();
        assert!(loss.is_finite() && loss > 0.0);
    }
}
