//! Supervised Training Implementation
//!
//! A custom loop rather than Burn's `Learner`: per epoch, shuffle the order
//! of the training batches, augment, forward, cross-entropy, backward and an
//! Adam step; then evaluate on the validation batches.

use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion,
    },
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::history::{EpochRecord, TrainingHistory};
use crate::config::PipelineConfig;
use crate::dataset::augmentation::AugmentationConfig;
use crate::dataset::burn_dataset::{AugmentingBatcher, ClassificationBatch, LeafBatcher, LeafItem};
use crate::model::cnn::PlantClassifier;
use crate::utils::error::{PlantDiseaseError, Result};
use crate::utils::logging::TrainingLogger;
use crate::utils::metrics::Metrics;

/// Optimizer schedule and augmentation for one `fit` call
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub epochs: usize,
    pub learning_rate: f64,
    pub image_size: usize,
    pub augmentation: AugmentationConfig,
    pub seed: u64,
}

impl FitOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            epochs: config.training.epochs,
            learning_rate: config.training.learning_rate,
            image_size: config.data.image_size,
            augmentation: config.augmentation.clone(),
            seed: config.seed,
        }
    }
}

/// Loss, accuracy and per-class metrics over a batch sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    /// Sample-weighted mean cross-entropy
    pub loss: f64,
    /// Fraction in [0, 1]
    pub accuracy: f64,
    pub metrics: Metrics,
}

/// Outcome of classifying the first image of a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demonstration {
    pub image_path: std::path::PathBuf,
    pub actual: String,
    pub predicted: String,
    pub confidence: f32,
}

impl Demonstration {
    pub fn is_correct(&self) -> bool {
        self.actual == self.predicted
    }
}

/// Train `model` for `options.epochs` epochs and record per-epoch metrics
pub fn fit<B: AutodiffBackend>(
    mut model: PlantClassifier<B>,
    train: &[Vec<LeafItem>],
    validation: &[Vec<LeafItem>],
    class_names: &[String],
    options: &FitOptions,
    device: &B::Device,
) -> Result<(PlantClassifier<B>, TrainingHistory)> {
    if train.iter().all(|b| b.is_empty()) {
        return Err(PlantDiseaseError::Training("training split is empty".into()));
    }
    if validation.iter().all(|b| b.is_empty()) {
        return Err(PlantDiseaseError::Training("validation split is empty".into()));
    }

    let batcher = AugmentingBatcher::new(options.augmentation.clone(), options.image_size, options.seed);
    let mut optimizer = AdamConfig::new().init();
    let mut epoch_rng = ChaCha8Rng::seed_from_u64(options.seed);

    let mut history = TrainingHistory::default();
    let mut logger = TrainingLogger::new(options.epochs);
    let num_batches = train.len();

    for epoch in 0..options.epochs {
        logger.start_epoch(epoch);

        let mut order: Vec<usize> = (0..num_batches).collect();
        order.shuffle(&mut epoch_rng);

        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;
        let mut seen = 0usize;

        for (step, &batch_idx) in order.iter().enumerate() {
            let items = &train[batch_idx];
            if items.is_empty() {
                continue;
            }

            let batch: ClassificationBatch<B> = batcher.batch(items.clone(), device);
            let batch_len = batch.len();

            let (loss, logits) = model.forward_classification(batch.images, batch.targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            if !loss_value.is_finite() {
                return Err(PlantDiseaseError::Training(format!(
                    "loss became {} at epoch {}, batch {}",
                    loss_value,
                    epoch + 1,
                    step + 1
                )));
            }

            let predictions = logits.argmax(1).reshape([batch_len]);
            let batch_correct: i64 = predictions.equal(batch.targets).int().sum().into_scalar().elem();

            loss_sum += loss_value * batch_len as f64;
            correct += batch_correct as usize;
            seen += batch_len;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(options.learning_rate, model, grads);

            if (step + 1) % 10 == 0 || step + 1 == num_batches {
                debug!(
                    "  Batch {:>4}/{}: loss = {:.4}, acc = {:.2}%",
                    step + 1,
                    num_batches,
                    loss_value,
                    100.0 * correct as f64 / seen.max(1) as f64
                );
            }
        }

        let train_loss = loss_sum / seen.max(1) as f64;
        let train_accuracy = correct as f64 / seen.max(1) as f64;

        let val = evaluate(&model.valid(), validation, class_names, options.image_size, device)?;

        logger.end_epoch(train_loss, train_accuracy, val.loss, val.accuracy);
        history.push(EpochRecord {
            epoch,
            train_loss,
            train_accuracy,
            val_loss: val.loss,
            val_accuracy: val.accuracy,
        });
    }

    if let Some(last) = history.last() {
        logger.log_complete(last.val_accuracy);
    }

    Ok((model, history))
}

/// Evaluate a model on a batch sequence without augmentation
pub fn evaluate<B: Backend>(
    model: &PlantClassifier<B>,
    batches: &[Vec<LeafItem>],
    class_names: &[String],
    image_size: usize,
    device: &B::Device,
) -> Result<Evaluation> {
    let batcher = LeafBatcher::new(image_size);

    let mut loss_sum = 0.0f64;
    let mut predictions: Vec<usize> = Vec::new();
    let mut ground_truth: Vec<usize> = Vec::new();

    for items in batches.iter().filter(|b| !b.is_empty()) {
        ground_truth.extend(items.iter().map(|item| item.label));

        let batch: ClassificationBatch<B> = batcher.batch(items.clone(), device);
        let batch_len = batch.len();

        let (loss, logits) = model.forward_classification(batch.images, batch.targets);
        let loss_value: f64 = loss.into_scalar().elem();
        loss_sum += loss_value * batch_len as f64;

        let predicted: Vec<i64> = logits
            .argmax(1)
            .reshape([batch_len])
            .into_data()
            .convert::<i64>()
            .to_vec()
            .map_err(|e| PlantDiseaseError::Training(format!("Failed to read predictions: {e:?}")))?;
        predictions.extend(predicted.into_iter().map(|p| p as usize));
    }

    if ground_truth.is_empty() {
        return Err(PlantDiseaseError::Training("cannot evaluate on an empty split".into()));
    }

    let metrics = Metrics::from_predictions(&predictions, &ground_truth, class_names);

    Ok(Evaluation {
        loss: loss_sum / ground_truth.len() as f64,
        accuracy: metrics.accuracy,
        metrics,
    })
}

/// Classify the first image of the first non-empty batch and log the
/// predicted class name against the actual one
pub fn demonstrate_prediction<B: Backend>(
    model: &PlantClassifier<B>,
    batches: &[Vec<LeafItem>],
    class_names: &[String],
    image_size: usize,
    device: &B::Device,
) -> Result<Demonstration> {
    let item = batches
        .iter()
        .find_map(|b| b.first())
        .ok_or_else(|| PlantDiseaseError::Inference("no batch to demonstrate on".into()))?;

    let batch: ClassificationBatch<B> = LeafBatcher::new(image_size).batch(vec![item.clone()], device);
    let probabilities: Vec<f32> = model
        .forward_softmax(batch.images)
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| PlantDiseaseError::Inference(format!("Failed to read probabilities: {e:?}")))?;

    let (predicted_idx, confidence) = probabilities
        .iter()
        .copied()
        .enumerate()
        .fold((0usize, f32::MIN), |best, (i, p)| if p > best.1 { (i, p) } else { best });

    let name = |idx: usize| {
        class_names
            .get(idx)
            .cloned()
            .ok_or_else(|| PlantDiseaseError::Inference(format!("class index {idx} has no name")))
    };

    let demo = Demonstration {
        image_path: item.path.clone(),
        actual: name(item.label)?,
        predicted: name(predicted_idx)?,
        confidence,
    };

    info!("First image to predict: {:?}", demo.image_path);
    info!("Actual label: {}", demo.actual);
    info!("Predicted label: {} ({:.2}%)", demo.predicted, demo.confidence * 100.0);
    if !demo.is_correct() {
        warn!("Demonstration image was misclassified");
    }

    Ok(demo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::cnn::PlantClassifierConfig;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::path::PathBuf;

    type TestBackend = NdArray;
    type TestAutodiffBackend = Autodiff<NdArray>;

    const SIZE: usize = 32;

    fn item(label: usize) -> LeafItem {
        let color = match label {
            0 => [200, 40, 40],
            1 => [40, 200, 40],
            _ => [40, 40, 200],
        };
        LeafItem {
            image: DynamicImage::ImageRgb8(ImageBuffer::from_pixel(SIZE as u32, SIZE as u32, Rgb(color))),
            label,
            path: PathBuf::from(format!("leaf_{label}.png")),
        }
    }

    fn names() -> Vec<String> {
        vec!["early".into(), "late".into(), "healthy".into()]
    }

    fn small_config() -> PlantClassifierConfig {
        PlantClassifierConfig::new(3)
            .with_image_size(SIZE)
            .with_conv_channels(vec![4, 4])
            .with_hidden_units(8)
    }

    fn options(epochs: usize) -> FitOptions {
        FitOptions {
            epochs,
            learning_rate: 1e-2,
            image_size: SIZE,
            augmentation: AugmentationConfig::none(),
            seed: 42,
        }
    }

    #[test]
    fn test_evaluate_counts_every_sample() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device).unwrap();
        let batches = vec![vec![item(0), item(1)], vec![item(2)]];

        let eval = evaluate(&model, &batches, &names(), SIZE, &device).unwrap();

        assert_eq!(eval.metrics.total_samples, 3);
        assert!(eval.loss.is_finite());
        assert!((0.0..=1.0).contains(&eval.accuracy));
    }

    #[test]
    fn test_evaluate_empty_split_fails() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device).unwrap();

        let err = evaluate(&model, &[], &names(), SIZE, &device).unwrap_err();
        assert!(matches!(err, PlantDiseaseError::Training(_)));
    }

    #[test]
    fn test_fit_records_each_epoch() {
        let device = Default::default();
        let model = small_config().init::<TestAutodiffBackend>(&device).unwrap();
        let train = vec![vec![item(0), item(1), item(2)], vec![item(2), item(0)]];
        let validation = vec![vec![item(1), item(2)]];

        let (_, history) = fit(model, &train, &validation, &names(), &options(2), &device).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history.epochs[1].epoch, 1);
        assert!(history.epochs.iter().all(|e| e.train_loss.is_finite() && e.val_loss.is_finite()));
    }

    #[test]
    fn test_fit_requires_validation() {
        let device = Default::default();
        let model = small_config().init::<TestAutodiffBackend>(&device).unwrap();
        let train = vec![vec![item(0)]];

        let err = fit(model, &train, &[], &names(), &options(1), &device).unwrap_err();
        assert!(matches!(err, PlantDiseaseError::Training(_)));
    }

    #[test]
    fn test_fit_requires_training_batches() {
        let device = Default::default();
        let model = small_config().init::<TestAutodiffBackend>(&device).unwrap();
        let validation = vec![vec![item(1)]];

        let err = fit(model, &[], &validation, &names(), &options(1), &device).unwrap_err();
        assert!(matches!(err, PlantDiseaseError::Training(_)));

        let model = small_config().init::<TestAutodiffBackend>(&device).unwrap();
        let err = fit(model, &[vec![]], &validation, &names(), &options(1), &device).unwrap_err();
        assert!(matches!(err, PlantDiseaseError::Training(_)));
    }

    #[test]
    fn test_demonstrate_prediction() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device).unwrap();
        let batches = vec![vec![item(1), item(0)]];

        let demo = demonstrate_prediction(&model, &batches, &names(), SIZE, &device).unwrap();

        assert_eq!(demo.actual, "late");
        assert!(names().contains(&demo.predicted));
        assert!(demo.confidence > 0.0 && demo.confidence <= 1.0);
    }
}
