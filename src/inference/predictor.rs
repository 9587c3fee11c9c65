//! Inference Predictor Module
//!
//! Loads a saved classifier with its config sidecar and classifies images
//! using the same preprocessing as evaluation (resize, rescale, no
//! augmentation).

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use burn::data::dataloader::batcher::Batcher;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::dataset::burn_dataset::{ClassificationBatch, LeafBatcher, LeafItem};
use crate::model::checkpoint::{load_model, ModelMeta};
use crate::model::cnn::PlantClassifier;
use crate::utils::error::{PlantDiseaseError, Result};

/// Result of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub image_path: Option<PathBuf>,
    pub predicted_class: usize,
    pub class_name: String,
    /// Probability of the predicted class
    pub confidence: f32,
    pub probabilities: Vec<f32>,
    /// All classes, most probable first
    pub ranking: Vec<(usize, String, f32)>,
    pub inference_time_ms: f64,
}

impl PredictionResult {
    pub fn new(
        probabilities: Vec<f32>,
        class_names: &[String],
        inference_time: Duration,
        image_path: Option<PathBuf>,
    ) -> Self {
        let name = |idx: usize| class_names.get(idx).cloned().unwrap_or_else(|| "Unknown".to_string());

        let mut ranking: Vec<(usize, String, f32)> =
            probabilities.iter().enumerate().map(|(i, &p)| (i, name(i), p)).collect();
        ranking.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal));

        let (predicted_class, confidence) = ranking.first().map(|(i, _, p)| (*i, *p)).unwrap_or((0, 0.0));

        Self {
            image_path,
            predicted_class,
            class_name: name(predicted_class),
            confidence,
            probabilities,
            ranking,
            inference_time_ms: inference_time.as_secs_f64() * 1000.0,
        }
    }

    /// Pretty print the prediction result
    pub fn display(&self) -> String {
        let mut output = String::new();

        if let Some(path) = &self.image_path {
            output.push_str(&format!("Image: {:?}\n", path));
        }
        output.push_str(&format!("Prediction: {} (class {})\n", self.class_name, self.predicted_class));
        output.push_str(&format!("Confidence: {:.2}%\n", self.confidence * 100.0));
        output.push_str(&format!("Inference time: {:.2} ms\n", self.inference_time_ms));

        output.push_str("\nAll classes:\n");
        for (rank, (idx, name, prob)) in self.ranking.iter().enumerate() {
            output.push_str(&format!("  {}. {} (class {}) - {:.2}%\n", rank + 1, name, idx, prob * 100.0));
        }

        output
    }
}

/// A loaded classifier ready to predict
pub struct Predictor<B: Backend> {
    model: PlantClassifier<B>,
    meta: ModelMeta,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    pub fn new(model: PlantClassifier<B>, meta: ModelMeta, device: B::Device) -> Self {
        Self { model, meta, device }
    }

    /// Load weights and sidecar from `model_path` (with or without `.mpk`)
    pub fn load(model_path: &Path, device: B::Device) -> Result<Self> {
        let (model, meta) = load_model::<B>(model_path, &device)?;
        tracing::info!(
            "Loaded {}-class model ({}x{} input) from {:?}",
            meta.class_names.len(),
            meta.model.image_size,
            meta.model.image_size,
            model_path
        );
        Ok(Self::new(model, meta, device))
    }

    pub fn class_names(&self) -> &[String] {
        &self.meta.class_names
    }

    pub fn image_size(&self) -> usize {
        self.meta.model.image_size
    }

    /// Classify one decoded item
    pub fn predict_item(&self, item: LeafItem) -> Result<PredictionResult> {
        let start = Instant::now();
        let path = item.path.clone();

        let batch: ClassificationBatch<B> = LeafBatcher::new(self.image_size()).batch(vec![item], &self.device);
        let probabilities: Vec<f32> = self
            .model
            .forward_softmax(batch.images)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| PlantDiseaseError::Inference(format!("Failed to read probabilities: {e:?}")))?;

        Ok(PredictionResult::new(
            probabilities,
            self.class_names(),
            start.elapsed(),
            Some(path),
        ))
    }

    /// Decode and classify one image file
    pub fn predict_file(&self, path: &Path) -> Result<PredictionResult> {
        let item = LeafItem::from_path(&path.to_path_buf(), 0, self.image_size() as u32)?;
        self.predict_item(item)
    }

    /// Classify every image file in order, stopping at the first failure
    pub fn predict_files(&self, paths: &[PathBuf]) -> Result<Vec<PredictionResult>> {
        paths.iter().map(|p| self.predict_file(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::checkpoint::save_model;
    use crate::model::cnn::PlantClassifierConfig;
    use burn_ndarray::NdArray;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn names() -> Vec<String> {
        vec!["Potato___Early_blight".into(), "Potato___Late_blight".into(), "Potato___healthy".into()]
    }

    #[test]
    fn test_prediction_result_new() {
        let result = PredictionResult::new(vec![0.1, 0.7, 0.2], &names(), Duration::from_millis(5), None);

        assert_eq!(result.predicted_class, 1);
        assert_eq!(result.class_name, "Potato___Late_blight");
        assert!((result.confidence - 0.7).abs() < 1e-6);
        assert_eq!(result.ranking.iter().map(|r| r.0).collect::<Vec<_>>(), vec![1, 2, 0]);
        assert!(result.display().contains("Potato___Late_blight"));
    }

    #[test]
    fn test_predict_file_from_saved_model() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        let config = PlantClassifierConfig::new(3)
            .with_image_size(16)
            .with_conv_channels(vec![4]);
        let model = config.init::<TestBackend>(&device).unwrap();
        let model_path = save_model(model, &ModelMeta::new(config, names(), 1), &dir.path().join("1")).unwrap();

        let image_path = dir.path().join("leaf.png");
        ImageBuffer::from_pixel(40, 40, Rgb([30u8, 160, 40])).save(&image_path).unwrap();

        let predictor = Predictor::<TestBackend>::load(&model_path, device).unwrap();
        let result = predictor.predict_file(&image_path).unwrap();

        assert_eq!(result.probabilities.len(), 3);
        let total: f32 = result.probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(names().contains(&result.class_name));
    }

    #[test]
    fn test_predict_missing_file() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        let config = PlantClassifierConfig::new(3)
            .with_image_size(16)
            .with_conv_channels(vec![4]);
        let model = config.init::<TestBackend>(&device).unwrap();
        let predictor = Predictor::new(model, ModelMeta::new(config, names(), 1), device);

        let err = predictor.predict_file(&dir.path().join("missing.jpg")).unwrap_err();
        assert!(matches!(err, PlantDiseaseError::ImageLoad(_, _)));
    }
}
