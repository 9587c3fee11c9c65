//! Saving and loading trained classifiers
//!
//! A checkpoint is two files side by side:
//!
//! ```text
//! ../models/1.mpk          weights (CompactRecorder)
//! ../models/1.config.json  architecture + class names
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::backend::Backend;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::cnn::{PlantClassifier, PlantClassifierConfig};
use crate::utils::error::{PlantDiseaseError, Result};

/// Sidecar written next to the weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMeta {
    pub model: PlantClassifierConfig,
    /// Index `i` names output `i`
    pub class_names: Vec<String>,
    pub epochs: usize,
    pub saved_at: String,
}

impl ModelMeta {
    pub fn new(model: PlantClassifierConfig, class_names: Vec<String>, epochs: usize) -> Self {
        Self {
            model,
            class_names,
            epochs,
            saved_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// `<dir>/<stem>.config.json` for a model path with or without the `.mpk` extension
pub fn meta_path_for(model_path: &Path) -> PathBuf {
    let base = strip_recorder_extension(model_path);
    let stem = base
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    base.with_file_name(format!("{stem}.config.json"))
}

fn strip_recorder_extension(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == "mpk" => path.with_extension(""),
        _ => path.to_path_buf(),
    }
}

/// Write weights and sidecar
pub fn save_model<B: Backend>(model: PlantClassifier<B>, meta: &ModelMeta, model_path: &Path) -> Result<PathBuf> {
    let model_path = strip_recorder_extension(model_path);
    if let Some(parent) = model_path.parent() {
        fs::create_dir_all(parent)?;
    }

    model
        .save_file(&model_path, &CompactRecorder::new())
        .map_err(|e| PlantDiseaseError::Model(format!("Failed to save model to {}: {e:?}", model_path.display())))?;

    let meta_path = meta_path_for(&model_path);
    fs::write(&meta_path, serde_json::to_string_pretty(meta)?)?;

    info!("Saved model to {:?} (config {:?})", model_path, meta_path);
    Ok(model_path)
}

/// Read the sidecar for `model_path`
pub fn load_meta(model_path: &Path) -> Result<ModelMeta> {
    let meta_path = meta_path_for(model_path);
    if !meta_path.exists() {
        return Err(PlantDiseaseError::PathNotFound(meta_path));
    }
    let content = fs::read_to_string(&meta_path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Rebuild the architecture from the sidecar and load the weights into it
pub fn load_model<B: Backend>(model_path: &Path, device: &B::Device) -> Result<(PlantClassifier<B>, ModelMeta)> {
    let meta = load_meta(model_path)?;
    let model_path = strip_recorder_extension(model_path);

    let model = meta
        .model
        .init::<B>(device)?
        .load_file(&model_path, &CompactRecorder::new(), device)
        .map_err(|e| PlantDiseaseError::Model(format!("Failed to load model from {}: {e:?}", model_path.display())))?;

    if meta.class_names.len() != meta.model.num_classes {
        return Err(PlantDiseaseError::Model(format!(
            "sidecar lists {} class names for a {}-class model",
            meta.class_names.len(),
            meta.model.num_classes
        )));
    }

    Ok((model, meta))
}
