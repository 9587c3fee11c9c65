//! Image folder loader
//!
//! Scans a directory laid out as one subdirectory per class and produces the
//! class-name table plus a positional batch sequence. Decoding is deferred
//! until a batch is materialised (see `burn_dataset`).

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::utils::error::{PlantDiseaseError, Result};

/// File extensions treated as images (compared lowercase)
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// A single image on disk with its label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSample {
    pub path: PathBuf,
    /// Index into the class-name table
    pub label: usize,
}

/// A fixed-size group of samples, decoded on demand
pub type SampleBatch = Vec<ImageSample>;

/// Labeled image collection read from `<root>/<class-name>/<image>`
///
/// ```text
/// PlantVillage/
/// ├── Potato___Early_blight/
/// │   ├── 0a1b.jpg
/// │   └── ...
/// ├── Potato___Late_blight/
/// └── Potato___healthy/
/// ```
#[derive(Debug, Clone)]
pub struct ImageFolder {
    root_dir: PathBuf,
    class_names: Vec<String>,
    samples: Vec<ImageSample>,
}

impl ImageFolder {
    /// Scan `root_dir`. Class names are the subdirectory names sorted
    /// lexicographically; label `i` is `class_names()[i]`.
    pub fn open<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Loading image folder from: {:?}", root_dir);

        if !root_dir.is_dir() {
            return Err(PlantDiseaseError::PathNotFound(root_dir));
        }

        let mut class_names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    class_names.push(name.to_string());
                }
            }
        }
        class_names.sort();

        if class_names.is_empty() {
            return Err(PlantDiseaseError::Dataset(format!(
                "no class subdirectories in {}",
                root_dir.display()
            )));
        }

        let mut samples = Vec::new();
        for (label, class_name) in class_names.iter().enumerate() {
            let class_dir = root_dir.join(class_name);

            let mut paths: Vec<PathBuf> = WalkDir::new(&class_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| is_image_file(p))
                .collect();
            // read_dir order is platform dependent
            paths.sort();

            debug!("Class '{}' (label {}): {} images", class_name, label, paths.len());
            samples.extend(paths.into_iter().map(|path| ImageSample { path, label }));
        }

        if samples.is_empty() {
            return Err(PlantDiseaseError::Dataset(format!(
                "no image files found under {}",
                root_dir.display()
            )));
        }

        info!("Found {} images in {} classes", samples.len(), class_names.len());

        Ok(Self {
            root_dir,
            class_names,
            samples,
        })
    }

    /// Ordered class-name table
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn samples(&self) -> &[ImageSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Shuffle the samples in place with a given seed
    pub fn shuffle(&mut self, seed: u64) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.samples.shuffle(&mut rng);
    }

    /// Number of batches of `batch_size` (the last one may be short)
    pub fn num_batches(&self, batch_size: usize) -> usize {
        if batch_size == 0 {
            return 0;
        }
        self.samples.len().div_ceil(batch_size)
    }

    /// Group the current sample order into batches of `batch_size`
    pub fn batches(&self, batch_size: usize) -> Result<Vec<SampleBatch>> {
        if batch_size == 0 {
            return Err(PlantDiseaseError::Config("batch_size must be greater than 0".to_string()));
        }

        Ok(self.samples.chunks(batch_size).map(|chunk| chunk.to_vec()).collect())
    }

    /// Per-class image counts
    pub fn stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            root_dir: self.root_dir.clone(),
            total_samples: self.samples.len(),
            class_names: self.class_names.clone(),
            class_counts,
        }
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Statistics about the dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub root_dir: PathBuf,
    pub total_samples: usize,
    pub class_names: Vec<String>,
    pub class_counts: Vec<usize>,
}

impl DatasetStats {
    /// Print statistics to console
    pub fn print(&self) {
        println!("\n📊 Dataset Statistics ({:?}):", self.root_dir);
        println!("  Total samples: {}", self.total_samples);
        println!("  Number of classes: {}", self.class_names.len());
        println!("\n  Samples per class:");

        for (idx, (name, count)) in self.class_names.iter().zip(&self.class_counts).enumerate() {
            let bar_len = (*count as f32 / self.total_samples.max(1) as f32 * 40.0) as usize;
            println!("    {:3}. {:30} {:5} {}", idx, name, count, "█".repeat(bar_len));
        }
    }
}
