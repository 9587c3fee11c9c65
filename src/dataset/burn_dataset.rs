//! Burn batching for leaf images
//!
//! Sample batches from the loader are decoded into [`LeafItem`]s (resized,
//! still 8-bit) and turned into tensors by one of two batchers:
//!
//! - [`LeafBatcher`]: preprocessing only (validation, test, inference)
//! - [`AugmentingBatcher`]: seeded random flips and rotation (training)

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;
use image::{DynamicImage, ImageReader};
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::dataset::augmentation::{AugmentationConfig, Augmenter};
use crate::dataset::loader::SampleBatch;
use crate::utils::error::{PlantDiseaseError, Result};

/// A decoded image resized to the model's input size
#[derive(Clone)]
pub struct LeafItem {
    pub image: DynamicImage,
    pub label: usize,
    pub path: PathBuf,
}

impl LeafItem {
    /// Decode `path` and resize to `image_size` x `image_size`
    pub fn from_path(path: &PathBuf, label: usize, image_size: u32) -> Result<Self> {
        let image = ImageReader::open(path)
            .map_err(|e| PlantDiseaseError::ImageLoad(path.clone(), e.to_string()))?
            .with_guessed_format()
            .map_err(|e| PlantDiseaseError::ImageLoad(path.clone(), e.to_string()))?
            .decode()
            .map_err(|e| PlantDiseaseError::ImageLoad(path.clone(), e.to_string()))?;

        let image = Augmenter::no_augmentation(image_size).resize(DynamicImage::ImageRgb8(image.to_rgb8()));

        Ok(Self {
            image,
            label,
            path: path.clone(),
        })
    }
}

impl std::fmt::Debug for LeafItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafItem")
            .field("label", &self.label)
            .field("path", &self.path)
            .field("image_size", &format!("{}x{}", self.image.width(), self.image.height()))
            .finish()
    }
}

/// Decode one sample batch in parallel, keeping sample order
pub fn decode_batch(batch: &SampleBatch, image_size: u32) -> Result<Vec<LeafItem>> {
    batch
        .par_iter()
        .map(|sample| LeafItem::from_path(&sample.path, sample.label, image_size))
        .collect()
}

/// Decode a sequence of sample batches, showing a progress bar
///
/// The first unreadable image aborts the whole load.
pub fn preload_batches(batches: &[SampleBatch], image_size: u32, label: &str) -> Result<Vec<Vec<LeafItem>>> {
    let total: usize = batches.iter().map(|b| b.len()).sum();
    tracing::info!("Pre-loading {} {} images ({} batches)", total, label, batches.len());

    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(label.to_string());

    let mut decoded = Vec::with_capacity(batches.len());
    for batch in batches {
        decoded.push(decode_batch(batch, image_size)?);
        pb.inc(batch.len() as u64);
    }

    pb.finish_and_clear();
    Ok(decoded)
}

/// Images `[batch, 3, height, width]` in [0, 1] and class indices `[batch]`
#[derive(Clone, Debug)]
pub struct ClassificationBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> ClassificationBatch<B> {
    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn to_batch<B: Backend>(
    images_data: Vec<f32>,
    targets_data: Vec<i64>,
    image_size: usize,
    device: &B::Device,
) -> ClassificationBatch<B> {
    let batch_size = targets_data.len();

    let images = Tensor::<B, 4>::from_floats(
        TensorData::new(images_data, [batch_size, 3, image_size, image_size]),
        device,
    );
    let targets = Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

    ClassificationBatch { images, targets }
}

/// Batcher without augmentation
#[derive(Clone, Debug)]
pub struct LeafBatcher {
    augmenter: Augmenter,
}

impl LeafBatcher {
    pub fn new(image_size: usize) -> Self {
        Self {
            augmenter: Augmenter::no_augmentation(image_size as u32),
        }
    }
}

impl<B: Backend> Batcher<B, LeafItem, ClassificationBatch<B>> for LeafBatcher {
    fn batch(&self, items: Vec<LeafItem>, device: &B::Device) -> ClassificationBatch<B> {
        let image_size = self.augmenter.image_size() as usize;
        let mut images_data = Vec::with_capacity(items.len() * 3 * image_size * image_size);
        let mut targets_data = Vec::with_capacity(items.len());

        for item in items {
            images_data.extend(self.augmenter.preprocess(item.image, None));
            targets_data.push(item.label as i64);
        }

        to_batch(images_data, targets_data, image_size, device)
    }
}

/// Batcher that randomly flips and rotates every image
///
/// Each call draws a fresh RNG from `seed` and an internal counter, so the
/// sequence of augmentations is reproducible for a given seed and call order.
#[derive(Debug)]
pub struct AugmentingBatcher {
    augmenter: Augmenter,
    seed: u64,
    calls: AtomicU64,
}

impl Clone for AugmentingBatcher {
    fn clone(&self) -> Self {
        Self {
            augmenter: self.augmenter.clone(),
            seed: self.seed,
            calls: AtomicU64::new(self.calls.load(Ordering::Relaxed)),
        }
    }
}

impl AugmentingBatcher {
    pub fn new(config: AugmentationConfig, image_size: usize, seed: u64) -> Self {
        Self {
            augmenter: Augmenter::new(config, image_size as u32),
            seed,
            calls: AtomicU64::new(0),
        }
    }

    fn next_rng(&self) -> ChaCha8Rng {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(call.wrapping_mul(0x9E37_79B9_7F4A_7C15)))
    }
}

impl<B: Backend> Batcher<B, LeafItem, ClassificationBatch<B>> for AugmentingBatcher {
    fn batch(&self, items: Vec<LeafItem>, device: &B::Device) -> ClassificationBatch<B> {
        let image_size = self.augmenter.image_size() as usize;
        let mut images_data = Vec::with_capacity(items.len() * 3 * image_size * image_size);
        let mut targets_data = Vec::with_capacity(items.len());

        let mut rng = self.next_rng();
        for item in items {
            images_data.extend(self.augmenter.preprocess(item.image, Some(&mut rng)));
            targets_data.push(item.label as i64);
        }

        to_batch(images_data, targets_data, image_size, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::loader::ImageSample;
    use burn::tensor::ElementConversion;
    use burn_ndarray::NdArray;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn write_image(dir: &std::path::Path, name: &str, color: [u8; 3]) -> PathBuf {
        let path = dir.join(name);
        ImageBuffer::from_pixel(12, 10, Rgb(color)).save(&path).unwrap();
        path
    }

    fn sample_batch(dir: &TempDir) -> SampleBatch {
        vec![
            ImageSample {
                path: write_image(dir.path(), "a.png", [255, 0, 0]),
                label: 0,
            },
            ImageSample {
                path: write_image(dir.path(), "b.png", [0, 255, 0]),
                label: 2,
            },
        ]
    }

    #[test]
    fn test_decode_batch_resizes_in_order() {
        let dir = TempDir::new().unwrap();
        let items = decode_batch(&sample_batch(&dir), 8).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, 0);
        assert_eq!(items[1].label, 2);
        assert_eq!((items[0].image.width(), items[0].image.height()), (8, 8));
    }

    #[test]
    fn test_corrupt_image_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let batch = vec![ImageSample { path, label: 0 }];
        let err = decode_batch(&batch, 8).unwrap_err();
        assert!(matches!(err, PlantDiseaseError::ImageLoad(_, _)));
    }

    #[test]
    fn test_leaf_batcher_shapes() {
        let dir = TempDir::new().unwrap();
        let items = decode_batch(&sample_batch(&dir), 8).unwrap();
        let device = Default::default();

        let batch: ClassificationBatch<TestBackend> = LeafBatcher::new(8).batch(items, &device);

        assert_eq!(batch.images.dims(), [2, 3, 8, 8]);
        assert_eq!(batch.targets.dims(), [2]);
        assert_eq!(batch.len(), 2);

        let targets: Vec<i64> = batch.targets.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(targets, vec![0, 2]);

        let max = batch.images.max().into_scalar().elem::<f32>();
        assert!(max <= 1.0);
    }

    #[test]
    fn test_augmenting_batcher_is_reproducible() {
        let dir = TempDir::new().unwrap();
        let items = decode_batch(&sample_batch(&dir), 8).unwrap();
        let device = Default::default();

        let first = AugmentingBatcher::new(AugmentationConfig::default(), 8, 42);
        let second = AugmentingBatcher::new(AugmentationConfig::default(), 8, 42);

        let a: ClassificationBatch<TestBackend> = first.batch(items.clone(), &device);
        let b: ClassificationBatch<TestBackend> = second.batch(items, &device);

        assert_eq!(a.images.dims(), [2, 3, 8, 8]);
        let a: Vec<f32> = a.images.into_data().to_vec().unwrap();
        let b: Vec<f32> = b.images.into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }
}
