//! Preprocessing and train-time augmentation
//!
//! Every image goes through `resize -> rescale to [0, 1] -> CHW`. Training
//! images additionally get a random horizontal flip, a random vertical flip
//! and a random rotation after resizing. Validation and test images are
//! never augmented.

use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageBuffer, Rgb, RgbImage};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::utils::error::{PlantDiseaseError, Result};

/// Train-time augmentation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Flip left-right with probability 0.5
    pub horizontal_flip: bool,
    /// Flip top-bottom with probability 0.5
    pub vertical_flip: bool,
    /// Maximum rotation as a fraction of a full turn (0.2 => ±72°)
    pub rotation_factor: f32,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            horizontal_flip: true,
            vertical_flip: true,
            rotation_factor: 0.2,
        }
    }
}

impl AugmentationConfig {
    /// Identity augmentation
    pub fn none() -> Self {
        Self {
            horizontal_flip: false,
            vertical_flip: false,
            rotation_factor: 0.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        !self.horizontal_flip && !self.vertical_flip && self.rotation_factor == 0.0
    }

    /// Largest rotation in degrees, either direction
    pub fn max_rotation_degrees(&self) -> f32 {
        self.rotation_factor * 360.0
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.rotation_factor) {
            return Err(PlantDiseaseError::Config(format!(
                "rotation_factor must be in [0, 1), got {}",
                self.rotation_factor
            )));
        }
        Ok(())
    }
}

/// Applies preprocessing and, when given an RNG, random augmentation
#[derive(Debug, Clone)]
pub struct Augmenter {
    config: AugmentationConfig,
    image_size: u32,
}

impl Augmenter {
    pub fn new(config: AugmentationConfig, image_size: u32) -> Self {
        Self { config, image_size }
    }

    /// Preprocessing only (validation, test and inference)
    pub fn no_augmentation(image_size: u32) -> Self {
        Self::new(AugmentationConfig::none(), image_size)
    }

    pub fn config(&self) -> &AugmentationConfig {
        &self.config
    }

    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    /// Randomly flip and rotate. Output dimensions equal input dimensions.
    pub fn augment(&self, img: DynamicImage, rng: &mut ChaCha8Rng) -> DynamicImage {
        let mut result = img;

        if self.config.horizontal_flip && rng.gen::<f32>() < 0.5 {
            result = result.fliph();
        }

        if self.config.vertical_flip && rng.gen::<f32>() < 0.5 {
            result = result.flipv();
        }

        if self.config.rotation_factor > 0.0 {
            let max = self.config.max_rotation_degrees();
            let angle = rng.gen_range(-max..=max);
            result = rotate_reflect(&result, angle);
        }

        result
    }

    pub fn resize(&self, img: DynamicImage) -> DynamicImage {
        if img.dimensions() == (self.image_size, self.image_size) {
            return img;
        }
        img.resize_exact(self.image_size, self.image_size, FilterType::Triangle)
    }

    /// CHW float data in [0, 1]
    pub fn to_tensor_data(&self, img: &DynamicImage) -> Vec<f32> {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        let mut data = Vec::with_capacity(3 * height as usize * width as usize);

        for c in 0..3 {
            for y in 0..height {
                for x in 0..width {
                    data.push(rgb.get_pixel(x, y)[c] as f32 / 255.0);
                }
            }
        }

        data
    }

    /// Resize, augment (if `rng` is given), convert
    pub fn preprocess(&self, img: DynamicImage, rng: Option<&mut ChaCha8Rng>) -> Vec<f32> {
        let mut result = self.resize(img);

        if let Some(rng) = rng {
            result = self.augment(result, rng);
        }

        self.to_tensor_data(&result)
    }
}

/// Rotate about the image center, filling uncovered corners by reflecting
/// the image across its edges.
pub fn rotate_reflect(img: &DynamicImage, angle_degrees: f32) -> DynamicImage {
    if angle_degrees.abs() < 0.1 {
        return img.clone();
    }

    let angle_rad = angle_degrees.to_radians();
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let (sin_a, cos_a) = angle_rad.sin_cos();

    let output = ImageBuffer::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;

        let src_x = cx + dx * cos_a + dy * sin_a;
        let src_y = cy - dx * sin_a + dy * cos_a;

        bilinear_sample_reflect(&rgb, src_x, src_y)
    });

    DynamicImage::ImageRgb8(output)
}

/// Map an index onto `0..len` by mirroring: `d c b a | a b c d | d c b a`
fn reflect_index(i: i64, len: u32) -> u32 {
    let len = len as i64;
    let period = 2 * len;
    let m = i.rem_euclid(period);
    if m < len {
        m as u32
    } else {
        (period - 1 - m) as u32
    }
}

fn bilinear_sample_reflect(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = img.dimensions();

    let x0f = x.floor();
    let y0f = y.floor();
    let fx = x - x0f;
    let fy = y - y0f;

    let x0 = x0f as i64;
    let y0 = y0f as i64;
    let (xa, xb) = (reflect_index(x0, width), reflect_index(x0 + 1, width));
    let (ya, yb) = (reflect_index(y0, height), reflect_index(y0 + 1, height));

    let p00 = img.get_pixel(xa, ya);
    let p10 = img.get_pixel(xb, ya);
    let p01 = img.get_pixel(xa, yb);
    let p11 = img.get_pixel(xb, yb);

    let mut result = [0u8; 3];
    for c in 0..3 {
        let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f32 * fx * (1.0 - fy)
            + p01[c] as f32 * (1.0 - fx) * fy
            + p11[c] as f32 * fx * fy;
        result[c] = v.round().clamp(0.0, 255.0) as u8;
    }

    Rgb(result)
}
