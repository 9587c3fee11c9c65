//! Sample grid of the first batch, for eyeballing the data

use std::path::Path;

use image::{imageops, imageops::FilterType, RgbImage};
use tracing::info;

use super::burn_dataset::LeafItem;
use crate::utils::error::{PlantDiseaseError, Result};

pub const GRID_ROWS: u32 = 3;
pub const GRID_COLS: u32 = 4;
const TILE_SIZE: u32 = 128;

/// Tile up to 12 images into a 3 x 4 PNG and log each tile's label.
/// Returns the number of tiles drawn.
pub fn write_sample_grid(items: &[LeafItem], class_names: &[String], path: &Path) -> Result<usize> {
    let capacity = (GRID_ROWS * GRID_COLS) as usize;
    let shown = items.len().min(capacity);
    let mut grid = RgbImage::from_pixel(GRID_COLS * TILE_SIZE, GRID_ROWS * TILE_SIZE, image::Rgb([255, 255, 255]));

    for (idx, item) in items.iter().take(capacity).enumerate() {
        let row = idx as u32 / GRID_COLS;
        let col = idx as u32 % GRID_COLS;
        let tile = imageops::resize(&item.image.to_rgb8(), TILE_SIZE, TILE_SIZE, FilterType::Triangle);
        imageops::replace(&mut grid, &tile, (col * TILE_SIZE) as i64, (row * TILE_SIZE) as i64);

        let name = class_names.get(item.label).map(String::as_str).unwrap_or("?");
        info!("Sample [{}, {}]: {}", row, col, name);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    grid.save(path)
        .map_err(|e| PlantDiseaseError::ImageLoad(path.to_path_buf(), e.to_string()))?;

    info!("Wrote sample grid ({} images) to {:?}", shown, path);
    Ok(shown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn item(label: usize) -> LeafItem {
        LeafItem {
            image: DynamicImage::ImageRgb8(ImageBuffer::from_pixel(32, 32, Rgb([0, 100, 0]))),
            label,
            path: PathBuf::from(format!("{label}.png")),
        }
    }

    #[test]
    fn test_grid_caps_at_twelve() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("samples.png");
        let items: Vec<LeafItem> = (0..15).map(|i| item(i % 3)).collect();
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        assert_eq!(write_sample_grid(&items, &names, &path).unwrap(), 12);

        let grid = image::open(&path).unwrap();
        assert_eq!((grid.width(), grid.height()), (GRID_COLS * TILE_SIZE, GRID_ROWS * TILE_SIZE));
    }

    #[test]
    fn test_partial_grid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("samples.png");
        let names = vec!["a".to_string()];

        assert_eq!(write_sample_grid(&[item(0), item(0)], &names, &path).unwrap(), 2);
    }
}
