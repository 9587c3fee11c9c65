//! End-to-end checks on synthetic leaf folders

use std::fs;
use std::path::Path;

use image::{ImageBuffer, Rgb};
use tempfile::TempDir;

use plant_disease::config::{ConfigOverrides, PipelineConfig};
use plant_disease::dataset::{DatasetSplit, ImageFolder, SplitStrategy, POTATO_CLASSES};
use plant_disease::inference::Predictor;
use plant_disease::backend::DefaultBackend;
use plant_disease::training::{run_pipeline, TrainingHistory};

fn write_leaf(path: &Path, color: [u8; 3]) {
    ImageBuffer::from_pixel(24, 24, Rgb(color)).save(path).unwrap();
}

/// `<root>/<class>/leaf_<i>.png` for each potato class
fn potato_folder(per_class: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (c, class) in POTATO_CLASSES.iter().enumerate() {
        let class_dir = dir.path().join(class);
        fs::create_dir_all(&class_dir).unwrap();
        for i in 0..per_class {
            let shade = (40 * c + 10 * i) as u8;
            write_leaf(&class_dir.join(format!("leaf_{i}.png")), [shade, 180, 60]);
        }
    }
    dir
}

#[test]
fn test_folder_yields_batches_and_class_names() {
    let dir = potato_folder(3);
    let folder = ImageFolder::open(dir.path()).unwrap();

    assert_eq!(folder.class_names(), &POTATO_CLASSES);
    let batches = folder.batches(4).unwrap();
    assert_eq!(batches.len(), 3);
    assert!(batches.iter().all(|b| !b.is_empty()));
}

#[test]
fn test_class_order_is_stable_across_loads() {
    let dir = potato_folder(1);
    let first = ImageFolder::open(dir.path()).unwrap();
    let second = ImageFolder::open(dir.path()).unwrap();

    assert_eq!(first.class_names(), second.class_names());
    assert_eq!(first.samples(), second.samples());
}

#[test]
fn test_split_of_folder_batches() {
    let dir = potato_folder(4);
    let folder = ImageFolder::open(dir.path()).unwrap();
    let batches = folder.batches(1).unwrap();
    assert_eq!(batches.len(), 12);

    let split = DatasetSplit::from_sequence(batches.clone(), &SplitStrategy::default()).unwrap();
    assert_eq!(split.lens(), (10, 1, 1));

    // Too few batches for the legacy 54 / 6 layout: everything lands in train
    let legacy = DatasetSplit::from_sequence(batches, &SplitStrategy::legacy()).unwrap();
    assert_eq!(legacy.lens(), (12, 0, 0));
}

#[test]
fn test_train_evaluate_save_and_infer() {
    let data = potato_folder(2);
    let models = TempDir::new().unwrap();
    let reports = TempDir::new().unwrap();

    let mut config = PipelineConfig::default();
    config.data.data_dir = data.path().to_path_buf();
    config.data.image_size = 190;
    config.data.batch_size = 2;
    config.split = SplitStrategy::FixedCounts {
        train: 1,
        validation: 1,
    };
    config.training.epochs = 1;
    config.output.model_dir = models.path().to_path_buf();
    config.output.report_dir = reports.path().to_path_buf();

    let report = run_pipeline(&config).unwrap();

    assert_eq!(report.class_names.len(), 3);
    assert_eq!(report.split, (1, 1, 1));
    assert_eq!(report.history.len(), 1);
    assert!(report.test.is_some());
    assert!(report.demonstration.is_some());

    assert!(models.path().join("1.mpk").exists());
    assert!(models.path().join("1.config.json").exists());
    assert!(reports.path().join("accuracy.svg").exists());
    assert!(reports.path().join("loss.svg").exists());
    assert!(reports.path().join("samples.png").exists());

    let history = TrainingHistory::load_json(&reports.path().join("history.json")).unwrap();
    assert_eq!(history, report.history);

    let predictor = Predictor::<DefaultBackend>::load(&report.model_path, Default::default()).unwrap();
    let leaf = data.path().join(POTATO_CLASSES[0]).join("leaf_0.png");
    let prediction = predictor.predict_file(&leaf).unwrap();
    assert!(POTATO_CLASSES.contains(&prediction.class_name.as_str()));
}

#[test]
fn test_fraction_split_too_small_fails_before_training() {
    let data = potato_folder(1);
    let mut config = PipelineConfig::default();
    config.data.data_dir = data.path().to_path_buf();
    config.data.batch_size = 1;

    let err = run_pipeline(&config).unwrap_err();
    assert!(matches!(err, plant_disease::PlantDiseaseError::Split(_)));
}

#[test]
fn test_empty_test_split_still_saves_model_and_reports() {
    let data = potato_folder(1);
    let models = TempDir::new().unwrap();
    let reports = TempDir::new().unwrap();

    let mut config = PipelineConfig::default();
    config.data.data_dir = data.path().to_path_buf();
    config.data.image_size = 190;
    config.data.batch_size = 1;
    config.split = SplitStrategy::FixedCounts {
        train: 2,
        validation: 1,
    };
    config.training.epochs = 1;
    config.output.model_dir = models.path().to_path_buf();
    config.output.report_dir = reports.path().to_path_buf();
    config.output.sample_grid = false;

    let report = run_pipeline(&config).unwrap();

    assert_eq!(report.split, (2, 1, 0));
    assert!(report.test.is_none());
    assert!(report.demonstration.is_none());
    assert_eq!(report.history.len(), 1);

    assert!(models.path().join("1.mpk").exists());
    assert!(models.path().join("1.config.json").exists());
    assert!(reports.path().join("history.json").exists());
    assert!(reports.path().join("accuracy.svg").exists());
}

#[test]
fn test_config_file_drives_dataset_scan_without_overrides() {
    let data = potato_folder(3);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("leaves.toml");
    fs::write(
        &path,
        format!("[data]\ndata_dir = {:?}\nbatch_size = 2\n", data.path().display().to_string()),
    )
    .unwrap();

    let config = PipelineConfig::load(&path)
        .unwrap()
        .with_overrides(&ConfigOverrides::default());
    assert_eq!(config.data.data_dir, data.path());
    assert_eq!(config.data.batch_size, 2);

    let folder = ImageFolder::open(&config.data.data_dir).unwrap();
    assert_eq!(folder.batches(config.data.batch_size).unwrap().len(), 5);

    let overridden = config.with_overrides(&ConfigOverrides {
        batch_size: Some(3),
        ..Default::default()
    });
    assert_eq!(folder.batches(overridden.data.batch_size).unwrap().len(), 3);
}
