//! End-to-end tests: YAML config, files on disk, all three running modes

use anyhow::Result;
use image::{Rgb, RgbImage};
use image_classifier::{
    register_image_classifier_graph, ClassificationResult, ImageClassifier,
    ImageClassifierConfig, ResultCallback, ShotTypeModel,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use vision_task_core::{
    CalculatorRegistry, GpuBuffer, Image, RunningMode, TaskError, TaskErrorCode,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn shot_type_registry() -> Arc<CalculatorRegistry> {
    let mut registry = CalculatorRegistry::new();
    register_image_classifier_graph(&mut registry, ShotTypeModel::factory());
    Arc::new(registry)
}

/// Write a flat grey PNG and return its path
fn write_frame(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    RgbImage::from_pixel(48, 32, Rgb([100, 100, 100])).save(&path)?;
    Ok(path)
}

fn load(path: &Path) -> Result<Image> {
    Ok(Image::from(image::open(path)?))
}

#[test]
fn test_single_image_mode_from_disk() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let frame_path = write_frame(dir.path(), "frame.png")?;

    let config = ImageClassifierConfig::from_yaml_str(
        "running_mode: image\nclassifier_options:\n  max_results: 3\n",
    )?;
    let classifier = ImageClassifier::create(config.into_options(shot_type_registry(), None))?;

    let result = classifier.classify(load(&frame_path)?, None)?;
    assert_eq!(result.classifications[0].categories.len(), 3);
    assert_eq!(
        result.top_category().and_then(|c| c.category_name.as_deref()),
        Some("medium")
    );
    assert!(result.timestamp_ms.is_none());

    let gpu = Image::from_gpu_buffer(GpuBuffer {
        texture_id: 42,
        width: 48,
        height: 32,
    });
    let err = classifier.classify(gpu, None).unwrap_err();
    assert!(matches!(err, TaskError::InvalidArgument { .. }));
    assert!(err.to_string().contains("GPU input images are currently not supported"));
    Ok(())
}

#[test]
fn test_video_mode_frame_sequence() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let config = ImageClassifierConfig::from_yaml_str("running_mode: video\n")?;
    let classifier = ImageClassifier::create(config.into_options(shot_type_registry(), None))?;

    for (index, ts) in [0_i64, 40, 80].into_iter().enumerate() {
        let path = write_frame(dir.path(), &format!("frame_{index}.png"))?;
        let result = classifier.classify_for_video(load(&path)?, ts, None)?;
        assert_eq!(result.timestamp_ms, Some(ts));
    }
    Ok(())
}

#[test]
fn test_live_stream_rejects_older_timestamp() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let frame_path = write_frame(dir.path(), "live.png")?;

    let delivered: Arc<Mutex<Vec<(Result<ClassificationResult, TaskError>, i64)>>> =
        Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    let callback: ResultCallback = Arc::new(
        move |result: Result<ClassificationResult, TaskError>, _frame: Image, ts: i64| {
            sink.lock().unwrap().push((result, ts));
        },
    );

    let config = ImageClassifierConfig::from_yaml_str("running_mode: live_stream\n")?;
    assert_eq!(config.running_mode, RunningMode::LiveStream);
    let mut classifier =
        ImageClassifier::create(config.into_options(shot_type_registry(), Some(callback)))?;

    classifier.classify_async(load(&frame_path)?, 100, None)?;
    let err = classifier
        .classify_async(load(&frame_path)?, 50, None)
        .unwrap_err();
    assert_eq!(err.code(), Some(TaskErrorCode::RunnerInvalidTimestampError));
    classifier.close()?;

    let delivered = delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].1, 100);
    assert_eq!(delivered[0].0.as_ref().unwrap().timestamp_ms, Some(100));
    Ok(())
}
