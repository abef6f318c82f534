//! Classify command - run files through the classifier in the chosen mode

use anyhow::{Context as _, Result};
use clap::Args;
use image_classifier::{
    register_image_classifier_graph, ClassificationResult, ImageClassifier,
    ImageClassifierConfig, ResultCallback, ShotTypeModel,
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};
use vision_task_core::{CalculatorRegistry, Image, RunningMode, TaskError};

#[derive(Args)]
pub struct ClassifyCommand {
    /// Image files; in video and live-stream modes, consecutive frames
    #[arg(value_name = "FILE", required = true)]
    inputs: Vec<PathBuf>,

    /// Classifier configuration (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Running mode (image, video or live-stream); overrides the config file
    #[arg(short, long)]
    mode: Option<RunningMode>,

    /// Frame rate used to timestamp frames in video and live-stream modes
    #[arg(long, default_value = "30.0")]
    fps: f64,

    /// Maximum categories reported per head
    #[arg(long)]
    max_results: Option<i32>,

    /// Drop categories scoring below this
    #[arg(long)]
    score_threshold: Option<f32>,

    /// Print results as JSON lines
    #[arg(long, default_value = "false")]
    json: bool,
}

/// One classified file, as printed
#[derive(Serialize)]
struct Record<'a> {
    path: &'a Path,
    #[serde(flatten)]
    result: &'a ClassificationResult,
}

/// What the live-stream callback received
type Delivered = Arc<Mutex<Vec<(i64, Result<ClassificationResult, TaskError>)>>>;

impl ClassifyCommand {
    pub fn execute(self) -> Result<()> {
        let start = Instant::now();

        if !self.fps.is_finite() || self.fps <= 0.0 {
            anyhow::bail!("--fps must be a positive number, got {}", self.fps);
        }

        let mut config = match &self.config {
            Some(path) => ImageClassifierConfig::from_yaml_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => ImageClassifierConfig::default(),
        };
        if let Some(mode) = self.mode {
            config.running_mode = mode;
        }
        if let Some(max_results) = self.max_results {
            config.classifier_options.max_results = max_results;
        }
        if let Some(threshold) = self.score_threshold {
            config.classifier_options.score_threshold = Some(threshold);
        }
        let running_mode = config.running_mode;

        let mut registry = CalculatorRegistry::new();
        register_image_classifier_graph(&mut registry, ShotTypeModel::factory());

        let delivered: Delivered = Arc::new(Mutex::new(Vec::new()));
        let callback = (running_mode == RunningMode::LiveStream).then(|| {
            let sink = Arc::clone(&delivered);
            let callback: ResultCallback = Arc::new(
                move |result: Result<ClassificationResult, TaskError>, _frame: Image, ts: i64| {
                    if let Ok(mut sink) = sink.lock() {
                        sink.push((ts, result));
                    }
                },
            );
            callback
        });

        let options = config.into_options(Arc::new(registry), callback);
        let mut classifier =
            ImageClassifier::create(options).context("Failed to create image classifier")?;
        info!(
            "Classifying {} file(s) in {} mode",
            self.inputs.len(),
            running_mode
        );

        let timestamps = frame_timestamps_ms(self.fps, self.inputs.len());
        let mut frame_paths: HashMap<i64, &Path> = HashMap::with_capacity(self.inputs.len());
        for (path, timestamp_ms) in self.inputs.iter().zip(timestamps) {
            let frame = load_frame(path)?;

            match running_mode {
                RunningMode::Image => {
                    let result = classifier
                        .classify(frame, None)
                        .with_context(|| format!("Failed to classify {}", path.display()))?;
                    self.print(path, &result)?;
                }
                RunningMode::Video => {
                    let result = classifier
                        .classify_for_video(frame, timestamp_ms, None)
                        .with_context(|| format!("Failed to classify {}", path.display()))?;
                    self.print(path, &result)?;
                }
                RunningMode::LiveStream => {
                    classifier
                        .classify_async(frame, timestamp_ms, None)
                        .with_context(|| format!("Failed to submit {}", path.display()))?;
                    frame_paths.insert(timestamp_ms, path);
                }
            }
        }

        classifier.close().context("Failed to close image classifier")?;

        if running_mode == RunningMode::LiveStream {
            let delivered = std::mem::take(
                &mut *delivered
                    .lock()
                    .map_err(|_| anyhow::anyhow!("Result collector lock poisoned"))?,
            );
            let completed = completed_frames(&delivered);
            for (ts, result) in delivered {
                match result {
                    Ok(result) => {
                        let path = frame_paths.get(&ts).copied().unwrap_or(Path::new("?"));
                        self.print(path, &result)?;
                    }
                    Err(e) => warn!("Frame failed: {}", e),
                }
            }
            info!(
                "Live stream: {} submitted, {} completed, {} dropped",
                frame_paths.len(),
                completed,
                frame_paths.len().saturating_sub(completed)
            );
        }

        info!("Completed in {:.3}s", start.elapsed().as_secs_f64());
        Ok(())
    }

    fn print(&self, path: &Path, result: &ClassificationResult) -> Result<()> {
        if self.json {
            let line = serde_json::to_string(&Record { path, result })
                .context("Failed to serialize result")?;
            println!("{line}");
            return Ok(());
        }

        match result.timestamp_ms {
            Some(ts) => println!("{} @ {}ms", path.display(), ts),
            None => println!("{}", path.display()),
        }
        for head in &result.classifications {
            let head_name = head.head_name.as_deref().unwrap_or("head");
            for category in &head.categories {
                let label = category
                    .display_name
                    .as_deref()
                    .or(category.category_name.as_deref())
                    .map_or_else(|| format!("#{}", category.index), str::to_string);
                println!("  {head_name}: {label:<20} {:.3}", category.score);
            }
        }
        Ok(())
    }
}

/// Millisecond timestamps for `count` frames at `fps`, strictly increasing
/// even when frames are closer together than a millisecond
fn frame_timestamps_ms(fps: f64, count: usize) -> Vec<i64> {
    let mut timestamps: Vec<i64> = Vec::with_capacity(count);
    for index in 0..count {
        let nominal = (index as f64 * 1000.0 / fps).round() as i64;
        let ts = match timestamps.last() {
            Some(&previous) => nominal.max(previous + 1),
            None => nominal,
        };
        timestamps.push(ts);
    }
    timestamps
}

/// Deliveries that carried a result; failed frames are not completed
fn completed_frames(delivered: &[(i64, Result<ClassificationResult, TaskError>)]) -> usize {
    delivered.iter().filter(|(_, result)| result.is_ok()).count()
}

fn load_frame(path: &Path) -> Result<Image> {
    let decoded =
        image::open(path).with_context(|| format!("Failed to open image: {}", path.display()))?;
    Ok(Image::from(decoded))
}
