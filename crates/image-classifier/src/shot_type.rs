//! Rule-based camera shot type model
//!
//! Classifies framing (extreme close-up, close-up, medium, wide, aerial) from
//! gradient statistics of the luma channel. No weights are loaded, so the
//! model runs anywhere and gives the classifier a deterministic backend.
//!
//! The winning shot type receives the rule's confidence; the remaining mass is
//! spread evenly over the other labels so each head's scores sum to one.

use crate::calculator::{ClassificationModel, ModelFactory};
use crate::graph_options::ImageClassifierGraphOptions;
use crate::postprocessing::ClassificationHead;
use image::{imageops, DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Camera framing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotType {
    ExtremeCloseup,
    Closeup,
    Medium,
    Wide,
    Aerial,
}

impl ShotType {
    /// Label order of the `shot_type` head
    pub const ALL: [ShotType; 5] = [
        ShotType::ExtremeCloseup,
        ShotType::Closeup,
        ShotType::Medium,
        ShotType::Wide,
        ShotType::Aerial,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ShotType::ExtremeCloseup => "extreme_closeup",
            ShotType::Closeup => "closeup",
            ShotType::Medium => "medium",
            ShotType::Wide => "wide",
            ShotType::Aerial => "aerial",
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            ShotType::ExtremeCloseup => "Extreme close-up",
            ShotType::Closeup => "Close-up",
            ShotType::Medium => "Medium shot",
            ShotType::Wide => "Wide shot",
            ShotType::Aerial => "Aerial",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|&t| t == self).unwrap_or(0)
    }
}

impl std::fmt::Display for ShotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Gradient and intensity statistics of one frame, all in [0, 1]
#[derive(Debug, Clone, Copy, Default)]
struct FrameStats {
    edge_density: f32,
    center_edge_density: f32,
    border_edge_density: f32,
    top_edge_density: f32,
    bottom_edge_density: f32,
    left_right_asymmetry: f32,
    brightness: f32,
    contrast: f32,
}

impl FrameStats {
    fn measure(image: &DynamicImage) -> Self {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        let region = |x: u32, y: u32, w: u32, h: u32| -> f32 {
            edge_density(&imageops::crop_imm(&gray, x, y, w, h).to_image())
        };

        // Middle 30% of each axis
        let (cx, cy) = (width * 35 / 100, height * 35 / 100);
        let center_edge_density = region(cx, cy, width * 65 / 100 - cx, height * 65 / 100 - cy);

        let left = region(0, 0, width / 2, height);
        let right = region(width / 2, 0, width - width / 2, height);
        let (brightness, contrast) = brightness_contrast(&gray);

        Self {
            edge_density: edge_density(&gray),
            center_edge_density,
            border_edge_density: border_edge_density(&gray),
            top_edge_density: region(0, 0, width, height / 3),
            bottom_edge_density: region(0, height * 2 / 3, width, height - height * 2 / 3),
            left_right_asymmetry: (left - right).abs(),
            brightness,
            contrast,
        }
    }

    /// Winning shot type and its confidence
    fn classify(&self) -> (ShotType, f32) {
        // Structured texture from above, evenly spread left to right
        if self.top_edge_density > self.bottom_edge_density * 1.3
            && self.edge_density > 0.15
            && self.left_right_asymmetry < 0.05
        {
            return (ShotType::Aerial, 0.75);
        }
        if self.center_edge_density > 0.25 && self.contrast > 0.25 {
            return (ShotType::ExtremeCloseup, 0.80);
        }
        if self.center_edge_density > 0.18 {
            return (ShotType::Closeup, 0.75);
        }
        if self.border_edge_density > self.center_edge_density * 1.2 && self.edge_density > 0.12 {
            return (ShotType::Wide, 0.70);
        }
        if self.center_edge_density > 0.10 && self.edge_density > 0.10 {
            return (ShotType::Medium, 0.65);
        }
        (ShotType::Medium, 0.50)
    }
}

/// Mean gradient magnitude, normalized to [0, 1]
fn edge_density(gray: &GrayImage) -> f32 {
    let (width, height) = gray.dimensions();
    if width < 2 || height < 2 {
        return 0.0;
    }

    let mut sum = 0.0f32;
    for y in 0..height - 1 {
        for x in 0..width - 1 {
            let p = gray.get_pixel(x, y)[0] as f32;
            let gx = gray.get_pixel(x + 1, y)[0] as f32 - p;
            let gy = gray.get_pixel(x, y + 1)[0] as f32 - p;
            sum += (gx * gx + gy * gy).sqrt();
        }
    }
    sum / ((width - 1) * (height - 1)) as f32 / 255.0
}

/// Area-weighted edge density of the outer 10% frame border
fn border_edge_density(gray: &GrayImage) -> f32 {
    let (width, height) = gray.dimensions();
    let (bw, bh) = (width / 10, height / 10);
    let inner_height = height.saturating_sub(2 * bh);

    let strips = [
        (0, 0, width, bh),
        (0, height - bh, width, bh),
        (0, bh, bw, inner_height),
        (width - bw, bh, bw, inner_height),
    ];

    let mut weighted = 0.0f32;
    let mut area = 0u64;
    for (x, y, w, h) in strips {
        if w == 0 || h == 0 {
            continue;
        }
        let strip = imageops::crop_imm(gray, x, y, w, h).to_image();
        weighted += edge_density(&strip) * (w * h) as f32;
        area += u64::from(w) * u64::from(h);
    }
    if area == 0 {
        0.0
    } else {
        weighted / area as f32
    }
}

/// Mean and standard deviation of luma, normalized to [0, 1]
fn brightness_contrast(gray: &GrayImage) -> (f32, f32) {
    let count = gray.pixels().len();
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = gray.pixels().map(|p| p[0] as f32).sum::<f32>() / count as f32;
    let variance = gray
        .pixels()
        .map(|p| {
            let diff = p[0] as f32 - mean;
            diff * diff
        })
        .sum::<f32>()
        / count as f32;
    (mean / 255.0, variance.sqrt() / 255.0)
}

/// Heuristic shot type classifier with a single `shot_type` head
pub struct ShotTypeModel {
    heads: Vec<ClassificationHead>,
}

impl ShotTypeModel {
    pub const HEAD_NAME: &'static str = "shot_type";

    pub fn new() -> Self {
        let head = ClassificationHead {
            name: Some(Self::HEAD_NAME.to_string()),
            labels: ShotType::ALL.iter().map(|t| t.label().to_string()).collect(),
            display_names: HashMap::from([(
                "en".to_string(),
                ShotType::ALL
                    .iter()
                    .map(|t| t.display_name().to_string())
                    .collect(),
            )]),
        };
        Self { heads: vec![head] }
    }

    /// Factory for [`register_image_classifier_graph`](crate::register_image_classifier_graph)
    pub fn factory() -> ModelFactory {
        Arc::new(|options: &ImageClassifierGraphOptions| {
            if let Some(path) = &options.base_options.model_asset_path {
                info!(
                    "Shot type model is rule-based; ignoring model asset {}",
                    path.display()
                );
            }
            Ok(Box::new(ShotTypeModel::new()) as Box<dyn ClassificationModel>)
        })
    }

    /// Classify one frame directly, without the task engine
    pub fn predict(image: &DynamicImage) -> (ShotType, f32) {
        let stats = FrameStats::measure(image);
        debug!(
            "Frame stats: edge={:.3} center={:.3} border={:.3} brightness={:.3} contrast={:.3}",
            stats.edge_density,
            stats.center_edge_density,
            stats.border_edge_density,
            stats.brightness,
            stats.contrast
        );
        stats.classify()
    }
}

impl Default for ShotTypeModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassificationModel for ShotTypeModel {
    fn heads(&self) -> &[ClassificationHead] {
        &self.heads
    }

    fn classify(&mut self, image: &DynamicImage) -> anyhow::Result<Vec<Vec<f32>>> {
        let (shot_type, confidence) = Self::predict(image);
        let others = ShotType::ALL.len() - 1;
        let share = (1.0 - confidence) / others as f32;

        let mut scores = vec![share; ShotType::ALL.len()];
        scores[shot_type.index()] = confidence;
        Ok(vec![scores])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_in_head_order() {
        let model = ShotTypeModel::new();
        let head = &model.heads()[0];
        assert_eq!(head.name.as_deref(), Some("shot_type"));
        assert_eq!(
            head.labels,
            vec!["extreme_closeup", "closeup", "medium", "wide", "aerial"]
        );
        assert_eq!(head.display_names["en"][1], "Close-up");
        assert_eq!(ShotType::Wide.to_string(), "wide");
    }

    #[test]
    fn test_edge_density_of_gradient() {
        let img = GrayImage::from_fn(100, 100, |x, y| image::Luma([(x + y) as u8]));
        let density = edge_density(&img);
        assert!(density > 0.0);
        assert!(density < 1.0);
    }

    #[test]
    fn test_brightness_contrast() {
        let bright = GrayImage::from_fn(50, 50, |_, _| image::Luma([200]));
        let (brightness, contrast) = brightness_contrast(&bright);
        assert!(brightness > 0.7);
        assert_eq!(contrast, 0.0);

        let dark = GrayImage::from_fn(50, 50, |_, _| image::Luma([50]));
        assert!(brightness_contrast(&dark).0 < 0.3);
    }

    #[test]
    fn test_flat_frame_is_medium() {
        let flat = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            64,
            48,
            image::Rgb([90, 90, 90]),
        ));
        assert_eq!(ShotTypeModel::predict(&flat), (ShotType::Medium, 0.50));
    }

    #[test]
    fn test_busy_center_is_closeup() {
        // Checkerboard in the middle, flat elsewhere
        let img = image::RgbImage::from_fn(100, 100, |x, y| {
            let centered = (30..70).contains(&x) && (30..70).contains(&y);
            if centered && (x + y) % 2 == 0 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        });
        let (shot_type, _) = ShotTypeModel::predict(&DynamicImage::ImageRgb8(img));
        assert!(matches!(
            shot_type,
            ShotType::Closeup | ShotType::ExtremeCloseup
        ));
    }

    #[test]
    fn test_scores_sum_to_one() {
        let mut model = ShotTypeModel::new();
        let flat = DynamicImage::ImageRgb8(image::RgbImage::new(20, 20));
        let scores = model.classify(&flat).unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].len(), 5);
        assert!((scores[0].iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert_eq!(scores[0][ShotType::Medium.index()], 0.50);
    }
}
