//! The classification subgraph node
//!
//! `ImageClassifierGraph` crops the frame to the requested region, runs a
//! caller-supplied [`ClassificationModel`] and post-processes its scores with
//! the classifier options. Model execution itself lives behind the trait.

use crate::containers::ClassificationResult;
use crate::graph::{CLASSIFICATION_RESULT_TAG, IMAGE_TAG, NORM_RECT_TAG, SUBGRAPH_TYPE_NAME};
use crate::graph_options::ImageClassifierGraphOptions;
use crate::postprocessing::{postprocess_head, ClassificationHead};
use image::DynamicImage;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info};
use vision_task_core::{
    Calculator, CalculatorContext, CalculatorRegistry, Image, NormalizedRect, Packet, TaskError,
    TaskErrorCode,
};

/// A loaded image classification model
pub trait ClassificationModel: Send {
    /// Label maps, one per output head
    fn heads(&self) -> &[ClassificationHead];

    /// Scores per head for one (already cropped) image
    fn classify(&mut self, image: &DynamicImage) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Loads a model for a graph instance from its options
pub type ModelFactory = Arc<
    dyn Fn(&ImageClassifierGraphOptions) -> anyhow::Result<Box<dyn ClassificationModel>>
        + Send
        + Sync,
>;

pub struct ImageClassifierGraph {
    options: ImageClassifierGraphOptions,
    model: Box<dyn ClassificationModel>,
}

impl ImageClassifierGraph {
    pub fn new(options: ImageClassifierGraphOptions, model: Box<dyn ClassificationModel>) -> Self {
        Self { options, model }
    }
}

impl Calculator for ImageClassifierGraph {
    fn name(&self) -> &str {
        SUBGRAPH_TYPE_NAME
    }

    fn process(&mut self, cx: &mut CalculatorContext<'_>) -> Result<(), TaskError> {
        let image = cx.input_value::<Image>(IMAGE_TAG)?;
        let norm_rect = cx.input(NORM_RECT_TAG);
        let roi = if norm_rect.is_empty() {
            NormalizedRect::full_image()
        } else {
            *norm_rect.get::<NormalizedRect>()?
        };

        let pixels = image.as_dynamic().ok_or_else(|| {
            TaskError::invalid_argument(
                TaskErrorCode::RunnerUnexpectedInputError,
                "ImageClassifierGraph only accepts CPU images.",
            )
        })?;
        if !roi.is_normalized() {
            return Err(TaskError::invalid_argument(
                TaskErrorCode::InvalidArgumentError,
                format!("Region of interest is not normalized: {roi:?}"),
            ));
        }
        if roi.rotation != 0.0 {
            return Err(TaskError::invalid_argument(
                TaskErrorCode::InvalidArgumentError,
                "Region of interest rotation is not supported.",
            ));
        }

        let cropped = crop_to_region(pixels, &roi);
        let scores = self
            .model
            .classify(&cropped)
            .map_err(|e| TaskError::EngineFailure(format!("Inference failed: {e:#}")))?;

        let heads = self.model.heads();
        if scores.len() != heads.len() {
            return Err(TaskError::EngineFailure(format!(
                "Model returned {} heads, label map has {}",
                scores.len(),
                heads.len()
            )));
        }

        let mut classifications = Vec::with_capacity(heads.len());
        for (head_index, (head, head_scores)) in heads.iter().zip(&scores).enumerate() {
            classifications.push(postprocess_head(
                head_index,
                head,
                head_scores,
                &self.options.classifier_options,
            )?);
        }

        let timestamp_ms = self
            .options
            .base_options
            .use_stream_mode
            .then(|| cx.timestamp().to_millis());
        debug!(
            "Classified {}x{} region at {}",
            cropped.width(),
            cropped.height(),
            cx.timestamp()
        );

        let result = ClassificationResult {
            classifications,
            timestamp_ms,
        };
        let passthrough = cx.input(IMAGE_TAG);
        cx.output(CLASSIFICATION_RESULT_TAG, Packet::new(result));
        cx.output(IMAGE_TAG, passthrough);
        Ok(())
    }
}

/// Crop to the region; the full frame is borrowed as-is
fn crop_to_region<'a>(image: &'a DynamicImage, roi: &NormalizedRect) -> Cow<'a, DynamicImage> {
    let (x, y, width, height) = roi.to_pixel_crop(image.width(), image.height());
    if (x, y, width, height) == (0, 0, image.width(), image.height()) {
        Cow::Borrowed(image)
    } else {
        Cow::Owned(image.crop_imm(x, y, width, height))
    }
}

/// Register `ImageClassifierGraph` so graphs built by this crate resolve,
/// loading a model from `model_factory` for every graph instance
pub fn register_image_classifier_graph(
    registry: &mut CalculatorRegistry,
    model_factory: ModelFactory,
) {
    registry.register_fn(SUBGRAPH_TYPE_NAME, move |node| {
        let options = ImageClassifierGraphOptions::from_node_options(&node.options)?;
        options.classifier_options.validate()?;
        let model = model_factory(&options)
            .map_err(|e| TaskError::EngineFailure(format!("Failed to load model: {e:#}")))?;
        info!(
            "Loaded classification model with {} head(s)",
            model.heads().len()
        );
        Ok(Box::new(ImageClassifierGraph::new(options, model)))
    });
}
