//! Image Classifier - classify images, video frames and live camera frames
//!
//! An [`ImageClassifier`] wraps a classification graph running on the
//! vision task engine. The running mode picked at creation decides which
//! entry point is legal:
//!
//! - `Image`: [`ImageClassifier::classify`], blocking, independent images
//! - `Video`: [`ImageClassifier::classify_for_video`], blocking, timestamped frames
//! - `LiveStream`: [`ImageClassifier::classify_async`], results on a callback
//!
//! The model behind the graph is pluggable through [`ClassificationModel`].
//! [`ShotTypeModel`] is a rule-based camera shot classifier that needs no
//! model file.
//!
//! ```no_run
//! use image_classifier::{
//!     register_image_classifier_graph, ImageClassifier, ImageClassifierOptions, ShotTypeModel,
//! };
//! use std::sync::Arc;
//! use vision_task_core::{CalculatorRegistry, Image};
//!
//! let mut registry = CalculatorRegistry::new();
//! register_image_classifier_graph(&mut registry, ShotTypeModel::factory());
//!
//! let mut options = ImageClassifierOptions::default();
//! options.base_options.op_resolver = Arc::new(registry);
//! let classifier = ImageClassifier::create(options)?;
//!
//! let frame = Image::from(image::open("frame.jpg")?);
//! let result = classifier.classify(frame, None)?;
//! println!("{:?}", result.top_category());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod calculator;
pub mod callback;
pub mod classifier;
pub mod containers;
pub mod graph;
pub mod graph_options;
pub mod options;
pub mod postprocessing;
pub mod shot_type;

pub use calculator::{
    register_image_classifier_graph, ClassificationModel, ImageClassifierGraph, ModelFactory,
};
pub use callback::wrap_result_callback;
pub use classifier::ImageClassifier;
pub use containers::{Category, ClassificationResult, Classifications};
pub use graph::{build_full_image_norm_rect, create_graph_config, normalize_region};
pub use graph_options::{convert_options_to_graph_options, ImageClassifierGraphOptions};
pub use options::{
    BaseOptions, BaseOptionsConfig, ClassifierOptions, Delegate, ImageClassifierConfig,
    ImageClassifierOptions, ResultCallback,
};
pub use postprocessing::ClassificationHead;
pub use shot_type::{ShotType, ShotTypeModel};
