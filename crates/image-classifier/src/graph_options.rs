//! Options message carried by the classifier subgraph node

use crate::options::{ClassifierOptions, Delegate, ImageClassifierOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use vision_task_core::{RunningMode, TaskError};

/// Base options as seen by the graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseOptionsProto {
    pub model_asset_path: Option<PathBuf>,
    pub delegate: Delegate,

    /// Streaming semantics (video and live-stream) vs one-shot
    pub use_stream_mode: bool,
}

/// Options of the `ImageClassifierGraph` node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageClassifierGraphOptions {
    pub base_options: BaseOptionsProto,
    pub classifier_options: ClassifierOptions,
}

impl ImageClassifierGraphOptions {
    pub fn to_node_options(&self) -> serde_json::Value {
        // Plain data with string keys; serialization cannot fail
        serde_json::to_value(self).unwrap_or_default()
    }

    pub fn from_node_options(value: &serde_json::Value) -> Result<Self, TaskError> {
        serde_json::from_value(value.clone()).map_err(|e| {
            TaskError::InvalidGraph(format!("Invalid ImageClassifierGraphOptions: {e}"))
        })
    }
}

/// Map user-facing options to the graph options message
pub fn convert_options_to_graph_options(
    options: &ImageClassifierOptions,
) -> ImageClassifierGraphOptions {
    ImageClassifierGraphOptions {
        base_options: BaseOptionsProto {
            model_asset_path: options.base_options.model_asset_path.clone(),
            delegate: options.base_options.delegate,
            use_stream_mode: options.running_mode != RunningMode::Image,
        },
        classifier_options: options.classifier_options.clone(),
    }
}
