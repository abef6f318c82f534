//! Classification result containers

use serde::{Deserialize, Serialize};

/// One predicted class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Index of the class in the model's label map
    pub index: usize,

    pub score: f32,

    /// Label from the model's label map, if it has one
    pub category_name: Option<String>,

    /// Localized label, if the model has display names for the locale
    pub display_name: Option<String>,
}

/// Predicted categories for one classification head, sorted by
/// descending score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classifications {
    pub categories: Vec<Category>,
    pub head_index: usize,
    pub head_name: Option<String>,
}

/// Classification output for one image or frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// One entry per classification head, in head order
    pub classifications: Vec<Classifications>,

    /// Timestamp of the input frame, set in video and live-stream modes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<i64>,
}

impl ClassificationResult {
    /// Highest-scoring category of the first head
    pub fn top_category(&self) -> Option<&Category> {
        self.classifications
            .first()
            .and_then(|head| head.categories.first())
    }
}
