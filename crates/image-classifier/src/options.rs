//! User-facing configuration of the image classifier

use crate::containers::ClassificationResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vision_task_core::{CalculatorRegistry, Image, RunningMode, TaskError, TaskErrorCode};

/// Receives live-stream results on the engine's executor thread: the result
/// (or failure), the classified frame, and its timestamp in milliseconds
pub type ResultCallback =
    Arc<dyn Fn(Result<ClassificationResult, TaskError>, Image, i64) + Send + Sync>;

/// Hardware the model runs on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delegate {
    #[default]
    Cpu,
    Gpu,
}

/// Model and runtime settings shared by all tasks
#[derive(Clone)]
pub struct BaseOptions {
    /// Model file handed to the inference subgraph
    pub model_asset_path: Option<PathBuf>,

    pub delegate: Delegate,

    /// Resolves calculator types, including the inference subgraph
    pub op_resolver: Arc<CalculatorRegistry>,
}

impl Default for BaseOptions {
    fn default() -> Self {
        Self {
            model_asset_path: None,
            delegate: Delegate::Cpu,
            op_resolver: Arc::new(CalculatorRegistry::new()),
        }
    }
}

impl std::fmt::Debug for BaseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseOptions")
            .field("model_asset_path", &self.model_asset_path)
            .field("delegate", &self.delegate)
            .field("op_resolver", &self.op_resolver)
            .finish()
    }
}

/// Post-processing applied to model scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierOptions {
    /// Locale used to pick display names from the label map
    pub display_names_locale: String,

    /// Maximum categories per head; negative keeps all
    pub max_results: i32,

    /// Categories scoring below this are dropped
    pub score_threshold: Option<f32>,

    /// Only these category names are kept. Exclusive with the denylist.
    pub category_allowlist: Vec<String>,

    /// These category names are dropped. Exclusive with the allowlist.
    pub category_denylist: Vec<String>,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            display_names_locale: "en".to_string(),
            max_results: -1,
            score_threshold: None,
            category_allowlist: Vec::new(),
            category_denylist: Vec::new(),
        }
    }
}

impl ClassifierOptions {
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.max_results == 0 {
            return Err(TaskError::invalid_argument(
                TaskErrorCode::InvalidArgumentError,
                "Invalid `max_results` option: value must be != 0.",
            ));
        }
        if !self.category_allowlist.is_empty() && !self.category_denylist.is_empty() {
            return Err(TaskError::invalid_argument(
                TaskErrorCode::InvalidArgumentError,
                "`category_allowlist` and `category_denylist` are mutually exclusive options.",
            ));
        }
        if self.score_threshold.is_some_and(|t| !t.is_finite()) {
            return Err(TaskError::invalid_argument(
                TaskErrorCode::InvalidArgumentError,
                "Invalid `score_threshold` option: value must be finite.",
            ));
        }
        Ok(())
    }
}

/// Everything needed to create an [`ImageClassifier`](crate::ImageClassifier)
#[derive(Clone, Default)]
pub struct ImageClassifierOptions {
    pub base_options: BaseOptions,

    pub classifier_options: ClassifierOptions,

    pub running_mode: RunningMode,

    /// Required in live-stream mode, forbidden otherwise
    pub result_callback: Option<ResultCallback>,
}

impl std::fmt::Debug for ImageClassifierOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageClassifierOptions")
            .field("base_options", &self.base_options)
            .field("classifier_options", &self.classifier_options)
            .field("running_mode", &self.running_mode)
            .field("result_callback", &self.result_callback.is_some())
            .finish()
    }
}

/// Serializable subset of [`BaseOptions`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseOptionsConfig {
    pub model_asset_path: Option<PathBuf>,
    pub delegate: Delegate,
}

/// Classifier configuration loaded from YAML.
///
/// Holds everything but the calculator registry and callback, which are
/// supplied in code by [`ImageClassifierConfig::into_options`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageClassifierConfig {
    pub running_mode: RunningMode,
    pub base_options: BaseOptionsConfig,
    pub classifier_options: ClassifierOptions,
}

impl ImageClassifierConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, TaskError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load classifier configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, TaskError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn into_options(
        self,
        op_resolver: Arc<CalculatorRegistry>,
        result_callback: Option<ResultCallback>,
    ) -> ImageClassifierOptions {
        ImageClassifierOptions {
            base_options: BaseOptions {
                model_asset_path: self.base_options.model_asset_path,
                delegate: self.base_options.delegate,
                op_resolver,
            },
            classifier_options: self.classifier_options,
            running_mode: self.running_mode,
            result_callback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_classifier_options_defaults() {
        let options = ClassifierOptions::default();
        assert_eq!(options.max_results, -1);
        assert_eq!(options.display_names_locale, "en");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_max_results_rejected() {
        let options = ClassifierOptions {
            max_results: 0,
            ..Default::default()
        };
        let err = options.validate().unwrap_err();
        assert_eq!(err.code(), Some(TaskErrorCode::InvalidArgumentError));
    }

    #[test]
    fn test_allowlist_and_denylist_exclusive() {
        let options = ClassifierOptions {
            category_allowlist: vec!["wide".to_string()],
            category_denylist: vec!["aerial".to_string()],
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let options = ClassifierOptions {
            score_threshold: Some(f32::NAN),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_config_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "running_mode: live_stream\n\
             base_options:\n  model_asset_path: models/shot_type.bin\n  delegate: cpu\n\
             classifier_options:\n  max_results: 3\n  score_threshold: 0.1"
        )
        .unwrap();

        let config = ImageClassifierConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.running_mode, RunningMode::LiveStream);
        assert_eq!(
            config.base_options.model_asset_path,
            Some(PathBuf::from("models/shot_type.bin"))
        );
        assert_eq!(config.classifier_options.max_results, 3);
        assert_eq!(config.classifier_options.score_threshold, Some(0.1));
        assert_eq!(config.classifier_options.display_names_locale, "en");

        let options = config.into_options(Arc::new(CalculatorRegistry::new()), None);
        assert_eq!(options.running_mode, RunningMode::LiveStream);
        assert!(options.result_callback.is_none());
    }

    #[test]
    fn test_config_empty_yaml_uses_defaults() {
        let config = ImageClassifierConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, ImageClassifierConfig::default());
    }

    #[test]
    fn test_config_missing_file() {
        let err = ImageClassifierConfig::from_yaml_file("/nonexistent/classifier.yaml").unwrap_err();
        assert!(matches!(err, TaskError::Io(_)));
    }
}
