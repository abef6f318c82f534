//! Turning raw per-class scores into filtered, sorted categories

use crate::containers::{Category, Classifications};
use crate::options::ClassifierOptions;
use std::collections::HashMap;
use vision_task_core::TaskError;

/// Label map of one classification head
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationHead {
    pub name: Option<String>,

    /// Class names by score index; may be empty for unlabeled models
    pub labels: Vec<String>,

    /// Localized class names, keyed by locale
    pub display_names: HashMap<String, Vec<String>>,
}

/// Apply `options` to one head's scores
pub fn postprocess_head(
    head_index: usize,
    head: &ClassificationHead,
    scores: &[f32],
    options: &ClassifierOptions,
) -> Result<Classifications, TaskError> {
    if !head.labels.is_empty() && head.labels.len() != scores.len() {
        return Err(TaskError::EngineFailure(format!(
            "Head {head_index} produced {} scores for {} labels",
            scores.len(),
            head.labels.len()
        )));
    }
    let uses_name_filter =
        !options.category_allowlist.is_empty() || !options.category_denylist.is_empty();
    if head.labels.is_empty() && uses_name_filter {
        return Err(TaskError::EngineFailure(
            "Category allowlist/denylist requires a model with labels".to_string(),
        ));
    }

    let display_names = head.display_names.get(&options.display_names_locale);

    let mut categories = Vec::with_capacity(scores.len());
    for (index, &score) in scores.iter().enumerate() {
        if options.score_threshold.is_some_and(|t| score < t) {
            continue;
        }
        let category_name = head.labels.get(index).cloned();
        if let Some(name) = &category_name {
            if !options.category_allowlist.is_empty() && !options.category_allowlist.contains(name)
            {
                continue;
            }
            if options.category_denylist.contains(name) {
                continue;
            }
        }
        categories.push(Category {
            index,
            score,
            category_name,
            display_name: display_names.and_then(|names| names.get(index)).cloned(),
        });
    }

    // Stable: equal scores keep label order
    categories.sort_by(|a, b| b.score.total_cmp(&a.score));
    if options.max_results > 0 {
        categories.truncate(options.max_results as usize);
    }

    Ok(Classifications {
        categories,
        head_index,
        head_name: head.name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head() -> ClassificationHead {
        ClassificationHead {
            name: Some("animals".to_string()),
            labels: vec!["cat".to_string(), "dog".to_string(), "bird".to_string()],
            display_names: HashMap::from([(
                "fr".to_string(),
                vec!["chat".to_string(), "chien".to_string(), "oiseau".to_string()],
            )]),
        }
    }

    fn names(classifications: &Classifications) -> Vec<&str> {
        classifications
            .categories
            .iter()
            .filter_map(|c| c.category_name.as_deref())
            .collect()
    }

    #[test]
    fn test_sorted_by_score() {
        let out = postprocess_head(0, &head(), &[0.2, 0.7, 0.1], &ClassifierOptions::default())
            .unwrap();
        assert_eq!(names(&out), vec!["dog", "cat", "bird"]);
        assert_eq!(out.head_name.as_deref(), Some("animals"));
        assert!(out.categories[0].display_name.is_none());
    }

    #[test]
    fn test_max_results_and_threshold() {
        let options = ClassifierOptions {
            max_results: 1,
            ..Default::default()
        };
        let out = postprocess_head(0, &head(), &[0.2, 0.7, 0.1], &options).unwrap();
        assert_eq!(names(&out), vec!["dog"]);

        let options = ClassifierOptions {
            score_threshold: Some(0.15),
            ..Default::default()
        };
        let out = postprocess_head(0, &head(), &[0.2, 0.7, 0.1], &options).unwrap();
        assert_eq!(names(&out), vec!["dog", "cat"]);
    }

    #[test]
    fn test_allowlist_and_denylist() {
        let options = ClassifierOptions {
            category_allowlist: vec!["bird".to_string()],
            ..Default::default()
        };
        let out = postprocess_head(0, &head(), &[0.2, 0.7, 0.1], &options).unwrap();
        assert_eq!(names(&out), vec!["bird"]);

        let options = ClassifierOptions {
            category_denylist: vec!["dog".to_string()],
            ..Default::default()
        };
        let out = postprocess_head(0, &head(), &[0.2, 0.7, 0.1], &options).unwrap();
        assert_eq!(names(&out), vec!["cat", "bird"]);
    }

    #[test]
    fn test_display_names_locale() {
        let options = ClassifierOptions {
            display_names_locale: "fr".to_string(),
            ..Default::default()
        };
        let out = postprocess_head(0, &head(), &[0.9, 0.05, 0.05], &options).unwrap();
        assert_eq!(out.categories[0].display_name.as_deref(), Some("chat"));
    }

    #[test]
    fn test_score_count_mismatch() {
        assert!(postprocess_head(0, &head(), &[0.5], &ClassifierOptions::default()).is_err());
    }

    #[test]
    fn test_unlabeled_head() {
        let out = postprocess_head(
            2,
            &ClassificationHead::default(),
            &[0.1, 0.9],
            &ClassifierOptions::default(),
        )
        .unwrap();
        assert_eq!(out.head_index, 2);
        assert_eq!(out.categories[0].index, 1);
        assert!(out.categories[0].category_name.is_none());
    }
}
