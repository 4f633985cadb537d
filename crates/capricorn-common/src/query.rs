//! Similarity-search request built from a free-text description of a
//! patient's actionable events.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub top_k: usize,
}

impl SearchQuery {
    /// Bind the events text to a result count.
    ///
    /// The count defaults to `default_articles` and is clamped to
    /// `max_articles`.
    pub fn build(
        events_text: &str,
        num_articles: Option<usize>,
        default_articles: usize,
        max_articles: usize,
    ) -> Result<Self, ValidationError> {
        let text = events_text.trim();
        if text.is_empty() {
            return Err(ValidationError::MissingFields(vec!["events_text".to_string()]));
        }

        let requested = num_articles.unwrap_or(default_articles);
        if requested == 0 {
            return Err(ValidationError::InvalidField {
                field: "num_articles",
                reason: "must be a positive integer".to_string(),
            });
        }

        let ceiling = max_articles.max(1);
        let top_k = if requested > ceiling {
            tracing::warn!(requested, ceiling, "num_articles above ceiling; clamping");
            ceiling
        } else {
            requested
        };

        Ok(Self { text: text.to_string(), top_k })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_count() {
        let q = SearchQuery::build("NRAS G12D", None, 15, 50).unwrap();
        assert_eq!(q.top_k, 15);
        assert_eq!(q.text, "NRAS G12D");
    }

    #[test]
    fn test_empty_text_rejected() {
        let err = SearchQuery::build("   ", Some(3), 15, 50).unwrap_err();
        assert_eq!(err, ValidationError::MissingFields(vec!["events_text".into()]));
    }

    #[test]
    fn test_zero_rejected() {
        assert!(matches!(
            SearchQuery::build("KMT2A", Some(0), 15, 50),
            Err(ValidationError::InvalidField { field: "num_articles", .. })
        ));
    }

    #[test]
    fn test_clamped_to_ceiling() {
        let q = SearchQuery::build("KMT2A", Some(500), 15, 50).unwrap();
        assert_eq!(q.top_k, 50);
    }

    #[test]
    fn test_configured_default_count() {
        let q = SearchQuery::build("KMT2A", None, 7, 50).unwrap();
        assert_eq!(q.top_k, 7);
        // A default above the ceiling is clamped too.
        assert_eq!(SearchQuery::build("KMT2A", None, 80, 50).unwrap().top_k, 50);
    }
}
