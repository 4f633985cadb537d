//! Events emitted by the article streamer.
//!
//! Each event serialises as `{"type": ..., "data": {...}}` and is a complete,
//! independently parseable unit.

use serde::{Deserialize, Serialize};

use capricorn_common::ArticleAnalysis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Processing,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamProgress {
    pub article_number: usize,
    pub total_articles: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    Pmids {
        pmids: Vec<String>,
    },
    Metadata {
        total_articles: usize,
        current_article: usize,
        status: BatchStatus,
    },
    ArticleAnalysis {
        progress: StreamProgress,
        analysis: Box<ArticleAnalysis>,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        article_number: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_articles: Option<usize>,
    },
}

impl StreamEvent {
    /// Request-level error, not tied to an article.
    pub fn fatal(message: impl Into<String>) -> Self {
        StreamEvent::Error { message: message.into(), article_number: None, total_articles: None }
    }

    /// Error scoped to one article of the batch.
    pub fn article_error(message: impl Into<String>, article_number: usize, total_articles: usize) -> Self {
        StreamEvent::Error {
            message: message.into(),
            article_number: Some(article_number),
            total_articles: Some(total_articles),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Metadata { status: BatchStatus::Complete, .. }
                | StreamEvent::Error { article_number: None, .. }
        )
    }
}
