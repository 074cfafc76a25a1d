mod deepseek;
mod prompt;
mod verdict;

pub use deepseek::DeepSeekAgent;
pub use verdict::parse_review;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::db::{Criterion, FeedbackCategory, NewFeedback, Verdict};

#[derive(Debug, Error)]
pub enum AiError {
    #[error("request to AI service failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("AI service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("AI service returned no choices")]
    EmptyResponse,

    #[error("failed to parse AI review: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid AI review: {0}")]
    Invalid(String),

    #[error("AI review timed out after {0:?}")]
    Timeout(Duration),
}

/// Source handed to the reviewer: a single snippet, or a project keyed by relative path.
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePayload {
    Snippet(String),
    Project(BTreeMap<String, String>),
}

impl SourcePayload {
    pub fn is_multi_file(&self) -> bool {
        matches!(self, SourcePayload::Project(files) if files.len() > 1)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReviewRequest<'a> {
    pub source: &'a SourcePayload,
    pub task_description: Option<&'a str>,
    pub criteria: &'a [Criterion],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewVerdict {
    pub verdict: Verdict,
    pub confidence: f64,
    pub feedback: Vec<FeedbackDraft>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackDraft {
    pub category: FeedbackCategory,
    pub file_path: Option<String>,
    pub line_start: i32,
    pub line_end: Option<i32>,
    pub code_snippet: String,
    pub suggested_fix: Option<String>,
    pub description: String,
    pub severity: i16,
}

impl FeedbackDraft {
    pub fn into_new_feedback(self, review_id: i32) -> NewFeedback {
        NewFeedback {
            review_id,
            category: self.category,
            file_path: self.file_path,
            line_start: self.line_start,
            line_end: self.line_end,
            code_snippet: self.code_snippet,
            suggested_fix: self.suggested_fix,
            description: self.description,
            severity: self.severity,
        }
    }
}

/// An external model that turns source plus task context into a structured review.
#[async_trait]
pub trait AiReviewer: Send + Sync {
    /// Tag recorded on every review this reviewer produces.
    fn model(&self) -> &str;

    async fn review(&self, request: ReviewRequest<'_>) -> Result<ReviewVerdict, AiError>;
}
