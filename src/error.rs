use thiserror::Error;

use crate::agents::AiError;
use crate::db::StoreError;
use crate::source::FetchError;

/// Why a single submission could not be reviewed. The submission stays `pending`.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("submission {0} has no code to review")]
    EmptyCode(i32),

    #[error("submission {0} has no repository url to review")]
    MissingRepository(i32),

    #[error("invalid repository url: {0}")]
    InvalidRepository(String),

    #[error("task {task_id} not found for submission {submission_id}")]
    TaskNotFound { submission_id: i32, task_id: i32 },

    #[error("no source files found in repository {0}")]
    NoSourceFiles(String),

    #[error("failed to read any source files from repository {0}")]
    UnreadableSources(String),

    #[error("AI review failed: {0}")]
    Ai(#[from] AiError),

    #[error("failed to fetch sources: {0}")]
    Fetch(#[from] FetchError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The review is stored but the submission is still `pending`.
    #[error("review {review_id} stored but submission {submission_id} status update failed: {source}")]
    StatusAdvance {
        submission_id: i32,
        review_id: i32,
        #[source]
        source: StoreError,
    },

    #[error("review task panicked: {0}")]
    Panicked(String),
}

impl ReviewError {
    /// Coarse error class used as a structured log field.
    pub fn class(&self) -> &'static str {
        match self {
            Self::EmptyCode(_) | Self::MissingRepository(_) | Self::InvalidRepository(_) => {
                "validation"
            }
            Self::TaskNotFound { .. } => "not_found",
            Self::Ai(_) | Self::Fetch(_) | Self::NoSourceFiles(_) | Self::UnreadableSources(_) => {
                "collaborator"
            }
            Self::Store(_) | Self::StatusAdvance { .. } => "persistence",
            Self::Panicked(_) => "panic",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_classes() {
        assert_eq!(ReviewError::EmptyCode(1).class(), "validation");
        assert_eq!(
            ReviewError::TaskNotFound {
                submission_id: 1,
                task_id: 2
            }
            .class(),
            "not_found"
        );
        assert_eq!(
            ReviewError::from(AiError::Timeout(Duration::from_secs(60))).class(),
            "collaborator"
        );
        assert_eq!(
            ReviewError::from(StoreError::DuplicateReview(3)).class(),
            "persistence"
        );
        assert_eq!(ReviewError::Panicked("boom".into()).class(), "panic");
    }
}
