use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::agents::{AiError, ReviewRequest, ReviewVerdict, SourcePayload};
use crate::db::{
    Criterion, NewReview, StoreError, Submission, SubmissionKind, SubmissionStatus, Task,
};
use crate::error::ReviewError;
use crate::source::{Checkout, ReferencePolicy};
use crate::state::ReviewServices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// Review stored and status advanced to `ai_reviewed`.
    Reviewed {
        review_id: i32,
        feedback_saved: usize,
        feedback_failed: usize,
    },
    /// A review existed before this run started.
    AlreadyReviewed,
    /// Another worker stored the review between our check and our insert.
    LostRace,
}

/// Reviews one submission: idempotency check, context, AI call, persistence, status.
pub struct ReviewWorkflow {
    services: ReviewServices,
    references: ReferencePolicy,
    ai_timeout: Duration,
}

impl ReviewWorkflow {
    pub fn new(services: ReviewServices, references: ReferencePolicy, ai_timeout: Duration) -> Self {
        Self {
            services,
            references,
            ai_timeout,
        }
    }

    pub async fn process(&self, submission: &Submission) -> Result<WorkflowOutcome, ReviewError> {
        info!(
            submission_id = submission.id,
            kind = %submission.kind,
            "Processing submission"
        );

        if self
            .services
            .reviews
            .review_for_submission(submission.id)
            .await?
            .is_some()
        {
            info!(submission_id = submission.id, "Submission already reviewed");
            return Ok(WorkflowOutcome::AlreadyReviewed);
        }

        let task = self
            .services
            .tasks
            .task(submission.task_id)
            .await?
            .ok_or(ReviewError::TaskNotFound {
                submission_id: submission.id,
                task_id: submission.task_id,
            })?;
        let criteria = self.services.tasks.criteria_for_task(task.id).await?;

        let (verdict, elapsed) = match submission.kind {
            SubmissionKind::Code => self.review_code(submission, &task, &criteria).await?,
            SubmissionKind::GithubLink => {
                self.review_repository(submission, &task, &criteria).await?
            }
        };

        self.persist(submission.id, verdict, elapsed).await
    }

    async fn review_code(
        &self,
        submission: &Submission,
        task: &Task,
        criteria: &[Criterion],
    ) -> Result<(ReviewVerdict, Duration), ReviewError> {
        let code = submission
            .code
            .as_deref()
            .filter(|code| !code.trim().is_empty())
            .ok_or(ReviewError::EmptyCode(submission.id))?;

        info!(submission_id = submission.id, code_length = code.len(), "Reviewing code submission");
        let source = SourcePayload::Snippet(code.to_string());
        self.ask_reviewer(&source, task, criteria).await
    }

    async fn review_repository(
        &self,
        submission: &Submission,
        task: &Task,
        criteria: &[Criterion],
    ) -> Result<(ReviewVerdict, Duration), ReviewError> {
        let url = submission
            .github_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(ReviewError::MissingRepository(submission.id))?;

        if !self.references.accepts(url) {
            return Err(ReviewError::InvalidRepository(url.to_string()));
        }

        info!(submission_id = submission.id, github_url = %url, "Reviewing repository submission");

        let checkout = Checkout::acquire(self.services.fetcher.as_ref(), url).await?;
        let paths = checkout.list_files().await?;
        if paths.is_empty() {
            return Err(ReviewError::NoSourceFiles(url.to_string()));
        }

        info!(submission_id = submission.id, files_count = paths.len(), "Found source files in repository");

        let mut files = BTreeMap::new();
        for path in paths {
            match checkout.read_file(&path).await {
                Ok(content) => {
                    files.insert(path, content);
                }
                Err(e) => warn!(submission_id = submission.id, file = %path, error = %e, "Failed to read file"),
            }
        }
        drop(checkout);

        if files.is_empty() {
            return Err(ReviewError::UnreadableSources(url.to_string()));
        }

        let source = SourcePayload::Project(files);
        self.ask_reviewer(&source, task, criteria).await
    }

    async fn ask_reviewer(
        &self,
        source: &SourcePayload,
        task: &Task,
        criteria: &[Criterion],
    ) -> Result<(ReviewVerdict, Duration), ReviewError> {
        let request = ReviewRequest {
            source,
            task_description: Some(task.description.as_str()).filter(|d| !d.trim().is_empty()),
            criteria,
        };

        let started = Instant::now();
        let verdict = tokio::time::timeout(self.ai_timeout, self.services.reviewer.review(request))
            .await
            .map_err(|_| AiError::Timeout(self.ai_timeout))??;

        Ok((verdict, started.elapsed()))
    }

    /// Review first, then feedback, then status. Feedback failures are logged and skipped.
    async fn persist(
        &self,
        submission_id: i32,
        verdict: ReviewVerdict,
        elapsed: Duration,
    ) -> Result<WorkflowOutcome, ReviewError> {
        let new_review = NewReview {
            submission_id,
            ai_model: self.services.reviewer.model().to_string(),
            verdict: verdict.verdict,
            confidence: verdict.confidence,
            execution_time_ms: i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX),
        };

        let review = match self.services.reviews.create_review(&new_review).await {
            Ok(review) => review,
            Err(StoreError::DuplicateReview(_)) => {
                info!(submission_id, "Review was stored concurrently by another worker");
                return Ok(WorkflowOutcome::LostRace);
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            submission_id,
            review_id = review.id,
            verdict = %review.verdict,
            "Created code review"
        );

        let mut feedback_saved = 0;
        let mut feedback_failed = 0;
        for draft in verdict.feedback {
            match self
                .services
                .reviews
                .create_feedback(&draft.into_new_feedback(review.id))
                .await
            {
                Ok(_) => feedback_saved += 1,
                Err(e) => {
                    feedback_failed += 1;
                    error!(review_id = review.id, error = %e, "Failed to create review feedback");
                }
            }
        }

        self.services
            .submissions
            .update_status(submission_id, SubmissionStatus::AiReviewed)
            .await
            .map_err(|source| ReviewError::StatusAdvance {
                submission_id,
                review_id: review.id,
                source,
            })?;

        info!(
            submission_id,
            feedbacks_count = feedback_saved,
            feedbacks_failed = feedback_failed,
            "Successfully processed submission"
        );

        Ok(WorkflowOutcome::Reviewed {
            review_id: review.id,
            feedback_saved,
            feedback_failed,
        })
    }
}
