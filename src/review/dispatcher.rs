use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::attempts::{AttemptDecision, AttemptTracker};
use super::workflow::{ReviewWorkflow, WorkflowOutcome};
use crate::error::ReviewError;
use crate::db::{StoreError, SubmissionStore};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub reviewed: usize,
    pub already_reviewed: usize,
    pub failed: usize,
}

/// Runs one batch of pending submissions through the workflow under a concurrency cap.
pub struct Dispatcher {
    workflow: Arc<ReviewWorkflow>,
    submissions: Arc<dyn SubmissionStore>,
    batch_size: usize,
    gate: Arc<Semaphore>,
    attempts: Mutex<AttemptTracker>,
}

impl Dispatcher {
    pub fn new(
        workflow: Arc<ReviewWorkflow>,
        submissions: Arc<dyn SubmissionStore>,
        batch_size: usize,
        max_concurrent: usize,
        max_attempts: Option<u32>,
    ) -> Self {
        Self {
            workflow,
            submissions,
            batch_size,
            gate: Arc::new(Semaphore::new(max_concurrent)),
            attempts: Mutex::new(AttemptTracker::new(max_attempts)),
        }
    }

    /// Returns once every fetched submission has been attempted.
    ///
    /// Only a failure to fetch the batch is an error; per-submission failures are
    /// logged and counted in the report.
    pub async fn run_cycle(&self) -> Result<CycleReport, StoreError> {
        let parked = self.attempts.lock().await.parked();
        let batch = self
            .submissions
            .pending_submissions(self.batch_size, &parked)
            .await?;

        let mut report = CycleReport {
            fetched: batch.len(),
            ..CycleReport::default()
        };
        info!(count = batch.len(), parked = parked.len(), "Processing pending submissions");

        let mut tasks = JoinSet::new();
        for submission in batch {
            // Permits are taken in fetch order, so admission follows submission age.
            let permit = match self.gate.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(error = %e, "Admission gate closed, abandoning the rest of the batch");
                    break;
                }
            };

            let workflow = Arc::clone(&self.workflow);
            tasks.spawn(async move {
                let _permit = permit;
                let result = AssertUnwindSafe(workflow.process(&submission))
                    .catch_unwind()
                    .await
                    .map_err(|panic| ReviewError::Panicked(panic_message(&*panic)));
                (submission.id, result.and_then(|r| r))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((submission_id, Ok(outcome))) => {
                    self.attempts.lock().await.clear(submission_id);
                    match outcome {
                        WorkflowOutcome::Reviewed { .. } => report.reviewed += 1,
                        WorkflowOutcome::AlreadyReviewed | WorkflowOutcome::LostRace => {
                            report.already_reviewed += 1
                        }
                    }
                }
                Ok((submission_id, Err(e))) => {
                    report.failed += 1;
                    let decision = self.attempts.lock().await.record_failure(submission_id);
                    match decision {
                        AttemptDecision::Retry { attempt } => error!(
                            submission_id,
                            attempt,
                            error_class = e.class(),
                            error = %e,
                            "Failed to process submission"
                        ),
                        AttemptDecision::Parked { attempts } => warn!(
                            submission_id,
                            attempts,
                            error_class = e.class(),
                            error = %e,
                            "Parking submission after repeated failures; it stays pending"
                        ),
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    error!(error = %e, "Review task aborted");
                }
            }
        }

        info!(
            fetched = report.fetched,
            reviewed = report.reviewed,
            already_reviewed = report.already_reviewed,
            failed = report.failed,
            "Review cycle finished"
        );

        Ok(report)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
