//! In-memory stand-ins for the stores and collaborators.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::agents::{AiError, AiReviewer, FeedbackDraft, ReviewRequest, ReviewVerdict, SourcePayload};
use crate::db::{
    Criterion, Feedback, FeedbackCategory, NewFeedback, NewReview, Review, ReviewStore,
    StoreError, StoreResult, Submission, SubmissionKind, SubmissionStatus, SubmissionStore, Task,
    TaskStore, Verdict,
};
use crate::source::{FetchError, ReferencePolicy, SourceFetcher, SourceHandle};
use crate::review::ReviewWorkflow;
use crate::state::ReviewServices;

pub fn submitted_at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() + ChronoDuration::minutes(minutes)
}

pub fn code_submission(id: i32, task_id: i32, code: Option<&str>) -> Submission {
    Submission {
        id,
        student_id: 100 + id,
        task_id,
        kind: SubmissionKind::Code,
        code: code.map(str::to_string),
        github_url: None,
        status: SubmissionStatus::Pending,
        submitted_at: submitted_at(id as i64),
        score: None,
    }
}

pub fn repo_submission(id: i32, task_id: i32, url: &str) -> Submission {
    Submission {
        id,
        student_id: 100 + id,
        task_id,
        kind: SubmissionKind::GithubLink,
        code: None,
        github_url: Some(url.to_string()),
        status: SubmissionStatus::Pending,
        submitted_at: submitted_at(id as i64),
        score: None,
    }
}

pub fn draft(description: &str, file_path: Option<&str>) -> FeedbackDraft {
    FeedbackDraft {
        category: FeedbackCategory::LogicError,
        file_path: file_path.map(str::to_string),
        line_start: 1,
        line_end: Some(2),
        code_snippet: "print(x);".to_string(),
        suggested_fix: None,
        description: description.to_string(),
        severity: 3,
    }
}

pub fn verdict(verdict: Verdict, confidence: f64, feedback: Vec<FeedbackDraft>) -> ReviewVerdict {
    ReviewVerdict {
        verdict,
        confidence,
        feedback,
    }
}

#[derive(Default)]
struct MemoryState {
    submissions: Vec<Submission>,
    tasks: HashMap<i32, Task>,
    criteria: Vec<Criterion>,
    reviews: Vec<Review>,
    feedback: Vec<Feedback>,
    next_id: i32,
    fail_feedback_containing: Option<String>,
    fail_status_updates: bool,
    fail_pending_queries: bool,
    status_updates: Vec<(i32, SubmissionStatus)>,
    pending_queries: usize,
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Implements every store over plain vectors.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_task(&self, id: i32, description: &str) {
        self.state.lock().unwrap().tasks.insert(
            id,
            Task {
                id,
                title: format!("Task {}", id),
                description: description.to_string(),
            },
        );
    }

    pub fn add_criterion(&self, task_id: i32, name: &str, is_mandatory: bool, weight: i32) {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.criteria.push(Criterion {
            id,
            task_id,
            name: name.to_string(),
            description: format!("{} description", name),
            is_mandatory,
            weight,
        });
    }

    pub fn add_submission(&self, submission: Submission) {
        self.state.lock().unwrap().submissions.push(submission);
    }

    pub fn insert_review(&self, submission_id: i32) {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.reviews.push(Review {
            id,
            submission_id,
            ai_model: "earlier-model".to_string(),
            verdict: Verdict::Passed,
            confidence: 0.9,
            execution_time_ms: 10,
            created_at: Utc::now(),
        });
    }

    pub fn fail_feedback_containing(&self, needle: &str) {
        self.state.lock().unwrap().fail_feedback_containing = Some(needle.to_string());
    }

    pub fn fail_status_updates(&self) {
        self.state.lock().unwrap().fail_status_updates = true;
    }

    pub fn set_pending_queries_fail(&self, fail: bool) {
        self.state.lock().unwrap().fail_pending_queries = fail;
    }

    pub fn submission(&self, id: i32) -> Submission {
        let state = self.state.lock().unwrap();
        state
            .submissions
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .unwrap()
    }

    pub fn reviews(&self) -> Vec<Review> {
        self.state.lock().unwrap().reviews.clone()
    }

    pub fn feedback(&self) -> Vec<Feedback> {
        self.state.lock().unwrap().feedback.clone()
    }

    pub fn status_updates(&self) -> Vec<(i32, SubmissionStatus)> {
        self.state.lock().unwrap().status_updates.clone()
    }

    pub fn pending_queries(&self) -> usize {
        self.state.lock().unwrap().pending_queries
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn pending_submissions(
        &self,
        limit: usize,
        skip: &[i32],
    ) -> StoreResult<Vec<Submission>> {
        let mut state = self.state.lock().unwrap();
        state.pending_queries += 1;
        if state.fail_pending_queries {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut pending: Vec<Submission> = state
            .submissions
            .iter()
            .filter(|s| s.status == SubmissionStatus::Pending && !skip.contains(&s.id))
            .cloned()
            .collect();
        pending.sort_by_key(|s| (s.submitted_at, s.id));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn update_status(&self, id: i32, status: SubmissionStatus) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_status_updates {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let submission = state
            .submissions
            .iter_mut()
            .find(|s| s.id == id && s.status == SubmissionStatus::Pending)
            .ok_or(StoreError::NotPending(id))?;
        submission.status = status;
        state.status_updates.push((id, status));
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn review_for_submission(&self, submission_id: i32) -> StoreResult<Option<Review>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .reviews
            .iter()
            .find(|r| r.submission_id == submission_id)
            .cloned())
    }

    async fn create_review(&self, review: &NewReview) -> StoreResult<Review> {
        let mut state = self.state.lock().unwrap();
        if state
            .reviews
            .iter()
            .any(|r| r.submission_id == review.submission_id)
        {
            return Err(StoreError::DuplicateReview(review.submission_id));
        }
        let stored = Review {
            id: state.next_id(),
            submission_id: review.submission_id,
            ai_model: review.ai_model.clone(),
            verdict: review.verdict,
            confidence: review.confidence,
            execution_time_ms: review.execution_time_ms,
            created_at: Utc::now(),
        };
        state.reviews.push(stored.clone());
        Ok(stored)
    }

    async fn create_feedback(&self, feedback: &NewFeedback) -> StoreResult<Feedback> {
        let mut state = self.state.lock().unwrap();
        if let Some(needle) = &state.fail_feedback_containing {
            if feedback.description.contains(needle.as_str()) {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
        }
        let stored = Feedback {
            id: state.next_id(),
            review_id: feedback.review_id,
            category: feedback.category,
            file_path: feedback.file_path.clone(),
            line_start: feedback.line_start,
            line_end: feedback.line_end,
            code_snippet: feedback.code_snippet.clone(),
            suggested_fix: feedback.suggested_fix.clone(),
            description: feedback.description.clone(),
            severity: feedback.severity,
            is_resolved: false,
            teacher_comment: None,
            teacher_approved: None,
            created_at: Utc::now(),
        };
        state.feedback.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn task(&self, id: i32) -> StoreResult<Option<Task>> {
        Ok(self.state.lock().unwrap().tasks.get(&id).cloned())
    }

    async fn criteria_for_task(&self, task_id: i32) -> StoreResult<Vec<Criterion>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .criteria
            .iter()
            .filter(|c| c.task_id == task_id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub source: SourcePayload,
    pub task_description: Option<String>,
    pub criteria: Vec<String>,
}

/// Returns a canned verdict and records how it was called.
pub struct FakeReviewer {
    verdict: ReviewVerdict,
    failure: Option<String>,
    panics: bool,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl FakeReviewer {
    pub fn returning(verdict: ReviewVerdict) -> Self {
        Self {
            verdict,
            failure: None,
            panics: false,
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn passing() -> Self {
        Self::returning(verdict(Verdict::Passed, 0.9, Vec::new()))
    }

    pub fn failing(message: &str) -> Self {
        let mut reviewer = Self::passing();
        reviewer.failure = Some(message.to_string());
        reviewer
    }

    pub fn panicking() -> Self {
        let mut reviewer = Self::passing();
        reviewer.panics = true;
        reviewer
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiReviewer for FakeReviewer {
    fn model(&self) -> &str {
        "fake-model"
    }

    async fn review(&self, request: ReviewRequest<'_>) -> Result<ReviewVerdict, AiError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            source: request.source.clone(),
            task_description: request.task_description.map(str::to_string),
            criteria: request.criteria.iter().map(|c| c.name.clone()).collect(),
        });

        if self.panics {
            panic!("reviewer blew up");
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.failure {
            Some(message) => Err(AiError::Invalid(message.clone())),
            None => Ok(self.verdict.clone()),
        }
    }
}

/// Serves a fixed file map; `None` contents fail to read.
#[derive(Default)]
pub struct FakeFetcher {
    files: BTreeMap<String, Option<String>>,
    fail_fetch: bool,
    fetches: AtomicUsize,
    releases: AtomicUsize,
}

impl FakeFetcher {
    pub fn with_files(files: &[(&str, Option<&str>)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(path, content)| (path.to_string(), content.map(str::to_string)))
                .collect(),
            ..Self::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            fail_fetch: true,
            ..Self::default()
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn fetch(&self, reference: &str) -> Result<SourceHandle, FetchError> {
        if self.fail_fetch {
            return Err(FetchError::Clone {
                url: reference.to_string(),
                stderr: "repository not found".to_string(),
            });
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(SourceHandle::new(PathBuf::from("/fake/checkout")))
    }

    async fn list_files(&self, _handle: &SourceHandle) -> Result<Vec<String>, FetchError> {
        Ok(self.files.keys().cloned().collect())
    }

    async fn read_file(&self, _handle: &SourceHandle, path: &str) -> Result<String, FetchError> {
        match self.files.get(path) {
            Some(Some(content)) => Ok(content.clone()),
            _ => Err(FetchError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                path.to_string(),
            ))),
        }
    }

    fn release(&self, _handle: SourceHandle) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub reviewer: Arc<FakeReviewer>,
    pub fetcher: Arc<FakeFetcher>,
    pub workflow: Arc<ReviewWorkflow>,
}

impl Harness {
    pub fn new(reviewer: FakeReviewer, fetcher: FakeFetcher) -> Self {
        let store = MemoryStore::new();
        store.add_task(1, "Build a counter app");
        let reviewer = Arc::new(reviewer);
        let fetcher = Arc::new(fetcher);

        let services = ReviewServices {
            submissions: store.clone(),
            reviews: store.clone(),
            tasks: store.clone(),
            reviewer: reviewer.clone(),
            fetcher: fetcher.clone(),
        };
        let workflow = Arc::new(ReviewWorkflow::new(
            services,
            ReferencePolicy::new("github.com").unwrap(),
            Duration::from_secs(60),
        ));

        Self {
            store,
            reviewer,
            fetcher,
            workflow,
        }
    }
}
