use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{
    Criterion, Feedback, NewFeedback, NewReview, Review, ReviewStore, StoreError, StoreResult,
    Submission, SubmissionStatus, SubmissionStore, Task, TaskStore,
};

/// Postgres-backed implementation of every store the pipeline consumes.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SubmissionRow {
    id: i32,
    student_id: i32,
    task_id: i32,
    code: Option<String>,
    github_url: Option<String>,
    submitted_at: DateTime<Utc>,
    score: Option<f64>,
    status: String,
    submission_type: String,
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = StoreError;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        Ok(Submission {
            id: row.id,
            student_id: row.student_id,
            task_id: row.task_id,
            kind: row.submission_type.parse()?,
            code: row.code,
            github_url: row.github_url,
            status: row.status.parse()?,
            submitted_at: row.submitted_at,
            score: row.score,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReviewRow {
    id: i32,
    submission_id: i32,
    ai_model: String,
    overall_status: String,
    ai_confidence: f64,
    execution_time_ms: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = StoreError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        Ok(Review {
            id: row.id,
            submission_id: row.submission_id,
            ai_model: row.ai_model,
            verdict: row.overall_status.parse()?,
            confidence: row.ai_confidence,
            execution_time_ms: row.execution_time_ms,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct FeedbackRow {
    id: i32,
    review_id: i32,
    feedback_type: String,
    file_path: Option<String>,
    line_start: i32,
    line_end: Option<i32>,
    code_snippet: String,
    suggested_fix: Option<String>,
    description: String,
    severity: i16,
    is_resolved: bool,
    teacher_comment: Option<String>,
    teacher_approved: Option<bool>,
    created_at: DateTime<Utc>,
}

impl TryFrom<FeedbackRow> for Feedback {
    type Error = StoreError;

    fn try_from(row: FeedbackRow) -> Result<Self, Self::Error> {
        Ok(Feedback {
            id: row.id,
            review_id: row.review_id,
            category: row.feedback_type.parse()?,
            file_path: row.file_path,
            line_start: row.line_start,
            line_end: row.line_end,
            code_snippet: row.code_snippet,
            suggested_fix: row.suggested_fix,
            description: row.description,
            severity: row.severity,
            is_resolved: row.is_resolved,
            teacher_comment: row.teacher_comment,
            teacher_approved: row.teacher_approved,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct TaskRow {
    id: i32,
    title: String,
    description: String,
}

#[derive(Debug, FromRow)]
struct CriterionRow {
    id: i32,
    task_id: i32,
    criterion_name: String,
    criterion_description: String,
    is_mandatory: bool,
    weight: i32,
}

#[async_trait]
impl SubmissionStore for PgStore {
    async fn pending_submissions(
        &self,
        limit: usize,
        skip: &[i32],
    ) -> StoreResult<Vec<Submission>> {
        let rows = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT id, student_id, task_id, code, github_url, submitted_at, score, status, submission_type
            FROM submissions
            WHERE status = $1 AND id <> ALL($3)
            ORDER BY submitted_at ASC, id ASC
            LIMIT $2
            "#,
        )
        .bind(SubmissionStatus::Pending.as_str())
        .bind(limit as i64)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Submission::try_from).collect()
    }

    async fn update_status(&self, id: i32, status: SubmissionStatus) -> StoreResult<()> {
        let result = sqlx::query("UPDATE submissions SET status = $1 WHERE id = $2 AND status = $3")
            .bind(status.as_str())
            .bind(id)
            .bind(SubmissionStatus::Pending.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotPending(id));
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    async fn review_for_submission(&self, submission_id: i32) -> StoreResult<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT id, submission_id, ai_model, overall_status, ai_confidence, execution_time_ms, created_at
            FROM code_reviews
            WHERE submission_id = $1
            "#,
        )
        .bind(submission_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Review::try_from).transpose()
    }

    async fn create_review(&self, review: &NewReview) -> StoreResult<Review> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r#"
            INSERT INTO code_reviews (submission_id, ai_model, overall_status, ai_confidence, execution_time_ms)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, submission_id, ai_model, overall_status, ai_confidence, execution_time_ms, created_at
            "#,
        )
        .bind(review.submission_id)
        .bind(&review.ai_model)
        .bind(review.verdict.as_str())
        .bind(review.confidence)
        .bind(review.execution_time_ms)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::DuplicateReview(review.submission_id)
            }
            other => StoreError::Database(other),
        })?;

        row.try_into()
    }

    async fn create_feedback(&self, feedback: &NewFeedback) -> StoreResult<Feedback> {
        let row = sqlx::query_as::<_, FeedbackRow>(
            r#"
            INSERT INTO review_feedback (
                review_id, feedback_type, file_path, line_start, line_end,
                code_snippet, suggested_fix, description, severity, is_resolved
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, false)
            RETURNING id, review_id, feedback_type, file_path, line_start, line_end,
                code_snippet, suggested_fix, description, severity,
                is_resolved, teacher_comment, teacher_approved, created_at
            "#,
        )
        .bind(feedback.review_id)
        .bind(feedback.category.as_str())
        .bind(&feedback.file_path)
        .bind(feedback.line_start)
        .bind(feedback.line_end)
        .bind(&feedback.code_snippet)
        .bind(&feedback.suggested_fix)
        .bind(&feedback.description)
        .bind(feedback.severity)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn task(&self, id: i32) -> StoreResult<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(
            "SELECT id, title, description FROM tasks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Task {
            id: r.id,
            title: r.title,
            description: r.description,
        }))
    }

    async fn criteria_for_task(&self, task_id: i32) -> StoreResult<Vec<Criterion>> {
        let rows = sqlx::query_as::<_, CriterionRow>(
            r#"
            SELECT id, task_id, criterion_name, criterion_description, is_mandatory, weight
            FROM task_criteria
            WHERE task_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Criterion {
                id: r.id,
                task_id: r.task_id,
                name: r.criterion_name,
                description: r.criterion_description,
                is_mandatory: r.is_mandatory,
                weight: r.weight,
            })
            .collect())
    }
}
