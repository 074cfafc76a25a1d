mod models;
mod postgres;

pub use models::*;
pub use postgres::PgStore;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The unique constraint on `code_reviews.submission_id` rejected an insert.
    #[error("a review already exists for submission {0}")]
    DuplicateReview(i32),

    /// A status update found the submission no longer `pending`.
    #[error("submission {0} is not pending")]
    NotPending(i32),

    #[error("invalid column value: {0}")]
    Decode(#[from] UnknownVariant),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Oldest `pending` submissions first, at most `limit`, excluding `skip`.
    async fn pending_submissions(&self, limit: usize, skip: &[i32])
        -> StoreResult<Vec<Submission>>;

    /// Moves a `pending` submission to `status`; any other current status fails
    /// with [`StoreError::NotPending`].
    async fn update_status(&self, id: i32, status: SubmissionStatus) -> StoreResult<()>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn review_for_submission(&self, submission_id: i32) -> StoreResult<Option<Review>>;

    /// Fails with [`StoreError::DuplicateReview`] when the submission already has one.
    async fn create_review(&self, review: &NewReview) -> StoreResult<Review>;

    async fn create_feedback(&self, feedback: &NewFeedback) -> StoreResult<Feedback>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn task(&self, id: i32) -> StoreResult<Option<Task>>;

    /// Criteria in insertion order.
    async fn criteria_for_task(&self, task_id: i32) -> StoreResult<Vec<Criterion>>;
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
