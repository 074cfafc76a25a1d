use std::sync::Arc;

use crate::agents::AiReviewer;
use crate::db::{ReviewStore, SubmissionStore, TaskStore};
use crate::source::SourceFetcher;

/// Collaborators shared by every review workflow instance.
#[derive(Clone)]
pub struct ReviewServices {
    pub submissions: Arc<dyn SubmissionStore>,
    pub reviews: Arc<dyn ReviewStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub reviewer: Arc<dyn AiReviewer>,
    pub fetcher: Arc<dyn SourceFetcher>,
}
