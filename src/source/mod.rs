mod git;

pub use git::GitSourceFetcher;

use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("git clone of {url} failed: {stderr}")]
    Clone { url: String, stderr: String },

    #[error("git clone of {0} timed out after {1:?}")]
    Timeout(String, Duration),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A materialized repository on local disk.
#[derive(Debug)]
pub struct SourceHandle {
    root: PathBuf,
    dir: Option<TempDir>,
}

impl SourceHandle {
    /// Handle over a directory the fetcher does not own.
    pub fn new(root: PathBuf) -> Self {
        Self { root, dir: None }
    }

    fn temporary(dir: TempDir) -> Self {
        Self {
            root: dir.path().to_path_buf(),
            dir: Some(dir),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Removes the backing directory if the handle owns one.
    pub fn close(self) -> std::io::Result<()> {
        match self.dir {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}

/// Turns a repository reference into readable source files.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Always produces a fresh copy; nothing from an earlier fetch is reused.
    async fn fetch(&self, reference: &str) -> Result<SourceHandle, FetchError>;

    /// Relative paths of reviewable source files, sorted.
    async fn list_files(&self, handle: &SourceHandle) -> Result<Vec<String>, FetchError>;

    async fn read_file(&self, handle: &SourceHandle, path: &str) -> Result<String, FetchError>;

    fn release(&self, handle: SourceHandle);
}

/// A fetched repository that is released exactly once when dropped.
pub struct Checkout<'a> {
    fetcher: &'a dyn SourceFetcher,
    handle: SourceHandle,
}

impl<'a> Checkout<'a> {
    pub async fn acquire(fetcher: &'a dyn SourceFetcher, reference: &str) -> Result<Self, FetchError> {
        let handle = fetcher.fetch(reference).await?;
        Ok(Self { fetcher, handle })
    }

    pub async fn list_files(&self) -> Result<Vec<String>, FetchError> {
        self.fetcher.list_files(&self.handle).await
    }

    pub async fn read_file(&self, path: &str) -> Result<String, FetchError> {
        self.fetcher.read_file(&self.handle, path).await
    }
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        let handle = std::mem::replace(&mut self.handle, SourceHandle::new(PathBuf::new()));
        self.fetcher.release(handle);
    }
}

/// Accepted shape for repository references: `scheme://<host>/<owner>/<repo>[.git]`.
#[derive(Debug, Clone)]
pub struct ReferencePolicy {
    pattern: Regex,
}

impl ReferencePolicy {
    pub fn new(trusted_host: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r"^https?://{}/[\w-]+/[\w.-]+(?:\.git)?$",
            regex::escape(trusted_host)
        ))?;
        Ok(Self { pattern })
    }

    pub fn accepts(&self, reference: &str) -> bool {
        self.pattern.is_match(reference)
    }
}
