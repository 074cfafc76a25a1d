use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use super::{FetchError, SourceFetcher, SourceHandle};

/// Directories that never contain reviewable sources.
pub const EXCLUDED_DIRS: &[&str] = &[".git", "build", ".dart_tool", "node_modules"];

/// Subdirectory of the workspace that holds every checkout.
const CHECKOUT_DIR: &str = "checkouts";

/// Shallow-clones repositories into a private directory under the workspace.
pub struct GitSourceFetcher {
    checkouts: PathBuf,
    extension: String,
    clone_timeout: Duration,
}

impl GitSourceFetcher {
    /// Checkouts left behind by a previous process are wiped. Nothing else in
    /// `workspace` is touched.
    pub fn new(workspace: PathBuf, extension: String, clone_timeout: Duration) -> io::Result<Self> {
        let checkouts = workspace.join(CHECKOUT_DIR);
        if checkouts.exists() {
            info!(path = %checkouts.display(), "Removing stale checkouts");
            std::fs::remove_dir_all(&checkouts)?;
        }
        std::fs::create_dir_all(&checkouts)?;

        Ok(Self {
            checkouts,
            extension,
            clone_timeout,
        })
    }
}

fn repo_name(url: &str) -> String {
    let name: String = url
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();

    if name.is_empty() || name.chars().all(|c| c == '.') {
        "repo".to_string()
    } else {
        name
    }
}

fn collect_source_files(root: &Path, extension: &str) -> io::Result<Vec<String>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();

            if file_type.is_dir() {
                let name = entry.file_name();
                if !EXCLUDED_DIRS.iter().any(|excluded| name == *excluded) {
                    pending.push(path);
                }
            } else if file_type.is_file()
                && path.extension().is_some_and(|ext| ext == extension)
            {
                let relative = path.strip_prefix(root).map_err(io::Error::other)?;
                let relative: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                files.push(relative.join("/"));
            }
        }
    }

    files.sort();
    Ok(files)
}

#[async_trait]
impl SourceFetcher for GitSourceFetcher {
    async fn fetch(&self, reference: &str) -> Result<SourceHandle, FetchError> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", repo_name(reference)))
            .tempdir_in(&self.checkouts)?;

        info!(url = %reference, path = %dir.path().display(), "Cloning repository");

        let mut command = Command::new("git");
        command
            .args(["clone", "--depth", "1", "--quiet", "--", reference])
            .arg(dir.path())
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.clone_timeout, command.output())
            .await
            .map_err(|_| FetchError::Timeout(reference.to_string(), self.clone_timeout))??;

        if !output.status.success() {
            return Err(FetchError::Clone {
                url: reference.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(SourceHandle::temporary(dir))
    }

    async fn list_files(&self, handle: &SourceHandle) -> Result<Vec<String>, FetchError> {
        let root = handle.root().to_path_buf();
        let extension = self.extension.clone();
        let files =
            tokio::task::spawn_blocking(move || collect_source_files(&root, &extension)).await??;

        info!(path = %handle.root().display(), count = files.len(), "Listed source files");
        Ok(files)
    }

    async fn read_file(&self, handle: &SourceHandle, path: &str) -> Result<String, FetchError> {
        Ok(tokio::fs::read_to_string(handle.root().join(path)).await?)
    }

    fn release(&self, handle: SourceHandle) {
        let path = handle.root().to_path_buf();
        match handle.close() {
            Ok(()) => info!(path = %path.display(), "Cleaned up repository"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to clean up repository"),
        }
    }
}
