//! Per-request scratch storage
//!
//! Each request gets its own directory under the workspace root, so two
//! requests for the same language never touch the same files. The directory
//! holds the source file and whatever the toolchain produces next to it.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::languages::LanguageConfig;

/// Filesystem footprint of one execution request
#[derive(Debug)]
pub struct Workspace {
    request_id: u64,
    dir: Option<TempDir>,
    path: PathBuf,
    source_path: PathBuf,
    artifact_path: Option<PathBuf>,
}

impl Workspace {
    /// Create a fresh directory under `root` and write the source into it
    pub async fn materialize(
        root: &Path,
        request_id: u64,
        lang: &LanguageConfig,
        source_code: &str,
    ) -> io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("run-{}-", request_id))
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();

        // Dropping `dir` on a failed write removes the directory again
        let source_path = path.join(&lang.source_file);
        tokio::fs::write(&source_path, source_code).await?;

        let artifact_path = lang.artifact.as_ref().map(|name| path.join(name));

        debug!(request_id, path = %path.display(), "Workspace created");

        Ok(Self {
            request_id,
            dir: Some(dir),
            path,
            source_path,
            artifact_path,
        })
    }

    /// Directory the compile and run steps execute in
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn artifact_path(&self) -> Option<&Path> {
        self.artifact_path.as_deref()
    }

    pub fn is_destroyed(&self) -> bool {
        self.dir.is_none()
    }

    /// Remove the directory with everything in it.
    ///
    /// Safe to call more than once. Failures are only logged; they must never
    /// change the outcome reported for the request.
    pub fn destroy(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        match dir.close() {
            Ok(()) => debug!(request_id = self.request_id, "Workspace removed"),
            Err(e) => warn!(
                request_id = self.request_id,
                path = %self.path.display(),
                "Failed to delete workspace: {}",
                e
            ),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.destroy();
    }
}
