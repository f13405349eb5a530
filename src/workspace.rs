use crate::outcome::JobError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// An isolated filesystem scope owned by exactly one job. Never reused:
/// the directory name carries a fresh v4 identifier.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// `work_dir` overrides the workspace root; empty means the platform
    /// temp directory.
    pub fn new(work_dir: &str) -> Self {
        let root = if work_dir.is_empty() {
            std::env::temp_dir()
        } else {
            PathBuf::from(work_dir)
        };
        Self { root }
    }

    pub fn acquire(&self, prefix: &str) -> Result<Workspace, JobError> {
        let dir = self.root.join(format!("{prefix}-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).map_err(|e| {
            JobError::Infrastructure(format!("creating workspace {}: {e}", dir.display()))
        })?;
        debug!("workspace acquired: {}", dir.display());
        Ok(Workspace { dir })
    }

    /// Remove the workspace tree. By the time this runs the job outcome has
    /// already been decided, so removal failures are logged and swallowed;
    /// an already-absent workspace is not an error.
    pub fn release(&self, ws: Workspace) {
        match std::fs::remove_dir_all(&ws.dir) {
            Ok(()) => debug!("workspace released: {}", ws.dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("failed to remove workspace {}: {e}", ws.dir.display()),
        }
    }
}
