use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{error::Error, languages::ExecutionProfile, Result};

/// Writes submitted sources into a shared ephemeral directory
#[derive(Debug, Clone)]
pub struct SourceStager {
    workspace: PathBuf,
}

impl SourceStager {
    /// Create the stager, making sure the workspace directory exists
    pub async fn new(workspace: impl AsRef<Path>) -> Result<Self> {
        let workspace = workspace.as_ref();
        fs::create_dir_all(workspace).await.map_err(|e| {
            Error::StageFailure(format!(
                "Failed to create workspace {}: {}",
                workspace.display(),
                e
            ))
        })?;

        // Bind mounts need an absolute host path
        let workspace = fs::canonicalize(workspace).await.map_err(|e| {
            Error::StageFailure(format!(
                "Failed to resolve workspace {}: {}",
                workspace.display(),
                e
            ))
        })?;

        Ok(Self { workspace })
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Write `code` verbatim to a new uniquely named file
    pub async fn stage(&self, code: &str, profile: &ExecutionProfile) -> Result<StagedSource> {
        let file_name = format!("{}.{}", Uuid::new_v4(), profile.extension);
        let host_path = self.workspace.join(file_name);

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&host_path)
            .await
            .map_err(|e| Error::StageFailure(format!("{}: {}", host_path.display(), e)))?;

        // From here on the guard owns the file and removes it on any exit
        let staged = StagedSource {
            host_path,
            created_at: SystemTime::now(),
            released: AtomicBool::new(false),
        };

        file.write_all(code.as_bytes())
            .await
            .map_err(|e| Error::StageFailure(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| Error::StageFailure(e.to_string()))?;

        debug!("Staged source at {}", staged.host_path.display());
        Ok(staged)
    }
}

/// A staged source file, removed exactly once
#[derive(Debug)]
pub struct StagedSource {
    host_path: PathBuf,
    created_at: SystemTime,
    released: AtomicBool,
}

impl StagedSource {
    pub fn host_path(&self) -> &Path {
        &self.host_path
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Delete the file. Later calls, or a file that is already gone, are no-ops.
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            debug!("{} already released", self.host_path.display());
            return;
        }

        match fs::remove_file(&self.host_path).await {
            Ok(()) => debug!("Removed staged source {}", self.host_path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Staged source {} already removed", self.host_path.display())
            }
            Err(e) => warn!(
                "Failed to remove staged source {}: {}",
                self.host_path.display(),
                e
            ),
        }
    }
}

impl Drop for StagedSource {
    fn drop(&mut self) {
        if *self.released.get_mut() {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.host_path) {
            if e.kind() != ErrorKind::NotFound {
                error!("Failed to clean up staged source: {}", e);
            }
        }
    }
}
