use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, warn};

use crate::{
    config::ExecutorConfig,
    engine::{ContainerEngine, ContainerSpec},
    error::Error,
    languages::ExecutionProfile,
    stager::StagedSource,
    types::ResourceLimits,
    Result,
};

/// Lifecycle of one sandbox container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    Created,
    Started,
    Running,
    Exited(Option<i64>),
    Killed,
    /// Removed before it ever started
    Removed,
}

impl SandboxState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SandboxState::Exited(_) | SandboxState::Killed | SandboxState::Removed
        )
    }
}

/// One container, owned by a single run.
///
/// Dropping a handle that has not reached a terminal state (the run future
/// was cancelled) kills the container, or removes it if it never started,
/// on a background task.
pub struct SandboxHandle {
    id: String,
    state: SandboxState,
    engine: Arc<dyn ContainerEngine>,
}

impl SandboxHandle {
    fn new(id: String, engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            id,
            state: SandboxState::Created,
            engine,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SandboxState {
        self.state
    }

    fn transition(&mut self, next: SandboxState) {
        debug!("Container {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }
}

impl Drop for SandboxHandle {
    fn drop(&mut self) {
        if self.state.is_terminal() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("No runtime to clean up container {}", self.id);
            return;
        };

        let id = std::mem::take(&mut self.id);
        let engine = self.engine.clone();
        let started = self.state != SandboxState::Created;
        warn!("Run abandoned, cleaning up container {}", id);

        runtime.spawn(async move {
            let cleanup = if started {
                engine.kill_container(&id).await
            } else {
                engine.remove_container(&id).await
            };
            if let Err(e) = cleanup {
                error!("Failed to clean up container {}: {}", id, e);
            }
        });
    }
}

/// Raw result of one container run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxOutput {
    /// Multiplexed stdout/stderr frames as received
    pub raw: Vec<u8>,
    /// `None` when the exit status could not be read back
    pub exit_code: Option<i64>,
}

/// Runs one resource-constrained container per request
#[derive(Clone)]
pub struct SandboxRunner {
    engine: Arc<dyn ContainerEngine>,
    limits: ResourceLimits,
    working_dir: String,
    timeout: Duration,
}

impl SandboxRunner {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: &ExecutorConfig) -> Self {
        Self {
            engine,
            limits: config.limits.clone(),
            working_dir: config.working_dir.clone(),
            timeout: config.timeout,
        }
    }

    fn container_spec(&self, profile: &ExecutionProfile, staged: &StagedSource) -> ContainerSpec {
        ContainerSpec {
            image: profile.image.to_string(),
            command: profile.container_command(),
            working_dir: self.working_dir.clone(),
            limits: self.limits.clone(),
            source: staged.host_path().display().to_string(),
            target: format!(
                "{}/{}",
                self.working_dir.trim_end_matches('/'),
                profile.source_file
            ),
        }
    }

    /// Execute the staged source and collect its raw output
    pub async fn run(
        &self,
        profile: &ExecutionProfile,
        staged: &StagedSource,
    ) -> Result<SandboxOutput> {
        let spec = self.container_spec(profile, staged);
        let id = self.engine.create_container(&spec).await?;
        let mut handle = SandboxHandle::new(id, self.engine.clone());

        // Attach before start so early output is not lost
        let mut output = match self.engine.attach(handle.id()).await {
            Ok(output) => output,
            Err(e) => {
                self.discard(&mut handle).await;
                return Err(e);
            }
        };

        if let Err(e) = self.engine.start_container(handle.id()).await {
            self.discard(&mut handle).await;
            return Err(e);
        }
        handle.transition(SandboxState::Started);

        let collect = async {
            let mut raw = Vec::new();
            while let Some(chunk) = output.next().await {
                raw.extend_from_slice(&chunk?);
            }
            Ok::<_, Error>(raw)
        };

        handle.transition(SandboxState::Running);
        let raw = match time::timeout(self.timeout, collect).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                self.kill(&mut handle).await;
                return Err(e);
            }
            Err(_) => {
                debug!("Container {} exceeded {:?}", handle.id(), self.timeout);
                self.kill(&mut handle).await;
                return Err(Error::Timeout(self.timeout));
            }
        };

        let exit_code = match self.engine.exit_code(handle.id()).await {
            Ok(code) => Some(code),
            Err(e) => {
                warn!("Exit status of {} unavailable: {}", handle.id(), e);
                None
            }
        };
        handle.transition(SandboxState::Exited(exit_code));

        Ok(SandboxOutput { raw, exit_code })
    }

    async fn kill(&self, handle: &mut SandboxHandle) {
        if handle.state().is_terminal() {
            return;
        }
        if let Err(e) = self.engine.kill_container(handle.id()).await {
            warn!("Failed to kill container {}: {}", handle.id(), e);
        }
        handle.transition(SandboxState::Killed);
    }

    /// Containers that never started do not auto-remove
    async fn discard(&self, handle: &mut SandboxHandle) {
        if let Err(e) = self.engine.remove_container(handle.id()).await {
            warn!("Failed to remove container {}: {}", handle.id(), e);
        }
        handle.transition(SandboxState::Removed);
    }
}
