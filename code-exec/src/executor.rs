use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use crate::{
    config::ExecutorConfig,
    demux::demux,
    engine::ContainerEngine,
    languages::{self, ExecutionProfile},
    provisioner::ImageProvisioner,
    sandbox::{SandboxOutput, SandboxRunner},
    stager::{SourceStager, StagedSource},
    types::{ExecutionRequest, ExecutionResult},
    Result,
};

/// Drives one request through staging, provisioning and the sandbox
pub struct CodeExecutor {
    stager: SourceStager,
    provisioner: ImageProvisioner,
    runner: SandboxRunner,
}

impl CodeExecutor {
    /// Create a new code executor
    pub async fn new(engine: Arc<dyn ContainerEngine>, config: &ExecutorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            stager: SourceStager::new(&config.workspace_dir).await?,
            provisioner: ImageProvisioner::new(engine.clone()),
            runner: SandboxRunner::new(engine, config),
        })
    }

    /// Execute a request. Every failure is reported in the result.
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let start = Instant::now();

        let profile = match languages::lookup(&request.language) {
            Ok(profile) => profile,
            Err(e) => return ExecutionResult::failure(e.to_string(), 0),
        };

        debug!("Starting code execution for language: {}", profile.language);

        let staged = match self.stager.stage(&request.code, profile).await {
            Ok(staged) => staged,
            Err(e) => {
                error!("Code execution failed: {}", e);
                return ExecutionResult::failure(e.to_string(), elapsed_millis(start));
            }
        };

        let outcome = self.run_staged(profile, &staged).await;
        staged.release().await;

        match outcome {
            Ok(output) => assemble(output, elapsed_millis(start)),
            Err(e) => {
                error!("Code execution failed: {}", e);
                ExecutionResult::failure(e.to_string(), elapsed_millis(start))
            }
        }
    }

    async fn run_staged(
        &self,
        profile: &ExecutionProfile,
        staged: &StagedSource,
    ) -> Result<SandboxOutput> {
        self.provisioner.ensure(profile.image).await?;
        self.runner.run(profile, staged).await
    }
}

fn elapsed_millis(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn assemble(output: SandboxOutput, execution_time: u64) -> ExecutionResult {
    let streams = demux(&output.raw);
    let stdout = streams.stdout.trim().to_string();
    let stderr = streams.stderr.trim().to_string();

    match output.exit_code {
        Some(0) => ExecutionResult {
            success: true,
            output: Some(stdout),
            error: None,
            exit_code: Some(0),
            execution_time,
        },
        exit_code => {
            let message = if !stderr.is_empty() {
                stderr
            } else if !stdout.is_empty() {
                stdout
            } else if let Some(code) = exit_code {
                format!("Process exited with code {}", code)
            } else {
                "Exit status unavailable".to_string()
            };

            ExecutionResult {
                success: false,
                output: None,
                error: Some(message),
                exit_code,
                execution_time,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::{encode_frame, STDERR, STDOUT};

    fn output(frames: &[(u8, &str)], exit_code: Option<i64>) -> SandboxOutput {
        SandboxOutput {
            raw: frames
                .iter()
                .flat_map(|(selector, text)| encode_frame(*selector, text.as_bytes()))
                .collect(),
            exit_code,
        }
    }

    #[test]
    fn test_assemble_success_trims_stdout() {
        let result = assemble(output(&[(STDOUT, "hello\n")], Some(0)), 12);
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("hello"));
        assert_eq!(result.error, None);
        assert_eq!(result.execution_time, 12);
    }

    #[test]
    fn test_assemble_failure_prefers_stderr() {
        let result = assemble(
            output(&[(STDOUT, "partial"), (STDERR, "Traceback\n")], Some(1)),
            5,
        );
        assert!(!result.success);
        assert_eq!(result.output, None);
        assert_eq!(result.error.as_deref(), Some("Traceback"));
        assert_eq!(result.exit_code, Some(1));
    }

    #[test]
    fn test_assemble_failure_falls_back_to_stdout() {
        let result = assemble(output(&[(STDOUT, "exit via stdout")], Some(3)), 5);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("exit via stdout"));
    }

    #[test]
    fn test_assemble_silent_failure_names_exit_code() {
        let result = assemble(output(&[], Some(137)), 5);
        assert_eq!(result.error.as_deref(), Some("Process exited with code 137"));
    }

    #[test]
    fn test_assemble_unknown_exit_status() {
        let result = assemble(output(&[(STDOUT, "done")], None), 5);
        assert!(!result.success);
        assert_eq!(result.exit_code, None);
        assert_eq!(result.error.as_deref(), Some("done"));

        let result = assemble(output(&[], None), 5);
        assert_eq!(result.error.as_deref(), Some("Exit status unavailable"));
    }
}
