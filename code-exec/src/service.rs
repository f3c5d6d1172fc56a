use std::sync::Arc;
use tracing::{debug, error, info};

use crate::{
    config::ExecutorConfig,
    engine::{ContainerEngine, DockerEngine},
    executor::CodeExecutor,
    types::{ExecutionRequest, ExecutionResult},
    Result,
};

/// Shareable entry point held by the hosting process
#[derive(Clone)]
pub struct CodeExecutionService {
    executor: Arc<CodeExecutor>,
    engine: Arc<dyn ContainerEngine>,
}

impl CodeExecutionService {
    /// Connect to the local Docker daemon and build the executor
    pub async fn new(config: ExecutorConfig) -> Result<Self> {
        let engine = DockerEngine::connect()?;
        Self::with_engine(config, Arc::new(engine)).await
    }

    pub async fn with_engine(
        config: ExecutorConfig,
        engine: Arc<dyn ContainerEngine>,
    ) -> Result<Self> {
        let executor = CodeExecutor::new(engine.clone(), &config).await?;
        info!(
            "Code execution service ready (workspace: {}, timeout: {:?})",
            config.workspace_dir.display(),
            config.timeout
        );

        Ok(Self {
            executor: Arc::new(executor),
            engine,
        })
    }

    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let language = request.language.clone();
        let result = self.executor.execute(request).await;
        debug!(
            "Execution finished: language={}, success={}, time={}ms",
            language, result.success, result.execution_time
        );
        result
    }

    pub async fn execute_code(&self, code: &str, language: &str) -> ExecutionResult {
        self.execute(ExecutionRequest::new(code, language)).await
    }

    /// Readiness check: whether the container engine answers a ping
    pub async fn health_check(&self) -> bool {
        match self.engine.ping().await {
            Ok(()) => true,
            Err(e) => {
                error!("Container engine is not available: {}", e);
                false
            }
        }
    }
}
