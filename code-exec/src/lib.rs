//! # Code Execution Service
//!
//! Runs untrusted code snippets inside short-lived Docker containers.
//! Every run gets its own network-less, memory and CPU limited container that
//! is removed when it exits, and every outcome, including engine failures and
//! timeouts, is reported as an [`ExecutionResult`].

mod config;
pub mod demux;
mod engine;
mod error;
mod executor;
mod languages;
mod provisioner;
mod sandbox;
mod service;
mod stager;
mod types;

#[cfg(test)]
mod tests;

pub use config::ExecutorConfig;
pub use engine::{ContainerEngine, ContainerSpec, DockerEngine, OutputStream};
pub use error::Error;
pub use executor::CodeExecutor;
pub use languages::{lookup, ExecutionProfile};
pub use provisioner::ImageProvisioner;
pub use sandbox::{SandboxHandle, SandboxOutput, SandboxRunner, SandboxState};
pub use service::CodeExecutionService;
pub use stager::{SourceStager, StagedSource};
pub use types::{ExecutionRequest, ExecutionResult, Language, ResourceLimits};

/// Result type for code execution operations
pub type Result<T> = std::result::Result<T, Error>;
