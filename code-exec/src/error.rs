use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Failed to stage source file: {0}")]
    StageFailure(String),

    #[error("Failed to pull image {image}: {reason}")]
    ImagePull { image: String, reason: String },

    #[error("Failed to create container: {0}")]
    ContainerCreate(String),

    #[error("Failed to start container: {0}")]
    ContainerStart(String),

    #[error("Failed to attach to container output: {0}")]
    Attach(String),

    #[error("Execution timeout after {} seconds", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Failed to inspect container: {0}")]
    Inspect(String),

    #[error("Container engine error: {0}")]
    Engine(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
