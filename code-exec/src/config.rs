use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{error::Error, types::ResourceLimits, Result};

/// Execution engine configuration
///
/// Every field has a default, so a TOML file only needs to name what it
/// overrides:
///
/// ```toml
/// workspace_dir = "/var/tmp/code-execution"
/// timeout_ms = 5000
///
/// [limits]
/// memory_bytes = 268435456
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Host directory shared by all staged source files
    pub workspace_dir: PathBuf,
    /// Wall-clock limit for one container run
    #[serde(rename = "timeout_ms", with = "duration_millis")]
    pub timeout: Duration,
    /// Working directory inside the container; sources are mounted here
    pub working_dir: String,
    /// Per-container resource ceilings
    pub limits: ResourceLimits,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from("/tmp/code-execution"),
            timeout: Duration::from_secs(10),
            working_dir: "/workspace".to_string(),
            limits: ResourceLimits::default(),
        }
    }
}

impl ExecutorConfig {
    /// Load configuration from a TOML file
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        contents.parse()
    }

    pub fn with_workspace_dir(mut self, workspace_dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = workspace_dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be non-zero".to_string()));
        }
        if !self.working_dir.starts_with('/') {
            return Err(Error::Config(format!(
                "working_dir must be absolute: {}",
                self.working_dir
            )));
        }
        if self.limits.memory_bytes <= 0
            || self.limits.cpu_quota <= 0
            || self.limits.cpu_period <= 0
        {
            return Err(Error::Config(
                "resource limits must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::str::FromStr for ExecutorConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: ExecutorConfig =
            toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.limits.memory_bytes, 128 * 1024 * 1024);
        assert_eq!(config.limits.cpu_quota * 2, config.limits.cpu_period);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ExecutorConfig = r#"
            timeout_ms = 2500

            [limits]
            memory_bytes = 67108864
        "#
        .parse()
        .unwrap();

        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.limits.memory_bytes, 64 * 1024 * 1024);
        assert_eq!(config.limits.cpu_quota, 50_000);
        assert_eq!(config.working_dir, "/workspace");
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            "timeout_ms = 0".parse::<ExecutorConfig>(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            r#"working_dir = "relative""#.parse::<ExecutorConfig>(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            "timeout_ms = \"soon\"".parse::<ExecutorConfig>(),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exec.toml");
        tokio::fs::write(&path, "working_dir = \"/code\"\n")
            .await
            .unwrap();

        let config = ExecutorConfig::from_file(&path).await.unwrap();
        assert_eq!(config.working_dir, "/code");

        let missing = ExecutorConfig::from_file(dir.path().join("missing.toml")).await;
        assert!(matches!(missing, Err(Error::Config(_))));
    }
}
