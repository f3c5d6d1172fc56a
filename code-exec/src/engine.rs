//! Container engine seam and its Docker implementation

use async_trait::async_trait;
use bollard::{
    container::{
        AttachContainerOptions, Config, CreateContainerOptions, InspectContainerOptions,
        KillContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
    },
    errors::Error as DockerError,
    image::CreateImageOptions,
    models::HostConfig,
    Docker,
};
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use tracing::debug;

use crate::{
    demux::{encode_frame, STDERR, STDIN, STDOUT},
    error::Error,
    types::ResourceLimits,
    Result,
};

/// Raw multiplexed output of an attached container
pub type OutputStream = BoxStream<'static, Result<Bytes>>;

/// Everything needed to create one sandbox container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub command: Vec<String>,
    pub working_dir: String,
    pub limits: ResourceLimits,
    /// Host file mounted read-only at `target`
    pub source: String,
    pub target: String,
}

impl ContainerSpec {
    /// Bind mount definition in the engine's `host:container:mode` syntax
    pub fn bind(&self) -> String {
        format!("{}:{}:ro", self.source, self.target)
    }
}

/// Control-plane operations the executor needs from a container engine
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Check that the engine is reachable
    async fn ping(&self) -> Result<()>;

    /// Whether `image` is present locally
    async fn image_exists(&self, image: &str) -> Result<bool>;

    /// Pull `image` and wait for the pull to finish
    async fn pull_image(&self, image: &str) -> Result<()>;

    /// Create a stopped, auto-removing container and return its id
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    /// Attach to combined stdout/stderr. Must be called before `start_container`.
    async fn attach(&self, id: &str) -> Result<OutputStream>;

    async fn start_container(&self, id: &str) -> Result<()>;

    /// Kill a running container. A container that is already gone is not an error.
    async fn kill_container(&self, id: &str) -> Result<()>;

    /// Force-remove a container that never started
    async fn remove_container(&self, id: &str) -> Result<()>;

    /// Exit code of a finished container
    async fn exit_code(&self, id: &str) -> Result<i64>;
}

/// `ContainerEngine` backed by the local Docker daemon
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect using the platform default socket (or `DOCKER_HOST`)
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::Engine(format!("Failed to connect to Docker: {}", e)))?;
        Ok(Self { docker })
    }

    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }
}

fn is_status(err: &DockerError, codes: &[u16]) -> bool {
    matches!(
        err,
        DockerError::DockerResponseServerError { status_code, .. } if codes.contains(status_code)
    )
}

fn into_frame(output: LogOutput) -> Bytes {
    let frame = match output {
        LogOutput::StdOut { message } | LogOutput::Console { message } => {
            encode_frame(STDOUT, &message)
        }
        LogOutput::StdErr { message } => encode_frame(STDERR, &message),
        LogOutput::StdIn { message } => encode_frame(STDIN, &message),
    };
    Bytes::from(frame)
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| Error::Engine(e.to_string()))
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(e) if is_status(&e, &[404]) => Ok(false),
            Err(e) => Err(Error::Engine(e.to_string())),
        }
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            let info = progress.map_err(|e| Error::ImagePull {
                image: image.to_string(),
                reason: e.to_string(),
            })?;
            if let Some(status) = info.status {
                debug!("Pull {}: {}", image, status);
            }
        }

        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            working_dir: Some(spec.working_dir.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            network_disabled: Some(true),
            host_config: Some(HostConfig {
                memory: Some(spec.limits.memory_bytes),
                cpu_quota: Some(spec.limits.cpu_quota),
                cpu_period: Some(spec.limits.cpu_period),
                network_mode: Some("none".to_string()),
                readonly_rootfs: Some(false),
                binds: Some(vec![spec.bind()]),
                auto_remove: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(|e| Error::ContainerCreate(e.to_string()))?;

        for warning in &response.warnings {
            debug!("Container {} warning: {}", response.id, warning);
        }

        Ok(response.id)
    }

    async fn attach(&self, id: &str) -> Result<OutputStream> {
        let options = AttachContainerOptions::<String> {
            stdout: Some(true),
            stderr: Some(true),
            stream: Some(true),
            ..Default::default()
        };

        let attached = self
            .docker
            .attach_container(id, Some(options))
            .await
            .map_err(|e| Error::Attach(e.to_string()))?;

        // bollard already splits the frames; re-encode them so callers get
        // the engine's wire format regardless of backend
        Ok(attached
            .output
            .map_ok(into_frame)
            .map_err(|e| Error::Attach(e.to_string()))
            .boxed())
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::ContainerStart(e.to_string()))
    }

    async fn kill_container(&self, id: &str) -> Result<()> {
        match self
            .docker
            .kill_container(id, None::<KillContainerOptions<String>>)
            .await
        {
            Ok(()) => Ok(()),
            // 404: already auto-removed, 409: not running
            Err(e) if is_status(&e, &[404, 409]) => {
                debug!("Container {} already stopped", id);
                Ok(())
            }
            Err(e) => Err(Error::Engine(e.to_string())),
        }
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        match self.docker.remove_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if is_status(&e, &[404, 409]) => Ok(()),
            Err(e) => Err(Error::Engine(e.to_string())),
        }
    }

    async fn exit_code(&self, id: &str) -> Result<i64> {
        let info = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| Error::Inspect(e.to_string()))?;

        info.state
            .and_then(|state| state.exit_code)
            .ok_or_else(|| Error::Inspect(format!("No exit code reported for {}", id)))
    }
}
