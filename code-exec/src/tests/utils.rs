pub mod defaults {
    use crate::ExecutorConfig;
    use std::path::Path;
    use tokio::time::Duration;

    pub fn short_timeout() -> Duration {
        Duration::from_millis(300)
    }

    pub fn test_config(workspace: &Path) -> ExecutorConfig {
        ExecutorConfig::default()
            .with_workspace_dir(workspace)
            .with_timeout(short_timeout())
    }
}

pub mod engine {
    use crate::{
        demux::{encode_frame, STDERR, STDOUT},
        ContainerEngine, ContainerSpec, Error, OutputStream, Result,
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::{stream, StreamExt};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// How the scripted engine responds
    #[derive(Debug, Clone)]
    pub struct Behavior {
        pub ping_fails: bool,
        pub image_present: bool,
        pub inspect_image_fails: bool,
        pub pull_fails: bool,
        pub create_fails: bool,
        pub attach_fails: bool,
        pub start_fails: bool,
        /// Emit output, then never finish the stream
        pub hang: bool,
        pub exit_code_fails: bool,
        pub exit_code: i64,
        /// Extra stderr frame emitted after the echoed source
        pub stderr: Option<String>,
    }

    impl Default for Behavior {
        fn default() -> Self {
            Self {
                ping_fails: false,
                image_present: true,
                inspect_image_fails: false,
                pull_fails: false,
                create_fails: false,
                attach_fails: false,
                start_fails: false,
                hang: false,
                exit_code_fails: false,
                exit_code: 0,
                stderr: None,
            }
        }
    }

    #[derive(Debug, Default)]
    pub struct Calls {
        /// Every engine call, in the order it was made
        pub events: Vec<&'static str>,
        pub pings: usize,
        pub image_checks: Vec<String>,
        pub pulls: Vec<String>,
        pub created: Vec<ContainerSpec>,
        pub attached: Vec<String>,
        pub started: Vec<String>,
        pub killed: Vec<String>,
        pub removed: Vec<String>,
        pub inspected: Vec<String>,
    }

    impl Calls {
        pub fn total(&self) -> usize {
            self.pings
                + self.image_checks.len()
                + self.pulls.len()
                + self.created.len()
                + self.attached.len()
                + self.started.len()
                + self.killed.len()
                + self.removed.len()
                + self.inspected.len()
        }
    }

    /// In-memory engine whose containers echo their mounted source file to
    /// stdout, split into small chunks
    #[derive(Default)]
    pub struct FakeEngine {
        behavior: Behavior,
        next_id: AtomicUsize,
        containers: Mutex<HashMap<String, ContainerSpec>>,
        pub calls: Mutex<Calls>,
    }

    impl FakeEngine {
        pub fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                ..Default::default()
            }
        }

        pub fn calls(&self) -> std::sync::MutexGuard<'_, Calls> {
            self.calls.lock().unwrap()
        }

        fn record(&self, event: &'static str) -> std::sync::MutexGuard<'_, Calls> {
            let mut calls = self.calls();
            calls.events.push(event);
            calls
        }

        fn output_for(&self, spec: &ContainerSpec) -> Vec<u8> {
            let source = std::fs::read(&spec.source).unwrap_or_default();
            let mut raw = encode_frame(STDOUT, &source);
            if let Some(stderr) = &self.behavior.stderr {
                raw.extend(encode_frame(STDERR, stderr.as_bytes()));
            }
            raw
        }
    }

    #[async_trait]
    impl ContainerEngine for FakeEngine {
        async fn ping(&self) -> Result<()> {
            self.record("ping").pings += 1;
            if self.behavior.ping_fails {
                return Err(Error::Engine("connection refused".to_string()));
            }
            Ok(())
        }

        async fn image_exists(&self, image: &str) -> Result<bool> {
            self.record("image_exists").image_checks.push(image.to_string());
            if self.behavior.inspect_image_fails {
                return Err(Error::Engine("inspect failed".to_string()));
            }
            Ok(self.behavior.image_present)
        }

        async fn pull_image(&self, image: &str) -> Result<()> {
            self.record("pull").pulls.push(image.to_string());
            if self.behavior.pull_fails {
                return Err(Error::ImagePull {
                    image: image.to_string(),
                    reason: "manifest unknown".to_string(),
                });
            }
            Ok(())
        }

        async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
            self.record("create").created.push(spec.clone());
            if self.behavior.create_fails {
                return Err(Error::ContainerCreate("no space left".to_string()));
            }
            let id = format!("fake-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            self.containers
                .lock()
                .unwrap()
                .insert(id.clone(), spec.clone());
            Ok(id)
        }

        async fn attach(&self, id: &str) -> Result<OutputStream> {
            self.record("attach").attached.push(id.to_string());
            if self.behavior.attach_fails {
                return Err(Error::Attach("hijack failed".to_string()));
            }

            let spec = self
                .containers
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| Error::Attach(format!("no such container: {}", id)))?;

            // Read at attach time while the staged file still exists
            let raw = self.output_for(&spec);
            let chunks: Vec<Result<Bytes>> = raw
                .chunks(3)
                .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                .collect();

            if self.behavior.hang {
                Ok(stream::iter(chunks).chain(stream::pending()).boxed())
            } else {
                Ok(stream::iter(chunks).boxed())
            }
        }

        async fn start_container(&self, id: &str) -> Result<()> {
            self.record("start").started.push(id.to_string());
            if self.behavior.start_fails {
                return Err(Error::ContainerStart("oci runtime error".to_string()));
            }
            Ok(())
        }

        async fn kill_container(&self, id: &str) -> Result<()> {
            self.record("kill").killed.push(id.to_string());
            self.containers.lock().unwrap().remove(id);
            Ok(())
        }

        async fn remove_container(&self, id: &str) -> Result<()> {
            self.record("remove").removed.push(id.to_string());
            self.containers.lock().unwrap().remove(id);
            Ok(())
        }

        async fn exit_code(&self, id: &str) -> Result<i64> {
            self.record("exit_code").inspected.push(id.to_string());
            if self.behavior.exit_code_fails {
                return Err(Error::Inspect(format!("no such container: {}", id)));
            }
            Ok(self.behavior.exit_code)
        }
    }
}

pub mod docker {
    use crate::{ContainerEngine, DockerEngine};

    /// Connect to a reachable Docker daemon, or `None` so the caller can skip
    pub async fn docker_engine() -> Option<DockerEngine> {
        let engine = DockerEngine::connect().ok()?;
        match engine.ping().await {
            Ok(()) => Some(engine),
            Err(e) => {
                eprintln!("Skipping test: Docker not available ({})", e);
                None
            }
        }
    }
}
