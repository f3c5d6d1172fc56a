use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{engine::ContainerEngine, error::Error, Result};

/// Makes sure images are present locally before a container is created
#[derive(Clone)]
pub struct ImageProvisioner {
    engine: Arc<dyn ContainerEngine>,
}

impl ImageProvisioner {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// Pull `image` unless it is already present.
    ///
    /// Concurrent calls for the same missing image may each pull it; the
    /// engine stores the layers once.
    pub async fn ensure(&self, image: &str) -> Result<()> {
        match self.engine.image_exists(image).await {
            Ok(true) => {
                debug!("Image {} present locally", image);
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => warn!("Failed to inspect image {}, pulling: {}", image, e),
        }

        info!("Pulling image: {}", image);
        self.engine.pull_image(image).await.map_err(|e| match e {
            Error::ImagePull { .. } => e,
            other => Error::ImagePull {
                image: image.to_string(),
                reason: other.to_string(),
            },
        })?;
        info!("Pulled image: {}", image);

        Ok(())
    }
}
