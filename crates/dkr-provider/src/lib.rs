//! Container engine backend for dkr
//!
//! This crate provides the [`ContainerProvider`] abstraction that every dkr
//! verb is executed against, and a Docker-API implementation on `bollard`.

mod docker;
mod error;
mod types;

pub use docker::{parse_size, DockerProvider};
pub use error::*;
pub use types::*;

use async_trait::async_trait;

/// Trait for container engine backends
///
/// Streaming operations hand back a [`FrameStream`] without consuming it;
/// rendering is the caller's business. The stream may borrow the provider.
#[async_trait]
pub trait ContainerProvider: Send + Sync {
    /// Build an image from the given context files
    async fn build<'a>(&'a self, config: &BuildConfig) -> Result<FrameStream<'a>>;

    /// Pull an image from a registry
    async fn pull<'a>(&'a self, config: &PullConfig) -> Result<FrameStream<'a>>;

    /// Push an image to its registry
    async fn push<'a>(&'a self, image: &str) -> Result<FrameStream<'a>>;

    /// Add a reference to an existing image.
    ///
    /// Without a repository, the image's own repository is reused.
    async fn tag(&self, image: &str, repo: Option<&str>, tag: &str) -> Result<()>;

    /// Create a container from an image
    async fn create(&self, config: &CreateContainerConfig) -> Result<ContainerId>;

    /// Start a container
    async fn start(&self, id: &ContainerId) -> Result<()>;

    /// Stop a container
    async fn stop(&self, id: &ContainerId, timeout: Option<i64>) -> Result<()>;

    /// Wait for a container to exit and return its exit code
    async fn wait(&self, id: &ContainerId) -> Result<i64>;

    /// Remove a container
    async fn remove(&self, id: &ContainerId, force: bool) -> Result<()>;

    /// Execute a command in a running container
    async fn exec(&self, id: &ContainerId, config: &ExecConfig) -> Result<RawOutput>;

    /// Get container logs
    async fn logs(&self, id: &ContainerId, config: &LogConfig) -> Result<RawOutput>;

    /// List containers
    async fn list_containers(&self, config: &ListContainersConfig) -> Result<Vec<ContainerEntry>>;

    /// List images
    async fn list_images(&self, config: &ListImagesConfig) -> Result<Vec<ImageEntry>>;

    /// Check if the engine is reachable
    async fn ping(&self) -> Result<()>;
}

/// Create the Docker provider for the configured engine endpoint
pub async fn create_provider(
    config: &dkr_config::GlobalConfig,
) -> Result<Box<dyn ContainerProvider>> {
    let host = config.engine_host(std::env::var(dkr_config::DOCKER_HOST_ENV).ok());
    tracing::debug!("Connecting to container engine at {}", host);

    match DockerProvider::new(&host, config.engine.timeout).await {
        Ok(provider) => Ok(Box::new(provider)),
        Err(e) => Err(ProviderError::ConnectionError(format_connection_error(&host, &e))),
    }
}

/// Format a helpful connection error message
fn format_connection_error(host: &str, underlying: &ProviderError) -> String {
    let socket = host.trim_start_matches("unix://");
    if socket.starts_with('/') && !std::path::Path::new(socket).exists() {
        format!(
            "Cannot connect to the Docker daemon at {}. Is the docker daemon running?",
            host
        )
    } else {
        format!("{} ({})", host, underlying)
    }
}
