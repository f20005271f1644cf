//! Test support utilities for dkr-core
//!
//! Provides MockProvider for exercising the dispatcher without a running
//! container engine.

use async_trait::async_trait;
use dkr_provider::*;
use std::sync::{Arc, Mutex};

/// Records which methods were called on the mock
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Build(BuildConfig),
    Pull(PullConfig),
    Push { image: String },
    Tag { image: String, repo: Option<String>, tag: String },
    Create(CreateContainerConfig),
    Start { id: String },
    Stop { id: String, timeout: Option<i64> },
    Wait { id: String },
    Remove { id: String, force: bool },
    Exec { id: String, config: ExecConfig },
    Logs { id: String, config: LogConfig },
    ListContainers(ListContainersConfig),
    ListImages(ListImagesConfig),
    Ping,
}

/// Configurable mock container provider for testing
pub struct MockProvider {
    pub calls: Arc<Mutex<Vec<MockCall>>>,
    /// Frames streamed back by build calls
    pub build_frames: Arc<Mutex<Vec<Result<Frame>>>>,
    /// Frames streamed back by pull calls
    pub pull_frames: Arc<Mutex<Vec<Result<Frame>>>>,
    /// Frames streamed back by push calls
    pub push_frames: Arc<Mutex<Vec<Result<Frame>>>>,
    pub tag_result: Arc<Mutex<Result<()>>>,
    pub create_result: Arc<Mutex<Result<ContainerId>>>,
    pub start_result: Arc<Mutex<Result<()>>>,
    pub stop_result: Arc<Mutex<Result<()>>>,
    /// Exit code reported by wait calls
    pub wait_result: Arc<Mutex<Result<i64>>>,
    pub remove_result: Arc<Mutex<Result<()>>>,
    /// Bytes streamed back by exec calls
    pub exec_output: Arc<Mutex<Result<Vec<u8>>>>,
    /// Bytes streamed back by logs calls
    pub logs_output: Arc<Mutex<Result<Vec<u8>>>>,
    pub containers: Arc<Mutex<Result<Vec<ContainerEntry>>>>,
    pub images: Arc<Mutex<Result<Vec<ImageEntry>>>>,
    pub ping_result: Arc<Mutex<Result<()>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a new mock provider with default success results
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            build_frames: Arc::new(Mutex::new(Vec::new())),
            pull_frames: Arc::new(Mutex::new(Vec::new())),
            push_frames: Arc::new(Mutex::new(Vec::new())),
            tag_result: Arc::new(Mutex::new(Ok(()))),
            create_result: Arc::new(Mutex::new(Ok(ContainerId::new("mock_container_id")))),
            start_result: Arc::new(Mutex::new(Ok(()))),
            stop_result: Arc::new(Mutex::new(Ok(()))),
            wait_result: Arc::new(Mutex::new(Ok(0))),
            remove_result: Arc::new(Mutex::new(Ok(()))),
            exec_output: Arc::new(Mutex::new(Ok(Vec::new()))),
            logs_output: Arc::new(Mutex::new(Ok(Vec::new()))),
            containers: Arc::new(Mutex::new(Ok(Vec::new()))),
            images: Arc::new(Mutex::new(Ok(Vec::new()))),
            ping_result: Arc::new(Mutex::new(Ok(()))),
        }
    }

    /// Replace the frames returned by build calls
    pub fn with_build_frames(self, frames: Vec<Result<Frame>>) -> Self {
        *self.build_frames.lock().unwrap() = frames;
        self
    }

    /// Replace the frames returned by pull calls
    pub fn with_pull_frames(self, frames: Vec<Result<Frame>>) -> Self {
        *self.pull_frames.lock().unwrap() = frames;
        self
    }

    /// Record a call
    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Check if a specific call was made
    pub fn was_called(&self, call: &MockCall) -> bool {
        self.calls.lock().unwrap().contains(call)
    }
}

/// Helper to clone a Result<T> from an Arc<Mutex<Result<T>>>
fn clone_result<T: Clone>(r: &Arc<Mutex<Result<T>>>) -> Result<T> {
    let guard = r.lock().unwrap();
    match &*guard {
        Ok(v) => Ok(v.clone()),
        Err(e) => Err(clone_provider_error(e)),
    }
}

/// Clone a ProviderError (thiserror types don't implement Clone)
fn clone_provider_error(e: &ProviderError) -> ProviderError {
    match e {
        ProviderError::ConnectionError(s) => ProviderError::ConnectionError(s.clone()),
        ProviderError::NotFound(s) => ProviderError::NotFound(s.clone()),
        ProviderError::BuildError(s) => ProviderError::BuildError(s.clone()),
        ProviderError::ExecError(s) => ProviderError::ExecError(s.clone()),
        ProviderError::RuntimeError(s) => ProviderError::RuntimeError(s.clone()),
        ProviderError::Decode(s) => ProviderError::Decode(s.clone()),
        ProviderError::InvalidRequest(s) => ProviderError::InvalidRequest(s.clone()),
        ProviderError::IoError(_) => ProviderError::RuntimeError("IO error (cloned)".into()),
    }
}

fn frame_stream(frames: &Arc<Mutex<Vec<Result<Frame>>>>) -> FrameStream<'static> {
    let frames: Vec<Result<Frame>> = frames
        .lock()
        .unwrap()
        .iter()
        .map(|f| match f {
            Ok(frame) => Ok(frame.clone()),
            Err(e) => Err(clone_provider_error(e)),
        })
        .collect();
    Box::pin(futures::stream::iter(frames))
}

fn byte_stream(output: &Arc<Mutex<Result<Vec<u8>>>>) -> Result<RawOutput> {
    let bytes = clone_result(output)?;
    Ok(RawOutput::Stream(Box::pin(std::io::Cursor::new(bytes))))
}

/// A `stream` frame, as sent during builds
pub fn text_frame(text: &str) -> Frame {
    Frame {
        stream: Some(text.to_string()),
        ..Default::default()
    }
}

/// A `status` frame, optionally tied to a layer id
pub fn status_frame(id: Option<&str>, status: &str) -> Frame {
    Frame {
        id: id.map(str::to_string),
        status: Some(status.to_string()),
        ..Default::default()
    }
}

/// An `error` frame
pub fn error_frame(message: &str) -> Frame {
    Frame {
        error: Some(message.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl ContainerProvider for MockProvider {
    async fn build<'a>(&'a self, config: &BuildConfig) -> Result<FrameStream<'a>> {
        self.record(MockCall::Build(config.clone()));
        Ok(frame_stream(&self.build_frames))
    }

    async fn pull<'a>(&'a self, config: &PullConfig) -> Result<FrameStream<'a>> {
        self.record(MockCall::Pull(config.clone()));
        Ok(frame_stream(&self.pull_frames))
    }

    async fn push<'a>(&'a self, image: &str) -> Result<FrameStream<'a>> {
        self.record(MockCall::Push {
            image: image.to_string(),
        });
        Ok(frame_stream(&self.push_frames))
    }

    async fn tag(&self, image: &str, repo: Option<&str>, tag: &str) -> Result<()> {
        self.record(MockCall::Tag {
            image: image.to_string(),
            repo: repo.map(str::to_string),
            tag: tag.to_string(),
        });
        clone_result(&self.tag_result)
    }

    async fn create(&self, config: &CreateContainerConfig) -> Result<ContainerId> {
        self.record(MockCall::Create(config.clone()));
        clone_result(&self.create_result)
    }

    async fn start(&self, id: &ContainerId) -> Result<()> {
        self.record(MockCall::Start { id: id.0.clone() });
        clone_result(&self.start_result)
    }

    async fn stop(&self, id: &ContainerId, timeout: Option<i64>) -> Result<()> {
        self.record(MockCall::Stop {
            id: id.0.clone(),
            timeout,
        });
        clone_result(&self.stop_result)
    }

    async fn wait(&self, id: &ContainerId) -> Result<i64> {
        self.record(MockCall::Wait { id: id.0.clone() });
        clone_result(&self.wait_result)
    }

    async fn remove(&self, id: &ContainerId, force: bool) -> Result<()> {
        self.record(MockCall::Remove {
            id: id.0.clone(),
            force,
        });
        clone_result(&self.remove_result)
    }

    async fn exec(&self, id: &ContainerId, config: &ExecConfig) -> Result<RawOutput> {
        self.record(MockCall::Exec {
            id: id.0.clone(),
            config: config.clone(),
        });
        byte_stream(&self.exec_output)
    }

    async fn logs(&self, id: &ContainerId, config: &LogConfig) -> Result<RawOutput> {
        self.record(MockCall::Logs {
            id: id.0.clone(),
            config: config.clone(),
        });
        byte_stream(&self.logs_output)
    }

    async fn list_containers(&self, config: &ListContainersConfig) -> Result<Vec<ContainerEntry>> {
        self.record(MockCall::ListContainers(config.clone()));
        clone_result(&self.containers)
    }

    async fn list_images(&self, config: &ListImagesConfig) -> Result<Vec<ImageEntry>> {
        self.record(MockCall::ListImages(config.clone()));
        clone_result(&self.images)
    }

    async fn ping(&self) -> Result<()> {
        self.record(MockCall::Ping);
        clone_result(&self.ping_result)
    }
}
