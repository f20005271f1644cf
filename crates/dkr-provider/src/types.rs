//! Request and response types shared by every provider

use crate::{ProviderError, Result};
use futures::Stream;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Container ID wrapper
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        truncate_id(&self.0)
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ContainerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// First 12 characters of an identifier, the docker short form
pub fn truncate_id(id: &str) -> &str {
    match id.char_indices().nth(12) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Split an image reference into repository and optional tag.
///
/// Only a colon after the last `/` separates a tag, so registry ports
/// (`localhost:5000/app`) stay part of the repository.
pub fn split_image_reference(reference: &str) -> (&str, Option<&str>) {
    let name_start = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
    match reference[name_start..].rfind(':') {
        Some(i) => {
            let split = name_start + i;
            (&reference[..split], Some(&reference[split + 1..]))
        }
        None => (reference, None),
    }
}

/// Image build request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConfig {
    /// Build root directory
    pub context: PathBuf,
    /// Dockerfile path relative to the build root
    pub dockerfile: String,
    /// Files to ship to the engine, absolute paths under `context`
    pub files: Vec<PathBuf>,
    pub tag: Option<String>,
    pub extra_hosts: Vec<String>,
    pub quiet: bool,
    pub no_cache: bool,
    pub cache_from: Vec<String>,
    pub pull: bool,
    /// Remove intermediate containers; the engine default applies when unset
    pub rm: Option<bool>,
    pub force_rm: bool,
    /// Memory limit as typed by the user (`512m`, `2g`, bytes)
    pub memory: Option<String>,
    /// Memory plus swap limit as typed by the user, `-1` for unlimited
    pub memory_swap: Option<String>,
    pub cpu_shares: Option<i64>,
    pub cpuset_cpus: Option<String>,
    pub cpuset_mems: Option<String>,
    pub cpu_period: Option<i64>,
    pub cpu_quota: Option<i64>,
    pub build_args: HashMap<String, String>,
    /// Size of /dev/shm as typed by the user
    pub shm_size: Option<String>,
    pub squash: bool,
    pub labels: HashMap<String, String>,
    pub network_mode: Option<String>,
    pub platform: Option<String>,
}

/// Image pull request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullConfig {
    pub image: String,
    pub platform: Option<String>,
}

/// Configuration for creating a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateContainerConfig {
    pub image: String,
    pub name: Option<String>,
    pub cmd: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    /// `KEY=value` pairs
    pub env: Vec<String>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub hostname: Option<String>,
    pub tty: bool,
    pub attach_stdin: bool,
    pub mac_address: Option<String>,
    pub stop_signal: Option<String>,
    pub stop_timeout: Option<i64>,
}

/// Exec configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecConfig {
    pub cmd: Vec<String>,
    /// `KEY=value` pairs
    pub env: Vec<String>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub tty: bool,
    pub stdin: bool,
    pub privileged: bool,
}

/// Log configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub follow: bool,
    pub stdout: bool,
    pub stderr: bool,
    /// Number of lines from the end, or `all`
    pub tail: Option<String>,
    pub timestamps: bool,
    /// Unix timestamp
    pub since: Option<i64>,
    /// Unix timestamp
    pub until: Option<i64>,
}

/// Container listing request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListContainersConfig {
    pub all: bool,
    pub limit: Option<i64>,
    pub size: bool,
    pub filters: HashMap<String, Vec<String>>,
}

/// Image listing request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListImagesConfig {
    pub all: bool,
    pub digests: bool,
    pub filters: HashMap<String, Vec<String>>,
}

/// One row of a container listing
#[derive(Debug, Clone, Default)]
pub struct ContainerEntry {
    pub id: String,
    pub image: String,
    pub command: String,
    /// Unix timestamp
    pub created: i64,
    pub status: String,
    pub ports: Vec<PortInfo>,
    pub names: Vec<String>,
}

/// Port information
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub container_port: u16,
    pub host_port: Option<u16>,
    pub protocol: String,
    pub host_ip: Option<String>,
}

impl std::fmt::Display for PortInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.host_port {
            Some(host_port) => write!(
                f,
                "{}:{}->{}/{}",
                self.host_ip.as_deref().unwrap_or("0.0.0.0"),
                host_port,
                self.container_port,
                self.protocol
            ),
            None => write!(f, "{}/{}", self.container_port, self.protocol),
        }
    }
}

/// One image of an image listing
#[derive(Debug, Clone, Default)]
pub struct ImageEntry {
    /// Full content-addressed id (`sha256:...`)
    pub id: String,
    pub repo_tags: Vec<String>,
    /// Unix timestamp
    pub created: i64,
    /// Bytes
    pub size: i64,
}

/// One JSON frame of a build, pull or push progress stream
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub stream: Option<String>,
    pub status: Option<String>,
    pub id: Option<String>,
    pub progress: Option<String>,
    pub error: Option<String>,
    pub error_detail: Option<ErrorDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorDetail {
    pub code: Option<i64>,
    pub message: Option<String>,
}

impl Frame {
    /// Parse one self-contained frame
    #[cfg(test)]
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    /// Error message carried by the frame, if any
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or_else(|| self.error_detail.as_ref().and_then(|d| d.message.as_deref()))
            .filter(|e| !e.trim().is_empty())
    }
}

/// Live stream of progress frames, possibly borrowing the engine client
pub type FrameStream<'a> = Pin<Box<dyn Stream<Item = Result<Frame>> + Send + 'a>>;

/// Unstructured command output (exec, logs)
pub enum RawOutput {
    /// Complete payload, printed as text
    Bytes(Vec<u8>),
    /// Plain value, printed as is
    Value(String),
    /// Live byte stream, forwarded untouched
    Stream(Pin<Box<dyn AsyncRead + Send>>),
}

impl std::fmt::Debug for RawOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_id() {
        assert_eq!(truncate_id("0123456789abcdef"), "0123456789ab");
        assert_eq!(truncate_id("abc"), "abc");
        assert_eq!(ContainerId::new("0123456789abcdef").short(), "0123456789ab");
    }

    #[test]
    fn test_split_image_reference() {
        assert_eq!(split_image_reference("nginx"), ("nginx", None));
        assert_eq!(split_image_reference("nginx:1.25"), ("nginx", Some("1.25")));
        assert_eq!(
            split_image_reference("localhost:5000/app"),
            ("localhost:5000/app", None)
        );
        assert_eq!(
            split_image_reference("localhost:5000/team/app:v2"),
            ("localhost:5000/team/app", Some("v2"))
        );
    }

    #[test]
    fn test_frame_parse() {
        let frame = Frame::from_slice(br#"{"id":"a1b2","status":"Downloading"}"#).unwrap();
        assert_eq!(frame.id.as_deref(), Some("a1b2"));
        assert_eq!(frame.status.as_deref(), Some("Downloading"));
        assert!(frame.error_message().is_none());
    }

    #[test]
    fn test_frame_error_detail_fallback() {
        let frame =
            Frame::from_slice(br#"{"errorDetail":{"message":"manifest unknown"}}"#).unwrap();
        assert_eq!(frame.error_message(), Some("manifest unknown"));
    }

    #[test]
    fn test_frame_parse_failure_is_decode_error() {
        assert!(matches!(
            Frame::from_slice(b"{not json"),
            Err(ProviderError::Decode(_))
        ));
    }

    #[test]
    fn test_port_display() {
        let published = PortInfo {
            container_port: 80,
            host_port: Some(8080),
            protocol: "tcp".to_string(),
            host_ip: Some("0.0.0.0".to_string()),
        };
        assert_eq!(published.to_string(), "0.0.0.0:8080->80/tcp");

        let exposed = PortInfo {
            container_port: 53,
            host_port: None,
            protocol: "udp".to_string(),
            host_ip: None,
        };
        assert_eq!(exposed.to_string(), "53/udp");
    }
}
