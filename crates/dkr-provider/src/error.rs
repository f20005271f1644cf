//! Error types for container providers

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to connect to container engine: {0}")]
    ConnectionError(String),

    #[error("No such object: {0}")]
    NotFound(String),

    #[error("Build failed: {0}")]
    BuildError(String),

    #[error("Exec failed: {0}")]
    ExecError(String),

    #[error("Container engine error: {0}")]
    RuntimeError(String),

    #[error("Malformed response frame: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<bollard::errors::Error> for ProviderError {
    fn from(e: bollard::errors::Error) -> Self {
        use bollard::errors::Error;

        match e {
            Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => ProviderError::NotFound(message),
            Error::DockerResponseServerError { message, .. } => {
                ProviderError::RuntimeError(message)
            }
            Error::JsonDataError { .. } | Error::JsonSerdeError { .. } => {
                ProviderError::Decode(e.to_string())
            }
            Error::IOError { err } => ProviderError::IoError(err),
            other => ProviderError::RuntimeError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
