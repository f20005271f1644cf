//! Error types for dkr-core

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for backend and operational failures
pub const EXIT_FAILURE: i32 = 1;

/// Exit code reserved for an unrecognized verb
pub const EXIT_UNKNOWN_VERB: i32 = 2;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown docker command: {0}")]
    UnknownVerb(String),

    #[error("No command given. Usage: dkr <command> <target> [options]")]
    MissingVerb,

    #[error("\"{0}\" requires at least 1 argument")]
    MissingTarget(String),

    #[error("\"tag\" requires a source image and a target reference")]
    MissingTagReference,

    #[error("\"{0}\" requires a command to run")]
    MissingCommand(String),

    #[error("Invalid value for --{option}: {message}")]
    InvalidOption { option: String, message: String },

    #[error("Cannot read Dockerfile at {path}: {source}")]
    DockerfileNotFound {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Dockerfile parse error on line {line}: {message}")]
    DockerfileParse { line: usize, message: String },

    #[error("Invalid source pattern '{pattern}': {message}")]
    InvalidSourcePattern { pattern: String, message: String },

    #[error("Failed to decode response frame: {0}")]
    Decode(String),

    #[error("only default format supported for now, ignoring --format '{0}'")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(#[from] dkr_config::ConfigError),

    #[error("{0}")]
    Provider(#[from] dkr_provider::ProviderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::UnknownVerb(_) | CoreError::MissingVerb => EXIT_UNKNOWN_VERB,
            _ => EXIT_FAILURE,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
