//! Core logic for dkr
//!
//! This crate provides:
//! - Translation of docker-style argument vectors into canonical commands
//! - Build-context resolution from Dockerfile ADD/COPY instructions
//! - Decoding of build, pull and push progress streams
//! - Fixed-width `ps` and `images` tables
//! - Dispatch of commands to a container provider

mod command;
mod context;
mod decode;
mod dispatch;
mod error;
mod table;

pub use command::*;
pub use context::*;
pub use decode::*;
pub use dispatch::*;
pub use error::*;
pub use table::*;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
