//! Configuration for dkr
//!
//! Global configuration lives at `~/.config/dkr/config.toml` and can be
//! redirected with `DKR_CONFIG`. Every section is optional.

mod error;
mod global;

pub use error::*;
pub use global::*;
