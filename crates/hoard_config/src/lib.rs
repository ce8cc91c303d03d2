//! Loading and validation of the build cache configuration.
//!
//! The configuration is read from `.hoard/cache.toml` under the build root,
//! overlaid with session properties, and compiled into [`CacheRules`] that
//! answer per-step questions: which parameters are tracked, which are
//! recorded, which steps always run and which may be missing.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod rules;
pub mod types;

pub use error::ConfigError;
pub use loader::{apply_overrides, load_config, load_config_from_str, load_session_config};
pub use rules::{CacheRules, RecordingPolicy};
pub use types::*;
