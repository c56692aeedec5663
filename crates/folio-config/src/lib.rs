//! Configuration system for folio.
//!
//! Provides TOML-based configuration with:
//! - The MCP endpoint to fetch from (`[server]`)
//! - How the login handshake waits for the human (`[auth]`)
//! - Which portfolio resources to fetch (`[portfolio]`)
//! - Config file layering (user config + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigLayer, ConfigSource, LoadedConfig, SourceStatus, config_dir, load_config,
    load_config_file, load_config_with_options, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
