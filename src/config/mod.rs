//! Application configuration.
//!
//! Loaded from TOML; every field has a default so a missing file or a
//! partial file is valid.

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{ApiConfig, Config, EventsConfig, RouterConfig, RouterModeKind, TemplatesConfig};
