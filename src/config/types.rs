use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
}

/// Addressing scheme used by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterModeKind {
    /// Canonical path carried in one query key (`?page=users/1`).
    #[default]
    Param,
    /// Path carried in the fragment (`#/users/1`).
    Hash,
    /// Raw pathname (`/users/1`).
    History,
}

/// Router settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Addressing mode (default: param).
    #[serde(default)]
    pub mode: RouterModeKind,
    /// Query key reserved by param mode (default: "page").
    #[serde(default = "default_query_key")]
    pub query_key: String,
    /// Container pages render into (default: "#app").
    #[serde(default = "default_root_container")]
    pub root_container: String,
    /// Path routed by `Router::start` when the location is empty (default: "/").
    #[serde(default = "default_initial_path")]
    pub initial_path: String,
}

/// REST API settings used by the HTTP transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint is joined onto.
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    /// Connection timeout in seconds (default: 5).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
}

/// Event bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Soft per-event listener limit; exceeding it only warns (default: 100).
    #[serde(default = "default_max_listeners")]
    pub max_listeners: usize,
}

/// Named template settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Directory holding `<name>.html` templates.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_query_key() -> String {
    "page".to_string()
}

fn default_root_container() -> String {
    "#app".to_string()
}

fn default_initial_path() -> String {
    "/".to_string()
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:8080/api".to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_max_listeners() -> usize {
    100
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            mode: RouterModeKind::default(),
            query_key: default_query_key(),
            root_container: default_root_container(),
            initial_path: default_initial_path(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            max_listeners: default_max_listeners(),
        }
    }
}
