//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the backend can start with zero
//! configuration for local development.

use std::net::SocketAddr;

use placement_shared::constants::DEFAULT_HTTP_PORT;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Human-readable name for this backend instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Placement Dev Backend"`
    pub instance_name: String,

    /// Admin API bearer token. Required to create notifications.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin endpoints disabled).
    pub admin_token: Option<String>,

    /// Whether to seed a demo conversation and notifications at startup.
    /// Env: `SEED_DEMO` (true/false)
    /// Default: `false`
    pub seed_demo: bool,

    /// Capacity of each conversation's live fan-out channel.
    pub live_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            instance_name: "Placement Dev Backend".to_string(),
            admin_token: None,
            seed_demo: false,
            live_buffer: 64,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Ok(token) = std::env::var("ADMIN_TOKEN") {
            if !token.is_empty() {
                config.admin_token = Some(token);
            }
        }

        if let Ok(val) = std::env::var("SEED_DEMO") {
            config.seed_demo = parse_flag(&val);
        }

        config
    }
}

fn parse_flag(val: &str) -> bool {
    val != "false" && val != "0" && !val.is_empty()
}
