//! Client configuration loaded from environment variables.
//!
//! Every setting has a default pointing at a locally running backend.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use placement_shared::constants::{
    DEFAULT_HTTP_PORT, DEFAULT_NOTIFICATION_PAGE_SIZE, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS, LIVE_CHANNEL_PATH, MAX_NOTIFICATION_PAGE_SIZE,
};
use placement_shared::{ConversationId, SenderRole};

use crate::error::{ClientError, Result};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every endpoint is resolved against. Always ends with `/`.
    /// Env: `PLACEMENT_API_URL`
    /// Default: `http://127.0.0.1:8080/`
    pub api_url: Url,

    /// Interval between unread-count polls.
    /// Env: `PLACEMENT_POLL_SECS`
    /// Default: 30 s
    pub poll_interval: Duration,

    /// Page size of the notification list fetched on expansion.
    /// Env: `PLACEMENT_PAGE_SIZE`
    /// Default: 10
    pub page_size: u32,

    /// Per-request HTTP timeout.
    /// Env: `PLACEMENT_TIMEOUT_SECS`
    /// Default: 15 s
    pub request_timeout: Duration,

    /// Where the session (subject id, bearer token) is persisted.
    /// Env: `PLACEMENT_SESSION_FILE`
    /// Default: `None` (platform data directory).
    pub session_file: Option<PathBuf>,

    /// Capacity of the live event and client event channels.
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            page_size: DEFAULT_NOTIFICATION_PAGE_SIZE,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            session_file: None,
            event_buffer: 64,
        }
    }
}

impl ClientConfig {
    /// Configuration for a backend at `api_url`, all other settings default.
    pub fn with_api_url(api_url: &str) -> Result<Self> {
        Ok(Self {
            api_url: normalize_base(Url::parse(api_url)?)?,
            ..Self::default()
        })
    }

    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("PLACEMENT_API_URL") {
            match Url::parse(&raw)
                .map_err(ClientError::from)
                .and_then(normalize_base)
            {
                Ok(url) => config.api_url = url,
                Err(e) => {
                    tracing::warn!(value = %raw, error = %e, "Invalid PLACEMENT_API_URL, using default");
                }
            }
        }

        if let Ok(val) = std::env::var("PLACEMENT_POLL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.poll_interval = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid PLACEMENT_POLL_SECS, using default"),
            }
        }

        if let Ok(val) = std::env::var("PLACEMENT_PAGE_SIZE") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.page_size = n.min(MAX_NOTIFICATION_PAGE_SIZE),
                _ => tracing::warn!(value = %val, "Invalid PLACEMENT_PAGE_SIZE, using default"),
            }
        }

        if let Ok(val) = std::env::var("PLACEMENT_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid PLACEMENT_TIMEOUT_SECS, using default"),
            }
        }

        if let Ok(path) = std::env::var("PLACEMENT_SESSION_FILE") {
            if !path.is_empty() {
                config.session_file = Some(PathBuf::from(path));
            }
        }

        config
    }

    /// Resolve an HTTP endpoint from path segments. Segments are
    /// percent-encoded, so ids may contain any character.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config(format!("{} cannot be a base URL", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Live channel address for one conversation, tagged with the local role.
    pub fn live_url(&self, conversation: &ConversationId, role: SenderRole) -> Result<Url> {
        let mut url = self.endpoint(&[LIVE_CHANNEL_PATH])?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::Config(format!("cannot derive a {scheme} URL")))?;
        url.query_pairs_mut()
            .append_pair("conversation", conversation.as_str())
            .append_pair("role", role.as_str());
        Ok(url)
    }
}

fn default_api_url() -> Url {
    Url::parse(&format!("http://127.0.0.1:{DEFAULT_HTTP_PORT}/"))
        .expect("default API URL is valid")
}

/// Ensure the base URL is hierarchical and ends with a slash so segments
/// are appended rather than replacing the last one.
fn normalize_base(mut url: Url) -> Result<Url> {
    if url.cannot_be_a_base() {
        return Err(ClientError::Config(format!("{url} cannot be a base URL")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url.as_str(), "http://127.0.0.1:8080/");
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.page_size, 10);
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let config = ClientConfig::with_api_url("https://example.org/api").unwrap();
        let url = config.endpoint(&["notifications", "s 1", "count"]).unwrap();
        assert_eq!(url.as_str(), "https://example.org/api/notifications/s%201/count");
    }

    #[test]
    fn test_live_url_scheme_and_query() {
        let config = ClientConfig::with_api_url("https://example.org/api/").unwrap();
        let url = config
            .live_url(&ConversationId::from("C"), SenderRole::Subject)
            .unwrap();
        assert_eq!(url.as_str(), "wss://example.org/api/ws?conversation=C&role=subject");

        let local = ClientConfig::default()
            .live_url(&ConversationId::from("C"), SenderRole::Counterparty)
            .unwrap();
        assert_eq!(local.scheme(), "ws");
    }

    #[test]
    fn test_rejects_non_hierarchical_url() {
        assert!(ClientConfig::with_api_url("mailto:someone@example.org").is_err());
    }
}
