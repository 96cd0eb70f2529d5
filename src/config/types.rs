//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for the chat and document clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the API; endpoints are resolved beneath it.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Ground answers in uploaded documents unless overridden per prompt.
    #[serde(default = "default_use_rag")]
    pub use_rag: bool,
    /// Seconds without data before a stream fails. 0 disables the limit.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Seconds allowed for establishing a connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_use_rag() -> bool {
    true
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            use_rag: default_use_rag(),
            idle_timeout_secs: default_idle_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Idle timeout for streams, if enabled.
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Resolve `path` beneath the base URL.
    ///
    /// The base URL is treated as a directory, so `http://host/api` with
    /// `rag/chat` gives `http://host/api/rag/chat`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let mut base = Url::parse(&self.base_url)?;
        if !base.path().ends_with('/') {
            let dir = format!("{}/", base.path());
            base.set_path(&dir);
        }
        base.join(path.trim_start_matches('/'))
    }
}
