//! Configuration for the sync coordinator.

use std::time::Duration;

/// Number of ids or documents per pull and push request.
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Configuration for sync operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Base URL of the adapter, e.g. `https://example.com/`.
    pub server_url: String,
    /// Maximum ids per pull request and documents per push request.
    pub chunk_size: usize,
    /// Repoll interval for background sync. `None` syncs only on demand
    /// or on notification.
    pub poll_interval: Option<Duration>,
    /// Start a debounced cycle whenever a local write commits.
    pub listen_for_changes: bool,
    /// Quiet period that collapses bursts of notifications into one cycle.
    pub debounce: Duration,
    /// Per-request timeout for the HTTP client.
    pub request_timeout: Duration,
}

impl SyncConfig {
    /// Creates a configuration for the adapter at `server_url`.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_interval: None,
            listen_for_changes: false,
            debounce: Duration::from_millis(250),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the chunk size. Zero is treated as one.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Sets the background repoll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Enables or disables syncing on local writes.
    #[must_use]
    pub fn with_listen_for_changes(mut self, listen: bool) -> Self {
        self.listen_for_changes = listen;
        self
    }

    /// Sets the debounce window.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::new("http://localhost/");
        assert_eq!(config.chunk_size, 10);
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert!(config.poll_interval.is_none());
        assert!(!config.listen_for_changes);
    }

    #[test]
    fn builder() {
        let config = SyncConfig::new("http://localhost/")
            .with_chunk_size(0)
            .with_poll_interval(Duration::from_secs(5))
            .with_listen_for_changes(true)
            .with_request_timeout(Duration::from_secs(2));
        assert_eq!(config.chunk_size, 1);
        assert_eq!(config.poll_interval, Some(Duration::from_secs(5)));
        assert!(config.listen_for_changes);
        assert_eq!(config.request_timeout, Duration::from_secs(2));
    }
}
