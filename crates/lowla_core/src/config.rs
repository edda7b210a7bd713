//! Store configuration.

use lowla_storage::LogOptions;

/// Configuration for opening a persistent store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Create the store directory if it does not exist.
    pub create_if_missing: bool,

    /// Sync the log to disk on every commit (safer but slower).
    pub sync_on_commit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    pub(crate) fn log_options(&self) -> LogOptions {
        LogOptions::default()
            .create_if_missing(self.create_if_missing)
            .sync_on_commit(self.sync_on_commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = Config::new().create_if_missing(false).sync_on_commit(false);
        assert!(!config.create_if_missing);
        assert!(!config.sync_on_commit);
        let opts = config.log_options();
        assert!(!opts.create_if_missing);
        assert!(!opts.sync_on_commit);
    }
}
