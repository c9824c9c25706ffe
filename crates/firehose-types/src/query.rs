//! Long-poll query options and response metadata.

use std::time::Duration;

/// Default server-side wait for a blocking list query.
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(5 * 60);

/// Blocking query parameters.
///
/// The server holds the request open until its index moves past
/// `wait_index` or `wait_time` elapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Index the caller has already seen
    pub wait_index: u64,
    /// Upper bound on how long the server may block
    pub wait_time: Duration,
    /// Allow any server (not only the leader) to answer
    pub allow_stale: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            wait_index: 0,
            wait_time: DEFAULT_WAIT_TIME,
            allow_stale: true,
        }
    }
}

impl QueryOptions {
    /// Set the wait index.
    pub fn with_wait_index(mut self, index: u64) -> Self {
        self.wait_index = index;
        self
    }

    /// Set the wait time.
    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    /// Set whether stale reads are allowed.
    pub fn with_allow_stale(mut self, allow_stale: bool) -> Self {
        self.allow_stale = allow_stale;
        self
    }
}

/// Metadata returned with a query response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryMeta {
    /// Highest index the server had applied when answering
    pub last_index: u64,
}

impl QueryMeta {
    pub fn new(last_index: u64) -> Self {
        Self { last_index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_query_options() {
        let query = QueryOptions::default();
        assert_eq!(query.wait_index, 0);
        assert_eq!(query.wait_time, Duration::from_secs(300));
        assert!(query.allow_stale);
    }

    #[test]
    fn test_query_builders() {
        let query = QueryOptions::default()
            .with_wait_index(42)
            .with_wait_time(Duration::from_secs(1))
            .with_allow_stale(false);
        assert_eq!(query.wait_index, 42);
        assert_eq!(query.wait_time, Duration::from_secs(1));
        assert!(!query.allow_stale);
    }
}
