use std::time::Duration;

/// Configuration for the in-memory document store.
///
/// Controls how hard transactions retry on commit conflicts.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum attempts per transaction before it fails with `Aborted`.
    pub max_transaction_attempts: u32,
    /// Pause between conflicting attempts. Zero retries immediately.
    pub retry_backoff: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_transaction_attempts: 5,
            retry_backoff: Duration::from_millis(10),
        }
    }
}
