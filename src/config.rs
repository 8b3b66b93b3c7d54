use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "patent-miner";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Local Ollama instance used when no URL is configured.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Per-invocation backend timeout. Long patents on CPU need minutes.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Retries after the first failed backend call.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Env var that enables the per-document diagnostic dump.
pub const DUMP_DIR_ENV: &str = "PATENT_MINER_DUMP_DIR";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "patent_miner_lib=info,patent_miner=info,warn"
}

/// Diagnostic dump directory, if enabled via `PATENT_MINER_DUMP_DIR`.
pub fn dump_dir() -> Option<PathBuf> {
    match std::env::var(DUMP_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => Some(PathBuf::from(dir)),
        _ => None,
    }
}

/// Bounded retry policy for backend calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Delay before each retry, multiplied by the attempt number.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self { max_retries, backoff }
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_name_is_patent_miner() {
        assert_eq!(APP_NAME, "patent-miner");
    }

    #[test]
    fn default_filter_targets_crate() {
        assert!(default_log_filter().contains("patent_miner_lib=info"));
    }

    #[test]
    fn retry_policy_counts_first_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.total_attempts(), DEFAULT_MAX_RETRIES + 1);
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).total_attempts(), 1);
    }

    #[test]
    fn retry_delay_grows_linearly() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(300));
        assert_eq!(RetryPolicy::new(5, Duration::ZERO).delay_for(5), Duration::ZERO);
    }
}
