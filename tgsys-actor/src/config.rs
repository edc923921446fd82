//! Scheduler configuration with sensible defaults.

// Layer 1: Standard library
// (none)

// Layer 2: Third-party
use serde::{Deserialize, Serialize};

// Layer 3: Internal
// (none)

/// Default number of worker threads (in addition to the main thread).
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Upper bound on worker threads; a scheduler is not a thread pool.
pub const MAX_WORKER_THREADS: usize = 64;

/// Default scheduler thread name prefix.
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "tgsys-sched";

/// Configuration of a [`Scheduler`](crate::Scheduler).
///
/// The scheduler hosts `n_workers + 1` OS threads: thread 0 is the
/// designated "main" scheduler thread, threads `1..=n_workers` are
/// workers.
///
/// # Examples
///
/// ```rust
/// use tgsys_actor::SchedulerConfig;
///
/// let config = SchedulerConfig::builder()
///     .with_workers(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.n_workers, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of worker threads in addition to the main thread.
    pub n_workers: usize,

    /// Prefix for scheduler thread names (`<prefix>-<id>`).
    pub thread_name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            n_workers: DEFAULT_WORKER_THREADS,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Create a new configuration builder.
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.n_workers > MAX_WORKER_THREADS {
            return Err(format!(
                "n_workers must be <= {MAX_WORKER_THREADS}, got {}",
                self.n_workers
            ));
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".to_string());
        }
        Ok(())
    }
}

/// Builder for [`SchedulerConfig`] with a fluent API.
#[derive(Debug, Default)]
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl SchedulerConfigBuilder {
    /// Set the number of worker threads (0 means only the main scheduler
    /// thread exists).
    pub fn with_workers(mut self, n_workers: usize) -> Self {
        self.config.n_workers = n_workers;
        self
    }

    /// Set the scheduler thread name prefix.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<SchedulerConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.n_workers, DEFAULT_WORKER_THREADS);
        assert_eq!(config.thread_name_prefix, DEFAULT_THREAD_NAME_PREFIX);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SchedulerConfig::builder()
            .with_workers(0)
            .with_thread_name_prefix("db")
            .build()
            .unwrap();
        assert_eq!(config.n_workers, 0);
        assert_eq!(config.thread_name_prefix, "db");
    }

    #[test]
    fn test_validation_too_many_workers() {
        let result = SchedulerConfig::builder()
            .with_workers(MAX_WORKER_THREADS + 1)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_empty_prefix() {
        let result = SchedulerConfig::builder().with_thread_name_prefix("").build();
        assert!(result.is_err());
    }
}
