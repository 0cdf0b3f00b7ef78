//! src/dataloader/config.rs
//!
//! Configuration for InfiniteDataLoader behaviour
//!
//! Example:
//! ```ignore
//! let config = LoaderConfig::builder()
//!     .batch_size(32)
//!     .num_workers(4)
//!     .prefetch(3)
//!     .timeout(Duration::from_secs(10))
//!     .build();
//! ```
//!
//! # Performance considerations:
//! - `num_workers`: More workers can improve throughput but increase memory usage
//! - `prefetch`: Higher values hide source latency but keep more batches in memory.
//!               At most `2 * prefetch` batches are requested but not yet consumed.

use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

use crate::error::{LoaderError, Result};

/// How workers are allowed to call the item source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingMode {
    /// Workers call the source concurrently. The source must be thread-safe.
    #[default]
    Concurrent,
    /// Workers take a shared lock around every source call. Use this for sources
    /// that cannot tolerate concurrent callers; throughput drops accordingly.
    Serialized,
}

/// Configuration for InfiniteDataLoader
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Number of items per batch (must be > 0)
    pub batch_size: usize,
    /// Number of parallel workers.
    /// `Some(0)` loads inline on the caller's thread; `None` uses every available core.
    pub num_workers: Option<usize>,
    /// Prefetch window in batches (must be >= 1)
    pub prefetch: usize,
    /// Maximum time `get_next_batch` waits for a batch before reporting a wedged
    /// pipeline. `None` waits forever. Default: 30s
    pub timeout: Option<Duration>,
    /// Whether workers may sample the source concurrently
    pub sampling: SamplingMode,
    /// Base seed for the per-worker RNGs. Random when not set.
    pub seed: Option<u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            num_workers: Some(0),
            prefetch: 3,
            timeout: Some(Duration::from_secs(30)),
            sampling: SamplingMode::Concurrent,
            seed: None,
        }
    }
}

impl LoaderConfig {
    pub fn builder() -> LoaderConfigBuilder {
        LoaderConfigBuilder::default()
    }

    /// Checks every option, returning a `Configuration` error naming the first bad one.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(LoaderError::Configuration(
                "batch_size must be greater than 0".to_string(),
            ));
        }

        if self.prefetch == 0 {
            return Err(LoaderError::Configuration("prefetch must be >= 1".to_string()));
        }

        if self.timeout == Some(Duration::ZERO) {
            return Err(LoaderError::Configuration(
                "timeout must be non-zero; use None to wait forever".to_string(),
            ));
        }

        // Request sizes and queue capacities are derived from these products.
        if self.batch_size.checked_mul(self.prefetch).is_none() {
            return Err(LoaderError::Configuration(format!(
                "batch_size * prefetch overflows ({} * {})",
                self.batch_size, self.prefetch
            )));
        }

        if self.prefetch.checked_mul(2).is_none() {
            return Err(LoaderError::Configuration(format!(
                "prefetch {} is too large",
                self.prefetch
            )));
        }

        if let Some(workers) = self.num_workers {
            if workers.checked_mul(2).is_none() {
                return Err(LoaderError::Configuration(format!(
                    "num_workers {} is too large",
                    workers
                )));
            }
        }

        Ok(())
    }

    /// Resolves `num_workers`, mapping `None` to the number of available cores.
    pub fn resolved_workers(&self) -> usize {
        self.num_workers.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}

/// Builder for LoaderConfig with method chaining
#[derive(Default)]
pub struct LoaderConfigBuilder {
    config: LoaderConfig,
}

impl LoaderConfigBuilder {
    /// Set the batch size (must be > 0)
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set the number of workers (0 = inline, single-threaded)
    pub fn num_workers(mut self, workers: usize) -> Self {
        self.config.num_workers = Some(workers);
        self
    }

    /// Use one worker per available core.
    pub fn all_cores(mut self) -> Self {
        self.config.num_workers = None;
        self
    }

    /// Set the prefetch window in batches.
    pub fn prefetch(mut self, prefetch: usize) -> Self {
        self.config.prefetch = prefetch;
        self
    }

    /// Set the timeout for `get_next_batch`.
    ///
    /// - Too low: May report a wedge during legitimately slow sampling
    /// - Too high: Delays detection of crashed workers.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Wait for batches without a deadline.
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    pub fn sampling(mut self, mode: SamplingMode) -> Self {
        self.config.sampling = mode;
        self
    }

    /// Set the random seed for reproducible per-worker randomness.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> LoaderConfig {
        self.config
    }
}
