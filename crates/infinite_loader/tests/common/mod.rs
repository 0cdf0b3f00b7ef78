#![allow(dead_code)]

use anyhow::{bail, Result};
use infinite_loader::ItemSource;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber once per test binary. Use `RUST_LOG=debug` to see output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Yields 1, 2, 3, ... and counts how often it was called.
#[derive(Default)]
pub struct CountingSource {
    next: AtomicU64,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `delay` before every item.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ItemSource for CountingSource {
    type Item = u64;

    fn next_item(&self) -> Result<u64> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Yields `limit` items, then fails on every call.
pub struct FailingSource {
    produced: AtomicUsize,
    limit: usize,
}

impl FailingSource {
    pub fn after(limit: usize) -> Self {
        Self {
            produced: AtomicUsize::new(0),
            limit,
        }
    }
}

impl ItemSource for FailingSource {
    type Item = usize;

    fn next_item(&self) -> Result<usize> {
        let n = self.produced.fetch_add(1, Ordering::SeqCst);
        if n >= self.limit {
            bail!("Upstream stream closed after {} items", self.limit);
        }
        Ok(n)
    }
}

/// Asserts that a batch of counter values holds no duplicates and returns it sorted.
pub fn sorted_unique(mut items: Vec<u64>) -> Vec<u64> {
    items.sort_unstable();
    let len = items.len();
    items.dedup();
    assert_eq!(items.len(), len, "duplicate items across batches");
    items
}
