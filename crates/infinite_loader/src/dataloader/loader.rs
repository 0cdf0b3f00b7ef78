//! src/dataloader/loader.rs
//!
//! The `InfiniteDataLoader` front door.
//!
//! # Constructor Overview
//! - `new()` - default `StackCollator`, no item transform
//! - `new_with_collator()` - custom `Collator`
//! - `new_with_transform()` - custom `Collator` plus an item transform run by workers
//!
//! # Modes
//! - `num_workers = Some(0)`: inline. Each call pulls `batch_size` items on the caller's
//!   thread and collates them. No threads, no queues.
//! - `num_workers > 0` (or `None` for one per core): concurrent. A distributor, the
//!   workers and an aggregator run on their own threads; the loader keeps the prefetch
//!   window filled and blocks on the aggregator's output.

use rand::Rng;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::common::thread::init_worker_rng;
use super::config::LoaderConfig;
use super::prefetch::PrefetchCounter;
use super::workers::pipeline::{Pipeline, PipelineSettings};
use super::workers::worker::{produce_items, SharedTransform};
use super::workers::ItemChunk;
use crate::collator::{Collator, StackCollator};
use crate::error::{LoaderError, Result};
use crate::source::ItemSource;
use crate::transform::Transform;

/// An endless source of fixed-size, collated batches.
///
/// # Thread safety:
/// - The loader is `Send` and can be moved to the thread that consumes batches.
/// - Batches are requested through `&mut self`; one consumer at a time.
///
/// # Teardown
/// `close()` stops and joins every pipeline thread. Dropping the loader does the same,
/// so forgetting to close never leaks worker threads.
///
/// # Type parameters:
/// - `S`: Item source shared by all workers
/// - `C`: Collator type (defaults to StackCollator)
pub struct InfiniteDataLoader<S, C = StackCollator>
where
    S: ItemSource,
    C: Collator<S::Item>,
{
    config: LoaderConfig,
    base_seed: u64,
    mode: LoaderMode<S, C>,
    closed: bool,
}

enum LoaderMode<S, C>
where
    S: ItemSource,
    C: Collator<S::Item>,
{
    Inline {
        source: S,
        collator: C,
        transform: Option<SharedTransform<S::Item>>,
        rng_initialized: bool,
    },
    Concurrent {
        pipeline: Pipeline<S::Item, C::Batch>,
        counter: PrefetchCounter,
        requests_issued: u64,
        /// Set once a call has charged the counter for a batch it has not received yet.
        /// A retry after a wedge timeout waits for that batch instead of charging again.
        awaiting_batch: bool,
    },
}

impl<S> InfiniteDataLoader<S, StackCollator>
where
    S: ItemSource,
{
    /// Creates a loader that stacks items into `Vec` batches.
    ///
    /// # Example
    /// ```ignore
    /// let config = LoaderConfig::builder()
    ///     .batch_size(32)
    ///     .num_workers(4)
    ///     .build();
    /// let mut loader = InfiniteDataLoader::new(source, config)?;
    /// let batch: Vec<Item> = loader.get_next_batch()?;
    /// ```
    pub fn new(source: S, config: LoaderConfig) -> Result<Self> {
        Self::new_with_collator(source, config, StackCollator)
    }
}

impl<S, C> InfiniteDataLoader<S, C>
where
    S: ItemSource,
    C: Collator<S::Item>,
{
    /// Creates a loader with a custom collator.
    ///
    /// # Errors
    /// - `Configuration` if `batch_size` or `prefetch` is 0, or the timeout is zero
    /// - `Spawn` if a pipeline thread cannot be created
    pub fn new_with_collator(source: S, config: LoaderConfig, collator: C) -> Result<Self> {
        Self::build(source, config, collator, None)
    }

    /// Creates a loader whose workers run `transform` over every chunk they produce.
    ///
    /// The transform must keep the number of items unchanged.
    pub fn new_with_transform<F>(
        source: S,
        config: LoaderConfig,
        collator: C,
        transform: F,
    ) -> Result<Self>
    where
        F: Transform<Vec<S::Item>, Vec<S::Item>> + 'static,
    {
        Self::build(source, config, collator, Some(Arc::new(transform)))
    }

    fn build(
        source: S,
        config: LoaderConfig,
        collator: C,
        transform: Option<SharedTransform<S::Item>>,
    ) -> Result<Self> {
        config.validate()?;

        let num_workers = config.resolved_workers();
        let base_seed = config.seed.unwrap_or_else(|| rand::rng().random());

        let mode = if num_workers == 0 {
            debug!(batch_size = config.batch_size, "loader running inline");
            LoaderMode::Inline {
                source,
                collator,
                transform,
                rng_initialized: false,
            }
        } else {
            let request_size = config.batch_size * config.prefetch;
            if request_size < num_workers {
                warn!(
                    num_workers,
                    request_size,
                    "more workers than items per request, {} worker(s) will idle",
                    num_workers - request_size
                );
            }

            let pipeline = Pipeline::spawn(
                Arc::new(source),
                collator,
                transform,
                PipelineSettings {
                    batch_size: config.batch_size,
                    num_workers,
                    prefetch: config.prefetch,
                    sampling: config.sampling,
                    base_seed,
                },
            )?;

            // Initial fill: the counter already accounts for these `prefetch` batches.
            pipeline.request(request_size)?;
            let counter = PrefetchCounter::new(config.prefetch);
            debug!(
                total_count = request_size,
                expected_batch_count = counter.expected_batch_count(),
                "issued initial prefetch request"
            );

            LoaderMode::Concurrent {
                pipeline,
                counter,
                requests_issued: 1,
                awaiting_batch: false,
            }
        };

        Ok(Self {
            config,
            base_seed,
            mode,
            closed: false,
        })
    }

    /// Returns the next batch, blocking until one is ready.
    ///
    /// Never runs out on its own. In concurrent mode each call first accounts for the
    /// batch in the prefetch window and, when fewer than `prefetch` batches remain in
    /// flight, asks the pipeline for another `prefetch` batches. A call that follows a
    /// wedge timeout waits for the batch already accounted for and requests nothing.
    ///
    /// # Errors
    /// - `PipelineWedged` if no batch arrives within the configured timeout. The loader
    ///   stays open and the call may be retried.
    /// - `AggregationConsistency` if the item transform changed the number of items.
    /// - Any other error is fatal: the pipeline is shut down before the error is
    ///   returned and every later call fails with `ShutDown`.
    pub fn get_next_batch(&mut self) -> Result<C::Batch> {
        if self.closed {
            return Err(LoaderError::ShutDown);
        }

        let batch_size = self.config.batch_size;
        let result = match &mut self.mode {
            LoaderMode::Inline {
                source,
                collator,
                transform,
                rng_initialized,
            } => {
                if !*rng_initialized {
                    init_worker_rng(0, self.base_seed);
                    *rng_initialized = true;
                }

                produce_items(&*source, batch_size, transform.as_deref(), None, None)
                    .and_then(|items| {
                        let chunk = ItemChunk::new(items, batch_size);
                        chunk.verify()?;
                        collator
                            .collate(chunk.items)
                            .map_err(LoaderError::collation_failure)
                    })
            }
            LoaderMode::Concurrent {
                pipeline,
                counter,
                requests_issued,
                awaiting_batch,
            } => {
                let refill = if *awaiting_batch {
                    Ok(())
                } else if counter.consume() {
                    *requests_issued += 1;
                    let total_count = batch_size * counter.prefetch();
                    debug!(
                        total_count,
                        expected_batch_count = counter.expected_batch_count(),
                        "prefetch window low, requesting more items"
                    );
                    pipeline.request(total_count)
                } else {
                    Ok(())
                };
                *awaiting_batch = true;

                let received = refill.and_then(|()| pipeline.recv(self.config.timeout));
                if !matches!(received, Err(LoaderError::PipelineWedged { .. })) {
                    *awaiting_batch = false;
                }
                received
            }
        };

        if let Err(e) = &result {
            if e.is_fatal() {
                error!(error = %e, "fatal loader error, shutting down");
                self.close();
            } else {
                warn!(error = %e, "no batch within timeout");
            }
        }
        result
    }

    /// Stops and joins every pipeline thread. Safe to call more than once.
    ///
    /// Items still buffered in the pipeline are dropped.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let LoaderMode::Concurrent { pipeline, .. } = &mut self.mode {
            pipeline.shutdown();
        }
        info!("loader closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Number of worker threads; 0 when loading inline.
    pub fn num_workers(&self) -> usize {
        match &self.mode {
            LoaderMode::Inline { .. } => 0,
            LoaderMode::Concurrent { pipeline, .. } => pipeline.num_workers(),
        }
    }

    /// Batches requested but not yet handed out. `None` when loading inline.
    pub fn expected_batch_count(&self) -> Option<usize> {
        match &self.mode {
            LoaderMode::Inline { .. } => None,
            LoaderMode::Concurrent { counter, .. } => Some(counter.expected_batch_count()),
        }
    }

    /// Batch requests sent to the distributor, including the initial fill.
    pub fn requests_issued(&self) -> u64 {
        match &self.mode {
            LoaderMode::Inline { .. } => 0,
            LoaderMode::Concurrent {
                requests_issued, ..
            } => *requests_issued,
        }
    }
}

/// Yields batches forever while open; ends once the loader is closed.
impl<S, C> Iterator for InfiniteDataLoader<S, C>
where
    S: ItemSource,
    C: Collator<S::Item>,
{
    type Item = Result<C::Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        Some(self.get_next_batch())
    }
}
