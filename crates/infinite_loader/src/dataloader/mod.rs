//! src/dataloader/mod.rs
//!
//! This module implements the `InfiniteDataLoader`.
//!
//! The loader turns an endless `ItemSource` into an endless stream of fixed-size,
//! collated batches. Items are produced ahead of demand by a pool of worker threads,
//! but never more than `2 * prefetch` batches ahead, so memory stays bounded no
//! matter how slowly batches are consumed.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────┐
//!     ┌───────────→│  Loader (caller) │ ←───── LoaderConfig
//!     │            └────────┬─────────┘
//!     │                     │ BatchRequest { total_count = batch_size * prefetch }
//!     │                     ↓
//!     │             ┌──────────────┐
//!     │             │ Distributor  │ (splits totals, last worker takes the remainder)
//!     │             └──────┬───────┘
//!     │                    │ WorkAssignment { count } per worker
//!     │                    ↓
//!     │            [Worker Threads] (pull from ItemSource, apply Transform)
//!     │                    │
//!     │                    │ ItemChunk { items, length }
//!     │                    ↓
//!     │             ┌──────────────┐
//!     │             │  Aggregator  │ (re-cuts chunks into batches, runs Collator)
//!     │             └──────┬───────┘
//!     │                    │ Batch
//!     └────────────────────┘
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/dataloader/
//! ├── mod.rs             # Public API exports + module-level architecture docs
//! ├── config.rs          # LoaderConfig, builder, and validation
//! ├── loader.rs          # InfiniteDataLoader struct, constructors, get_next_batch
//! ├── prefetch.rs        # Prefetch window accounting
//! ├── workers/
//! │   ├── mod.rs         # Stage messages: BatchRequest, WorkAssignment, ItemChunk
//! │   ├── distributor.rs # Request fan-out
//! │   ├── worker.rs      # Item production
//! │   ├── aggregator.rs  # Chunk reassembly and collation
//! │   └── pipeline.rs    # Thread spawning, channels, shutdown
//! └── common/
//!     ├── mod.rs         # Module declarations for shared utilities
//!     └── thread.rs      # Thread-local worker ID and RNG
//! ```
//!
//! # Example Usage
//!
//! ## Inline (no threads):
//! ```ignore
//! let source = FnSource::new(|| Ok(read_record()?));
//! let config = LoaderConfig::builder()
//!     .batch_size(32)
//!     .build();
//!
//! let mut loader = InfiniteDataLoader::new(source, config)?;
//! let batch = loader.get_next_batch()?;
//! ```
//!
//! ## Concurrent with a custom collator:
//! ```ignore
//! let config = LoaderConfig::builder()
//!     .batch_size(64)
//!     .num_workers(8)
//!     .prefetch(4)
//!     .timeout(Duration::from_secs(10))
//!     .build();
//!
//! let mut loader = InfiniteDataLoader::new_with_collator(source, config, FeatureCollator)?;
//! for batch in loader.by_ref().take(1000) {
//!     let batch: MiniBatch = batch?;
//! }
//! loader.close();
//! ```
//!
//! # Performance Guidelines
//!
//! ## Worker Configuration
//! - `num_workers = Some(0)`: Inline, lowest memory usage but no parallelism
//! - `num_workers = Some(n)`: `n` worker threads
//! - `num_workers = None`: One worker per available core
//!
//! ## Memory Usage
//! - Inline: O(batch_size)
//! - Concurrent: O(2 x prefetch x batch_size)
//!
//! ## Notes:
//! - Use `SamplingMode::Serialized` when the source is not safe to call concurrently
//! - Increase `prefetch` if the consumer is starved for batches
//! - Keep `batch_size * prefetch >= num_workers`, otherwise some workers idle

mod common;
mod config;
mod loader;
mod prefetch;
mod workers;

pub use config::{LoaderConfig, LoaderConfigBuilder, SamplingMode};
pub use loader::InfiniteDataLoader;
pub use workers::aggregator::AggregationBuffer;
#[doc(hidden)]
pub use workers::distributor::distribute;
pub use workers::{ItemChunk, WorkAssignment};

pub use common::thread::{
    current_worker_id, init_worker_rng, worker_gen_bool, worker_gen_range, WORKER_ID, WORKER_RNG,
};
