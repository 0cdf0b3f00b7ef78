//! Pipeline stages for concurrent loading.
//!
//! - `distributor`: splits each batch request into per-worker assignments
//! - `worker`: pulls assigned counts of items from the source
//! - `aggregator`: reassembles chunks into fixed-size collated batches
//! - `pipeline`: spawns the stages, owns their channels and joins them on shutdown
//!
//! Every stage loop reads a [`Message`] and exits on `Stop`. Work flows one way:
//! loader → distributor → workers → aggregator → loader.

pub(crate) mod aggregator;
pub(crate) mod distributor;
pub(crate) mod pipeline;
pub(crate) mod worker;

use crate::error::{LoaderError, Result};

/// Control envelope for every stage queue.
#[derive(Debug)]
pub(crate) enum Message<T> {
    Work(T),
    Stop,
}

/// Ask the distributor for `total_count` items spread across the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BatchRequest {
    pub(crate) total_count: usize,
}

/// Ask one worker for `count` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkAssignment {
    pub count: usize,
}

/// Items produced by one worker for one assignment.
///
/// `length` is the count the worker was asked for; the aggregator checks it against
/// `items.len()` so a transform that drops or duplicates items is caught.
#[derive(Debug)]
pub struct ItemChunk<T> {
    pub items: Vec<T>,
    pub length: usize,
}

impl<T> ItemChunk<T> {
    pub fn new(items: Vec<T>, length: usize) -> Self {
        Self { items, length }
    }

    pub(crate) fn verify(&self) -> Result<()> {
        if self.items.len() != self.length {
            return Err(LoaderError::AggregationConsistency {
                expected: self.length,
                actual: self.items.len(),
            });
        }
        Ok(())
    }
}

/// What workers push to the aggregator: a chunk, or the error that stopped them.
pub(crate) type ChunkResult<T> = Result<ItemChunk<T>>;
