//! src/dataloader/workers/aggregator.rs
//!
//! Reassembles worker chunks of arbitrary size into batches of exactly `batch_size`
//! items. Chunks are consumed in arrival order from a single queue and batches are
//! cut from the front of the buffer, so batch contents follow arrival order. Arrival
//! order across workers is not fixed, so batch composition can differ between runs.
//!
//! One chunk may complete several batches; a chunk that straddles a batch boundary
//! leaves its tail buffered for the next batch. Whatever is still buffered at
//! shutdown is dropped.

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error};

use super::{ChunkResult, ItemChunk, Message};
use crate::collator::Collator;
use crate::error::{LoaderError, Result};

/// Items received but not yet cut into a batch.
#[derive(Debug)]
pub struct AggregationBuffer<T> {
    pending_items: Vec<T>,
}

impl<T> Default for AggregationBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AggregationBuffer<T> {
    pub fn new() -> Self {
        Self {
            pending_items: Vec::new(),
        }
    }

    /// Appends a chunk after checking its declared length.
    pub fn push(&mut self, chunk: ItemChunk<T>) -> Result<()> {
        chunk.verify()?;
        self.pending_items.extend(chunk.items);
        Ok(())
    }

    /// Cuts the first `batch_size` items off the buffer, if that many are pending.
    pub fn pop_batch(&mut self, batch_size: usize) -> Option<Vec<T>> {
        if batch_size == 0 || self.pending_items.len() < batch_size {
            return None;
        }
        Some(self.pending_items.drain(..batch_size).collect())
    }

    pub fn pending_count(&self) -> usize {
        self.pending_items.len()
    }
}

/// Aggregator loop: runs until a `Stop` arrives, a fatal error is forwarded or the
/// loader stops listening.
pub(crate) fn run<T, C>(
    batch_size: usize,
    collator: C,
    chunks: Receiver<Message<ChunkResult<T>>>,
    batches: Sender<Result<C::Batch>>,
) where
    C: Collator<T>,
{
    let mut buffer = AggregationBuffer::new();

    loop {
        while let Some(items) = buffer.pop_batch(batch_size) {
            let batch = collator.collate(items).map_err(LoaderError::collation_failure);
            let failed = batch.is_err();
            if failed {
                error!("collation failed, aggregator stopping");
            }
            if batches.send(batch).is_err() {
                debug!("batch queue closed, aggregator exiting");
                return;
            }
            if failed {
                return;
            }
        }

        match chunks.recv() {
            Ok(Message::Work(Ok(chunk))) => {
                if let Err(e) = buffer.push(chunk) {
                    error!(error = %e, "malformed chunk, aggregator stopping");
                    let _ = batches.send(Err(e));
                    return;
                }
            }
            Ok(Message::Work(Err(e))) => {
                // Worker failures are fatal for the pipeline; hand them to the loader.
                let _ = batches.send(Err(e));
                return;
            }
            Ok(Message::Stop) | Err(_) => break,
        }
    }
    debug!(discarded = buffer.pending_count(), "aggregator stopped");
}
