//! src/dataloader/workers/worker.rs
//!
//! A worker pulls exactly the assigned number of items from the shared source, runs
//! the optional item transform over them and hands the result to the aggregator as
//! one chunk. A source or transform failure is sent downstream in place of the chunk
//! and ends the worker; nothing is retried.

use crossbeam_channel::{Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error};

use super::{ChunkResult, ItemChunk, Message, WorkAssignment};
use crate::dataloader::common::thread::{init_worker_rng, set_worker_id};
use crate::error::{LoaderError, Result};
use crate::source::ItemSource;
use crate::transform::Transform;

/// Item transform shared by every worker.
pub(crate) type SharedTransform<T> = Arc<dyn Transform<Vec<T>, Vec<T>>>;

/// Everything one worker thread needs, cloned per worker at spawn time.
pub(crate) struct WorkerContext<S: ItemSource> {
    pub(crate) worker_id: usize,
    pub(crate) source: Arc<S>,
    pub(crate) transform: Option<SharedTransform<S::Item>>,
    /// Present when sampling is serialized across workers.
    pub(crate) sampling_lock: Option<Arc<Mutex<()>>>,
    pub(crate) base_seed: u64,
}

/// Pulls `count` items from `source` and applies `transform`.
///
/// Shared by the worker loop and inline loading. `worker` is only used to label errors.
pub(crate) fn produce_items<S>(
    source: &S,
    count: usize,
    transform: Option<&dyn Transform<Vec<S::Item>, Vec<S::Item>>>,
    sampling_lock: Option<&Mutex<()>>,
    worker: Option<usize>,
) -> Result<Vec<S::Item>>
where
    S: ItemSource + ?Sized,
{
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        let item = match sampling_lock {
            Some(lock) => {
                // The lock guards no data, so a poisoned lock is still usable.
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                source.next_item()
            }
            None => source.next_item(),
        }
        .map_err(|e| LoaderError::source_failure(worker, e))?;
        items.push(item);
    }

    match transform {
        Some(transform) => transform
            .apply(items)
            .map_err(|e| LoaderError::transform_failure(worker, e)),
        None => Ok(items),
    }
}

/// Worker loop: runs until a `Stop` arrives, a send fails or production fails.
pub(crate) fn run<S>(
    ctx: WorkerContext<S>,
    assignments: Receiver<Message<WorkAssignment>>,
    chunks: Sender<Message<ChunkResult<S::Item>>>,
) where
    S: ItemSource,
{
    let worker_id = ctx.worker_id;
    set_worker_id(worker_id);
    init_worker_rng(worker_id, ctx.base_seed);

    while let Ok(message) = assignments.recv() {
        let assignment = match message {
            Message::Work(assignment) => assignment,
            Message::Stop => break,
        };

        let result = produce_items(
            ctx.source.as_ref(),
            assignment.count,
            ctx.transform.as_deref(),
            ctx.sampling_lock.as_deref(),
            Some(worker_id),
        )
        .map(|items| ItemChunk::new(items, assignment.count));

        let failed = result.is_err();
        if let Err(e) = &result {
            error!(worker_id, error = %e, "worker failed, escalating to aggregator");
        }

        if chunks.send(Message::Work(result)).is_err() {
            debug!(worker_id, "chunk queue closed, worker exiting");
            return;
        }
        if failed {
            return;
        }
    }
    debug!(worker_id, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FnSource;
    use anyhow::anyhow;
    use crossbeam_channel::unbounded;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn counting_source() -> Arc<FnSource<impl Fn() -> anyhow::Result<u64> + Send + Sync>> {
        let counter = AtomicU64::new(0);
        Arc::new(FnSource::new(move || -> anyhow::Result<u64> {
            Ok(counter.fetch_add(1, Ordering::SeqCst))
        }))
    }

    #[test]
    fn test_produce_items_applies_transform() -> Result<()> {
        let source = counting_source();
        let reverse = |mut items: Vec<u64>| -> anyhow::Result<Vec<u64>> {
            items.reverse();
            Ok(items)
        };

        let items = produce_items(source.as_ref(), 3, Some(&reverse), None, Some(0))?;
        assert_eq!(items, vec![2, 1, 0]);
        Ok(())
    }

    #[test]
    fn test_produce_items_reports_source_failure() {
        let source = FnSource::new(|| -> anyhow::Result<u64> { Err(anyhow!("dry")) });
        let lock = Mutex::new(());

        let err = produce_items(&source, 2, None, Some(&lock), Some(4)).unwrap_err();
        assert!(matches!(err, LoaderError::SourceExhausted { worker: Some(4), .. }));
    }

    #[test]
    fn test_worker_emits_one_chunk_per_assignment() {
        let (assign_tx, assign_rx) = unbounded();
        let (chunk_tx, chunk_rx) = unbounded();

        assign_tx.send(Message::Work(WorkAssignment { count: 2 })).unwrap();
        assign_tx.send(Message::Work(WorkAssignment { count: 0 })).unwrap();
        assign_tx.send(Message::Stop).unwrap();

        let ctx = WorkerContext {
            worker_id: 1,
            source: counting_source(),
            transform: None,
            sampling_lock: None,
            base_seed: 0,
        };
        run(ctx, assign_rx, chunk_tx);

        let lengths: Vec<usize> = chunk_rx
            .try_iter()
            .map(|m| match m {
                Message::Work(Ok(chunk)) => chunk.items.len(),
                other => panic!("unexpected message {:?}", other),
            })
            .collect();
        assert_eq!(lengths, vec![2, 0]);
    }

    #[test]
    fn test_worker_stops_after_failure() {
        let (assign_tx, assign_rx) = unbounded();
        let (chunk_tx, chunk_rx) = unbounded();

        assign_tx.send(Message::Work(WorkAssignment { count: 1 })).unwrap();
        assign_tx.send(Message::Work(WorkAssignment { count: 1 })).unwrap();

        let ctx = WorkerContext {
            worker_id: 0,
            source: Arc::new(FnSource::new(|| -> anyhow::Result<u64> {
                Err(anyhow!("source gone"))
            })),
            transform: None,
            sampling_lock: None,
            base_seed: 0,
        };
        run(ctx, assign_rx, chunk_tx);

        let messages: Vec<_> = chunk_rx.try_iter().collect();
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            messages[0],
            Message::Work(Err(LoaderError::SourceExhausted { .. }))
        ));
    }
}
