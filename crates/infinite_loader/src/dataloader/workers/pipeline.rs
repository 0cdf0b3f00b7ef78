//! Thread pipeline for concurrent loading.
//!
//! Owns every stage thread and every queue between them:
//! - Request queue: Loader -> Distributor (unbounded, one integer per message)
//! - Assignment queues: Distributor -> Worker i, one per worker (unbounded)
//! - Chunk queue: Workers -> Aggregator (bounded, `2 * num_workers`)
//! - Batch queue: Aggregator -> Loader (bounded, `2 * prefetch`)
//!
//! The batch queue can hold every batch the prefetch counter allows to be requested
//! but not yet consumed, so the aggregator never waits on a healthy loader. Control
//! queues only carry counts and their depth is limited by the prefetch counter.
//!
//! # Shutdown
//! `shutdown` releases the batch queue, sends `Stop` to the distributor, to each
//! worker and to the aggregator, then joins workers, aggregator and distributor.
//! It runs at most once and is also invoked on drop.

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

use super::worker::{SharedTransform, WorkerContext};
use super::{aggregator, distributor, worker};
use super::{BatchRequest, ChunkResult, Message, WorkAssignment};
use crate::collator::Collator;
use crate::dataloader::config::SamplingMode;
use crate::error::{LoaderError, Result};
use crate::source::ItemSource;

/// Settings the pipeline needs, resolved from `LoaderConfig` by the loader.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PipelineSettings {
    pub(crate) batch_size: usize,
    pub(crate) num_workers: usize,
    pub(crate) prefetch: usize,
    pub(crate) sampling: SamplingMode,
    pub(crate) base_seed: u64,
}

/// Running distributor, workers and aggregator.
///
/// # Type Parameters
/// - `T`: Items flowing from workers to the aggregator
/// - `B`: Collated batches returned to the loader
pub(crate) struct Pipeline<T, B> {
    request_tx: Sender<Message<BatchRequest>>,
    worker_txs: Vec<Sender<Message<WorkAssignment>>>,
    chunk_tx: Sender<Message<ChunkResult<T>>>,
    batch_rx: Option<Receiver<Result<B>>>,
    distributor: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
    aggregator: Option<JoinHandle<()>>,
    shut_down: bool,
}

impl<T, B> Pipeline<T, B>
where
    T: Send + 'static,
    B: Send + 'static,
{
    /// Spawns aggregator, workers and distributor, downstream first.
    ///
    /// If any spawn fails, the stages already running are stopped and joined before
    /// the error is returned.
    pub(crate) fn spawn<S, C>(
        source: Arc<S>,
        collator: C,
        transform: Option<SharedTransform<T>>,
        settings: PipelineSettings,
    ) -> Result<Self>
    where
        S: ItemSource<Item = T>,
        C: Collator<T, Batch = B>,
    {
        if settings.num_workers == 0 {
            return Err(LoaderError::Configuration(
                "a concurrent pipeline needs at least one worker".to_string(),
            ));
        }

        let (request_tx, request_rx) = unbounded();
        let (chunk_tx, chunk_rx) = bounded(2 * settings.num_workers);
        let (batch_tx, batch_rx) = bounded(2 * settings.prefetch);

        let mut worker_txs = Vec::with_capacity(settings.num_workers);
        let mut worker_rxs = Vec::with_capacity(settings.num_workers);
        for _ in 0..settings.num_workers {
            let (tx, rx) = unbounded();
            worker_txs.push(tx);
            worker_rxs.push(rx);
        }

        let mut pipeline = Self {
            request_tx,
            worker_txs,
            chunk_tx,
            batch_rx: Some(batch_rx),
            distributor: None,
            workers: Vec::with_capacity(settings.num_workers),
            aggregator: None,
            shut_down: false,
        };

        let batch_size = settings.batch_size;
        pipeline.aggregator = Some(
            thread::Builder::new()
                .name("loader-aggregator".to_string())
                .spawn(move || aggregator::run(batch_size, collator, chunk_rx, batch_tx))?,
        );

        let sampling_lock = match settings.sampling {
            SamplingMode::Serialized => Some(Arc::new(Mutex::new(()))),
            SamplingMode::Concurrent => None,
        };

        for (worker_id, assignments) in worker_rxs.into_iter().enumerate() {
            let ctx = WorkerContext {
                worker_id,
                source: source.clone(),
                transform: transform.clone(),
                sampling_lock: sampling_lock.clone(),
                base_seed: settings.base_seed,
            };
            let chunks = pipeline.chunk_tx.clone();

            let handle = thread::Builder::new()
                .name(format!("loader-worker-{}", worker_id))
                .spawn(move || worker::run(ctx, assignments, chunks))?;
            pipeline.workers.push(handle);
        }

        let distributor_txs = pipeline.worker_txs.clone();
        pipeline.distributor = Some(
            thread::Builder::new()
                .name("loader-distributor".to_string())
                .spawn(move || distributor::run(request_rx, distributor_txs))?,
        );

        info!(
            num_workers = settings.num_workers,
            batch_size = settings.batch_size,
            prefetch = settings.prefetch,
            sampling = ?settings.sampling,
            "loader pipeline started"
        );
        Ok(pipeline)
    }

    /// Asks the distributor for `total_count` more items.
    pub(crate) fn request(&self, total_count: usize) -> Result<()> {
        self.request_tx
            .send(Message::Work(BatchRequest { total_count }))
            .map_err(|_| LoaderError::Disconnected("distributor"))
    }

    /// Waits for the next finished batch, up to `timeout` when one is set.
    pub(crate) fn recv(&self, timeout: Option<Duration>) -> Result<B> {
        let batch_rx = self.batch_rx.as_ref().ok_or(LoaderError::ShutDown)?;
        match timeout {
            Some(timeout) => match batch_rx.recv_timeout(timeout) {
                Ok(batch) => batch,
                Err(RecvTimeoutError::Timeout) => Err(LoaderError::PipelineWedged { timeout }),
                Err(RecvTimeoutError::Disconnected) => Err(LoaderError::Disconnected("aggregator")),
            },
            None => batch_rx
                .recv()
                .map_err(|_| LoaderError::Disconnected("aggregator"))?,
        }
    }

    pub(crate) fn num_workers(&self) -> usize {
        self.worker_txs.len()
    }
}

impl<T, B> Pipeline<T, B> {
    /// Stops and joins every stage. Safe to call more than once.
    pub(crate) fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        info!("shutting down loader pipeline");

        // Unblocks an aggregator waiting on a full batch queue.
        self.batch_rx.take();

        let _ = self.request_tx.send(Message::Stop);
        for tx in &self.worker_txs {
            let _ = tx.send(Message::Stop);
        }
        let _ = self.chunk_tx.send(Message::Stop);

        for (worker_id, handle) in self.workers.drain(..).enumerate() {
            if handle.join().is_err() {
                error!(worker_id, "worker thread panicked");
            }
        }
        if let Some(handle) = self.aggregator.take() {
            if handle.join().is_err() {
                error!("aggregator thread panicked");
            }
        }
        if let Some(handle) = self.distributor.take() {
            if handle.join().is_err() {
                error!("distributor thread panicked");
            }
        }
        debug!("loader pipeline shut down");
    }
}

impl<T, B> Drop for Pipeline<T, B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
