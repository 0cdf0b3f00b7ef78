//! src/dataloader/workers/distributor.rs
//!
//! Fans each batch request out to the workers. Every worker gets
//! `total / workers` items and the last one also absorbs the remainder, so the
//! assignments for one request always sum to its total.

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, trace};

use super::{BatchRequest, Message, WorkAssignment};

/// Splits `total_count` items across `worker_count` workers, in worker-index order.
///
/// The last worker absorbs the integer-division remainder, so its count is the only
/// one that may differ and it is never smaller than the others.
///
/// # Panics
/// Panics if `worker_count` is 0; the loader never builds a distributor without workers.
pub fn distribute(total_count: usize, worker_count: usize) -> Vec<WorkAssignment> {
    assert!(worker_count > 0, "distribute requires at least one worker");

    let base = total_count / worker_count;
    let last = total_count - base * (worker_count - 1);

    (0..worker_count)
        .map(|worker_id| WorkAssignment {
            count: if worker_id + 1 == worker_count { last } else { base },
        })
        .collect()
}

/// Distributor loop: runs until a `Stop` arrives or the loader goes away.
pub(crate) fn run(
    requests: Receiver<Message<BatchRequest>>,
    workers: Vec<Sender<Message<WorkAssignment>>>,
) {
    while let Ok(message) = requests.recv() {
        let request = match message {
            Message::Work(request) => request,
            Message::Stop => break,
        };

        for (worker_id, (assignment, tx)) in distribute(request.total_count, workers.len())
            .into_iter()
            .zip(&workers)
            .enumerate()
        {
            trace!(worker_id, count = assignment.count, "assigning work");
            if tx.send(Message::Work(assignment)).is_err() {
                debug!(worker_id, "worker queue closed, distributor exiting");
                return;
            }
        }
    }
    debug!("distributor stopped");
}
