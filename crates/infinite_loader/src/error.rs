//! Error taxonomy for the loader pipeline.
//!
//! User-supplied extension points (`ItemSource`, `Transform`, `Collator`) return
//! `anyhow::Result`. The pipeline converts their failures into the typed variants below
//! so a consumer can tell configuration mistakes, fatal stage failures and a wedged
//! pipeline apart.

use std::time::Duration;

/// Boxed underlying cause carried by fatal stage errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the crate.
pub type Result<T, E = LoaderError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// Invalid constructor parameters.
    #[error("invalid loader configuration: {0}")]
    Configuration(String),

    /// The item source failed to produce an item. `worker` is `None` in inline mode.
    #[error("item source failed in {}", describe_worker(.worker))]
    SourceExhausted {
        worker: Option<usize>,
        #[source]
        source: BoxError,
    },

    /// The item transform failed while post-processing a chunk.
    #[error("item transform failed in {}", describe_worker(.worker))]
    Transform {
        worker: Option<usize>,
        #[source]
        source: BoxError,
    },

    /// A chunk's declared length does not match the items it carries.
    #[error("aggregation consistency violated: chunk declared {expected} items but carried {actual}")]
    AggregationConsistency { expected: usize, actual: usize },

    /// The collate function rejected a batch.
    #[error("collation failed")]
    Collation {
        #[source]
        source: BoxError,
    },

    /// No batch arrived within the configured deadline.
    #[error("no batch arrived within {timeout:?}; the pipeline may be wedged")]
    PipelineWedged { timeout: Duration },

    /// A pipeline stage went away without reporting an error.
    #[error("pipeline stage disconnected: {0}")]
    Disconnected(&'static str),

    /// The OS refused to spawn a stage thread.
    #[error("failed to spawn pipeline thread")]
    Spawn(#[from] std::io::Error),

    /// The loader has already been shut down.
    #[error("loader has been shut down")]
    ShutDown,
}

impl LoaderError {
    pub(crate) fn source_failure(worker: Option<usize>, err: anyhow::Error) -> Self {
        Self::SourceExhausted {
            worker,
            source: err.into(),
        }
    }

    pub(crate) fn transform_failure(worker: Option<usize>, err: anyhow::Error) -> Self {
        Self::Transform {
            worker,
            source: err.into(),
        }
    }

    pub(crate) fn collation_failure(err: anyhow::Error) -> Self {
        Self::Collation { source: err.into() }
    }

    /// Whether the loader can keep serving batches after this error.
    ///
    /// Only a wedge timeout is retryable; every other error tears the pipeline down.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::PipelineWedged { .. })
    }
}

fn describe_worker(worker: &Option<usize>) -> String {
    match worker {
        Some(id) => format!("worker {}", id),
        None => "inline mode".to_string(),
    }
}
