use crate::minibatch::{MiniBatch, StackedFeature};
use crate::sample::Sample;
use anyhow::{bail, Result};
use std::collections::{HashMap, HashSet};

/// A `Collator` combines exactly `batch_size` items into one consumer-facing batch.
///
/// The aggregator calls it once per finished batch, on its own thread, so it must be
/// `Send + Sync`. It should be free of side effects; a failure is fatal for the pipeline.
pub trait Collator<T>: Send + Sync + 'static {
    type Batch: Send + 'static;

    fn collate(&self, items: Vec<T>) -> Result<Self::Batch>;
}

/// The default collator: stacks the items, in order, into a `Vec`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackCollator;

impl<T> Collator<T> for StackCollator
where
    T: Send + 'static,
{
    type Batch = Vec<T>;

    fn collate(&self, items: Vec<T>) -> Result<Vec<T>> {
        if items.is_empty() {
            bail!("Cannot collate empty item list");
        }
        Ok(items)
    }
}

/// Adapts a closure into a [`Collator`].
///
/// # Example
/// ```ignore
/// let summing = FnCollator::new(|items: Vec<u64>| Ok(items.iter().sum::<u64>()));
/// ```
#[derive(Debug, Clone)]
pub struct FnCollator<F> {
    collate: F,
}

impl<F> FnCollator<F> {
    pub fn new(collate: F) -> Self {
        Self { collate }
    }
}

impl<T, B, F> Collator<T> for FnCollator<F>
where
    F: Fn(Vec<T>) -> Result<B> + Send + Sync + 'static,
    B: Send + 'static,
{
    type Batch = B;

    fn collate(&self, items: Vec<T>) -> Result<B> {
        (self.collate)(items)
    }
}

/// A `Collator` that stacks [`Sample`] features row by row into a [`MiniBatch`].
///
/// All samples must carry the same feature keys, and each feature must have the
/// same length in every sample. No padding is applied; mismatches are errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureCollator;

impl Collator<Sample> for FeatureCollator {
    type Batch = MiniBatch;

    fn collate(&self, samples: Vec<Sample>) -> Result<MiniBatch> {
        if samples.is_empty() {
            bail!("Cannot collate empty sample list");
        }

        // Validate feature keys
        let first_keys: HashSet<&String> = samples[0].features.keys().collect();
        for (i, sample) in samples.iter().enumerate().skip(1) {
            let missing_keys: Vec<&String> = first_keys
                .iter()
                .filter(|&&k| !sample.features.contains_key(k))
                .cloned()
                .collect();

            let extra_keys: Vec<&String> = sample
                .features
                .keys()
                .filter(|k| !first_keys.contains(k))
                .collect();

            if !missing_keys.is_empty() || !extra_keys.is_empty() {
                bail!(
                    "Sample #{} has mismatch feature keys:\n -Missing: {:?}\n -Extra: {:?}",
                    i,
                    missing_keys,
                    extra_keys
                )
            }
        }

        let mut features = HashMap::with_capacity(first_keys.len());
        for key in first_keys {
            let width = samples[0].features[key].len();
            let mut values = Vec::with_capacity(width * samples.len());

            for (i, sample) in samples.iter().enumerate() {
                let row = &sample.features[key];
                if row.len() != width {
                    bail!(
                        "Length mismatch in sample {} for feature '{}': expected {}, got {}",
                        i,
                        key,
                        width,
                        row.len()
                    );
                }
                values.extend_from_slice(row);
            }

            features.insert(key.clone(), StackedFeature { values, width });
        }

        Ok(MiniBatch {
            batch_size: samples.len(),
            features,
        })
    }
}
