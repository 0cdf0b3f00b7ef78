use anyhow::{anyhow, ensure, Result};
use std::collections::HashMap;

/// A batch of [`Sample`](crate::sample::Sample)s stacked feature by feature.
///
/// Each feature is stored row-major: the values of sample 0 first, then sample 1,
/// and so on. Every row of a feature has the same width.
///
/// # Examples
/// Stacking 4 samples that each carry `"input_ids"` of length 128 gives a
/// `"input_ids"` entry of 512 values with a row width of 128.
#[derive(Debug, Clone, PartialEq)]
pub struct MiniBatch {
    pub(crate) batch_size: usize,
    pub(crate) features: HashMap<String, StackedFeature>,
}

/// Row-major storage for one stacked feature.
#[derive(Debug, Clone, PartialEq)]
pub struct StackedFeature {
    pub values: Vec<f32>,
    pub width: usize,
}

impl MiniBatch {
    /// Returns the number of samples in the batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the stacked feature by name.
    pub fn get(&self, feature: &str) -> Result<&StackedFeature> {
        self.features
            .get(feature)
            .ok_or_else(|| anyhow!("Feature '{}' not found in mini-batch", feature))
    }

    /// Returns one sample's row of a feature.
    pub fn row(&self, feature: &str, index: usize) -> Result<&[f32]> {
        ensure!(
            index < self.batch_size,
            "Row {} out of range for batch of {}",
            index,
            self.batch_size
        );
        let stacked = self.get(feature)?;
        let start = index * stacked.width;
        Ok(&stacked.values[start..start + stacked.width])
    }

    /// Returns an iterator over all feature keys in the batch.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }
}
