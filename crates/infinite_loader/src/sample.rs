use anyhow::{anyhow, Result};
use std::collections::HashMap;

/// The `Sample` struct represents a single item drawn from a feature-oriented source.
///
/// It maps feature names (e.g., `"input_ids"`, `"labels"`) to flat `f32` vectors.
/// [`FeatureCollator`](crate::collator::FeatureCollator) stacks samples with matching
/// feature names and lengths into a [`MiniBatch`](crate::minibatch::MiniBatch).
///
/// # Examples:
/// - For a text sample: `{"input_ids": [1, 32, 128], "labels": [0]}`
/// - For a sensor reading: `{"readings": [0.1, 0.4, 0.2], "label": [1]}`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sample {
    pub features: HashMap<String, Vec<f32>>,
}

impl Sample {
    pub fn new(features: HashMap<String, Vec<f32>>) -> Self {
        Self { features }
    }

    /// Creates a `Sample` from a single `(feature_name, values)` pair.
    ///
    /// Chain with [`with_feature`](Self::with_feature) to add more features.
    pub fn from_single(name: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            features: HashMap::from([(name.into(), values)]),
        }
    }

    /// Adds or overwrites a feature in the `Sample`.
    pub fn with_feature(mut self, name: impl Into<String>, values: Vec<f32>) -> Self {
        self.features.insert(name.into(), values);
        self
    }

    pub fn get(&self, feature: &str) -> Result<&[f32]> {
        self.features
            .get(feature)
            .map(Vec::as_slice)
            .ok_or_else(|| anyhow!("Feature {} not found", feature))
    }

    /// Returns an iterator over all feature names in this `Sample`.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }
}
