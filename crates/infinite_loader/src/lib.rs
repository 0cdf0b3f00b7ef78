pub mod collator;
pub mod dataloader;
pub mod error;
pub mod minibatch;
pub mod sample;
pub mod source;
pub mod transform;

pub use collator::{Collator, FeatureCollator, FnCollator, StackCollator};
pub use dataloader::{InfiniteDataLoader, LoaderConfig, SamplingMode};
pub use error::{LoaderError, Result};
pub use minibatch::MiniBatch;
pub use sample::Sample;
pub use source::{FnSource, ItemSource, IterSource};
pub use transform::Transform;
