use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};

/// An `ItemSource` produces one item per call from a (possibly infinite) stream.
///
/// Workers call `next_item` concurrently through a shared reference, so
/// implementations must be `Send + Sync`. A source that cannot tolerate concurrent
/// callers should either lock internally (see [`IterSource`]) or be paired with
/// `SamplingMode::Serialized` in the loader configuration.
///
/// Returning an error is fatal for the whole pipeline: the loader does not retry,
/// since re-sampling would silently desynchronize batch accounting.
pub trait ItemSource: Send + Sync + 'static {
    type Item: Send + 'static;

    /// Produces the next item.
    fn next_item(&self) -> Result<Self::Item>;
}

/// Lets callers keep a handle to a source they hand to the loader.
impl<S> ItemSource for Arc<S>
where
    S: ItemSource + ?Sized,
{
    type Item = S::Item;

    fn next_item(&self) -> Result<Self::Item> {
        (**self).next_item()
    }
}

/// An `ItemSource` backed by a closure.
///
/// # Example
/// ```ignore
/// let counter = AtomicU64::new(0);
/// let source = FnSource::new(move || Ok(counter.fetch_add(1, Ordering::Relaxed)));
/// ```
pub struct FnSource<F> {
    produce: F,
}

impl<F> FnSource<F> {
    pub fn new(produce: F) -> Self {
        Self { produce }
    }
}

impl<F, T> ItemSource for FnSource<F>
where
    F: Fn() -> Result<T> + Send + Sync + 'static,
    T: Send + 'static,
{
    type Item = T;

    fn next_item(&self) -> Result<T> {
        (self.produce)()
    }
}

/// An `ItemSource` that drains an iterator behind a mutex.
///
/// Every call takes the lock, so sampling is serialized across workers. Once the
/// iterator is exhausted each further call fails; a bounded iterator is therefore
/// only suitable when the consumer stops before it runs dry.
pub struct IterSource<I> {
    inner: Mutex<I>,
}

impl<I> IterSource<I>
where
    I: Iterator,
{
    pub fn new(iter: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            inner: Mutex::new(iter.into_iter()),
        }
    }
}

impl<I> ItemSource for IterSource<I>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
    type Item = I::Item;

    fn next_item(&self) -> Result<I::Item> {
        let mut iter = self
            .inner
            .lock()
            .map_err(|_| anyhow!("Iterator source lock poisoned by a panicking caller"))?;
        iter.next()
            .ok_or_else(|| anyhow!("Iterator source exhausted"))
    }
}
