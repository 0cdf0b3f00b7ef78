use anyhow::{Context, Result};
use std::marker::PhantomData;

/// A stateless conversion from `I` to `O`.
///
/// Workers use a `Transform<Vec<T>, Vec<T>>` as the optional item transform: it runs
/// over every chunk a worker collects, before the chunk is handed to the aggregator
/// (e.g. to move items into shared or pinned buffers). It must not change the number
/// of items; the aggregator treats a length change as a consistency violation.
///
/// Steps compose with `.then(...)`:
/// ```ignore
/// let transform = Normalize.then(MarkShared);
/// ```
pub trait Transform<I, O>: Send + Sync {
    /// Applies the transformation to the input
    fn apply(&self, input: I) -> Result<O>;

    #[inline]
    fn then<T, M>(self, next: T) -> Chain<Self, T, O>
    where
        Self: Sized,
        T: Transform<O, M>,
        O: Send,
        M: Send,
    {
        Chain::new(self, next)
    }
}

/// Closures are transforms.
impl<I, O, F> Transform<I, O> for F
where
    F: Fn(I) -> Result<O> + Send + Sync,
{
    fn apply(&self, input: I) -> Result<O> {
        self(input)
    }
}

/// A chain of two transforms (`A` -> `B`)
/// - `PhantomData<M>` enforces intermediate type alignment.
#[derive(Debug)]
pub struct Chain<A, B, M> {
    first: A,
    second: B,
    _marker: PhantomData<fn() -> M>,
}

impl<A, B, M> Chain<A, B, M> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            _marker: PhantomData,
        }
    }
}

impl<I, M, O, A, B> Transform<I, O> for Chain<A, B, M>
where
    A: Transform<I, M>,
    B: Transform<M, O>,
    M: Send,
{
    fn apply(&self, input: I) -> Result<O> {
        self.first
            .apply(input)
            .and_then(|mid| self.second.apply(mid))
            .with_context(|| {
                format!(
                    "Transform chain failed: {} → {}",
                    std::any::type_name::<A>(),
                    std::any::type_name::<B>(),
                )
            })
    }
}
