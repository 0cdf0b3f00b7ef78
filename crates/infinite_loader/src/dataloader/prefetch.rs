//! Prefetch window bookkeeping.
//!
//! The counter tracks how many batches have been requested from the pipeline but not
//! yet handed to the consumer. Construction counts the initial fill of `prefetch`
//! batches. Every consumer call decrements it once, and whenever it falls below the
//! window a further `prefetch` batches are requested. It therefore stays within
//! `[prefetch, 2 * prefetch - 1]` after each call and never goes negative.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PrefetchCounter {
    expected_batch_count: usize,
    prefetch: usize,
}

impl PrefetchCounter {
    /// Starts with the initial fill already counted.
    pub(crate) fn new(prefetch: usize) -> Self {
        Self {
            expected_batch_count: prefetch,
            prefetch,
        }
    }

    /// Accounts for one consumer call.
    ///
    /// Returns `true` when a new request of `prefetch` batches must be issued; the
    /// counter already includes those batches when this returns.
    pub(crate) fn consume(&mut self) -> bool {
        // Each consume is paired with a batch counted at construction or by a refill.
        self.expected_batch_count = self.expected_batch_count.saturating_sub(1);
        if self.expected_batch_count < self.prefetch {
            self.expected_batch_count += self.prefetch;
            true
        } else {
            false
        }
    }

    pub(crate) fn expected_batch_count(&self) -> usize {
        self.expected_batch_count
    }

    pub(crate) fn prefetch(&self) -> usize {
        self.prefetch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_fill_counts_prefetch() {
        assert_eq!(PrefetchCounter::new(3).expected_batch_count(), 3);
    }

    #[test]
    fn test_counter_sequence_prefetch_three() {
        let mut counter = PrefetchCounter::new(3);

        // 3 -> 2 (< 3) -> request, 5
        assert!(counter.consume());
        assert_eq!(counter.expected_batch_count(), 5);

        // 5 -> 4, 4 -> 3: plenty in flight
        assert!(!counter.consume());
        assert_eq!(counter.expected_batch_count(), 4);
        assert!(!counter.consume());
        assert_eq!(counter.expected_batch_count(), 3);

        // 3 -> 2 -> request, 5 again
        assert!(counter.consume());
        assert_eq!(counter.expected_batch_count(), 5);
    }

    #[test]
    fn test_prefetch_one_requests_every_call() {
        let mut counter = PrefetchCounter::new(1);
        for _ in 0..10 {
            assert!(counter.consume());
            assert_eq!(counter.expected_batch_count(), 1);
        }
    }

    #[test]
    fn test_counter_stays_in_window() {
        for prefetch in 1..8 {
            let mut counter = PrefetchCounter::new(prefetch);
            let mut requested = prefetch;
            for consumed in 1..200 {
                if counter.consume() {
                    requested += prefetch;
                }
                let expected = counter.expected_batch_count();
                assert!(expected >= prefetch && expected <= 2 * prefetch - 1);
                assert_eq!(expected, requested - consumed);
            }
        }
    }
}
