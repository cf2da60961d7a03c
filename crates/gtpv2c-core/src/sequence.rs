//! Sequence number generation
//!
//! The generator is the one engine component that may be shared between
//! threads; every other structure relies on the single-owner discipline.

use std::fmt;

use parking_lot::Mutex;
use tracing::debug;

/// The high bit of a sequence number is reserved
const SEQUENCE_NUMBER_LIMIT: u32 = 0x8000_0000;

/// Produces 31-bit sequence numbers for outbound initial messages.
///
/// Seeded from a random source so that a restarted process does not replay
/// the numbers a peer may still hold in its retransmission window.
pub struct SequenceGenerator {
    counter: Mutex<u32>,
}

impl SequenceGenerator {
    /// Create a generator with a random seed
    pub fn new() -> Self {
        let seed = rand::random::<u32>() & (SEQUENCE_NUMBER_LIMIT - 1);
        debug!(seed, "Sequence number generator seeded");
        Self::with_seed(seed)
    }

    /// Create a generator starting after `seed` (test and replay use)
    pub fn with_seed(seed: u32) -> Self {
        Self {
            counter: Mutex::new(seed & (SEQUENCE_NUMBER_LIMIT - 1)),
        }
    }

    /// Next sequence number; wraps to 0 instead of setting the reserved bit
    pub fn next(&self) -> u32 {
        let mut counter = self.counter.lock();
        *counter = counter.wrapping_add(1);
        if *counter & SEQUENCE_NUMBER_LIMIT != 0 {
            *counter = 0;
        }
        *counter
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SequenceGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceGenerator")
            .field("current", &*self.counter.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequence_increments() {
        let generator = SequenceGenerator::with_seed(10);
        assert_eq!(generator.next(), 11);
        assert_eq!(generator.next(), 12);
    }

    #[test]
    fn test_sequence_wraps_before_reserved_bit() {
        let generator = SequenceGenerator::with_seed(0x7FFF_FFFE);
        assert_eq!(generator.next(), 0x7FFF_FFFF);
        assert_eq!(generator.next(), 0);
        assert_eq!(generator.next(), 1);
    }

    #[test]
    fn test_seed_never_sets_reserved_bit() {
        let generator = SequenceGenerator::with_seed(u32::MAX);
        assert_eq!(generator.next(), 0);

        for _ in 0..64 {
            assert_eq!(SequenceGenerator::new().next() & SEQUENCE_NUMBER_LIMIT, 0);
        }
    }

    #[test]
    fn test_concurrent_producers_get_distinct_numbers() {
        let generator = Arc::new(SequenceGenerator::with_seed(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = generator.clone();
                thread::spawn(move || (0..1000).map(|_| generator.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for sequence_number in handle.join().unwrap() {
                assert!(seen.insert(sequence_number), "duplicate {}", sequence_number);
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
