//! Round-robin rotation cursor.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Rotation cursor shared by all requests for one model.
///
/// Only ever incremented; callers read it modulo the pool size.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one, returning the position before the advance.
    pub fn advance(&self) -> usize {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Current position without advancing.
    pub fn current(&self) -> usize {
        self.counter.load(Ordering::Relaxed)
    }

    /// Indices of a pool of `len` backends, starting at `start` and wrapping.
    pub fn rotation(start: usize, len: usize) -> impl Iterator<Item = usize> {
        let base = if len == 0 { 0 } else { start % len };
        (0..len).map(move |offset| (base + offset) % len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let rr = RoundRobin::new();
        assert_eq!(rr.advance(), 0);
        assert_eq!(rr.advance(), 1);
        assert_eq!(rr.current(), 2);
    }

    #[test]
    fn rotation_wraps() {
        let order: Vec<usize> = RoundRobin::rotation(5, 3).collect();
        assert_eq!(order, vec![2, 0, 1]);
    }
}
