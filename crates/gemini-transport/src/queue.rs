/// Default queue capacity, larger than the longest frame including start bits.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Fixed-capacity FIFO of bits backed by a circular buffer.
///
/// Only the polling side of the engine touches a queue, so no locking is
/// involved. `pop` returns `None` on an empty queue instead of `false`, so an
/// empty queue can no longer be mistaken for a stored zero bit.
#[derive(Debug, Clone)]
pub struct BitQueue<const N: usize = DEFAULT_QUEUE_CAPACITY> {
    buffer: [bool; N],
    head: usize,
    tail: usize,
    count: usize,
}

impl<const N: usize> BitQueue<N> {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            buffer: [false; N],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Append a bit at the tail.
    ///
    /// Returns the rejected bit when the queue is full.
    pub fn push(&mut self, bit: bool) -> Result<(), bool> {
        if self.count >= N {
            return Err(bit);
        }
        self.buffer[self.tail] = bit;
        self.tail = (self.tail + 1) % N;
        self.count += 1;
        Ok(())
    }

    /// Remove the bit at the head, or `None` when empty.
    pub fn pop(&mut self) -> Option<bool> {
        if self.count == 0 {
            return None;
        }
        let bit = self.buffer[self.head];
        self.head = (self.head + 1) % N;
        self.count -= 1;
        Some(bit)
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == N
    }

    /// Number of queued bits.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Number of bits that can still be pushed.
    pub fn free(&self) -> usize {
        N - self.count
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Drop every queued bit.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }
}

impl<const N: usize> Default for BitQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_preserves_order() {
        let mut queue: BitQueue = BitQueue::new();
        let bits = [true, false, false, true, true, false, true];
        for bit in bits {
            queue.push(bit).unwrap();
        }
        assert_eq!(queue.len(), bits.len());

        let drained: Vec<bool> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(drained, bits);
        assert!(queue.is_empty());
    }

    #[test]
    fn push_beyond_capacity_fails() {
        let mut queue = BitQueue::<4>::new();
        for _ in 0..4 {
            queue.push(true).unwrap();
        }
        assert!(queue.is_full());
        assert_eq!(queue.free(), 0);
        assert_eq!(queue.push(false), Err(false));
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn pop_on_empty_is_none_not_false() {
        let mut queue: BitQueue = BitQueue::new();
        assert_eq!(queue.pop(), None);

        queue.push(false).unwrap();
        assert_eq!(queue.pop(), Some(false));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn wraps_around_the_buffer() {
        let mut queue = BitQueue::<3>::new();
        let mut expected = Vec::new();
        let mut seen = Vec::new();

        for i in 0..20u32 {
            let bit = i % 3 == 0;
            queue.push(bit).unwrap();
            expected.push(bit);
            if queue.len() == 2 {
                seen.push(queue.pop().unwrap());
            }
        }
        while let Some(bit) = queue.pop() {
            seen.push(bit);
        }

        assert_eq!(seen, expected);
    }

    #[test]
    fn count_never_exceeds_capacity_under_mixed_ops() {
        let mut queue = BitQueue::<8>::new();
        let mut model = std::collections::VecDeque::new();

        // Deterministic pseudo-random op sequence (xorshift).
        let mut seed = 0x9E37_79B9u32;
        for _ in 0..2_000 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            if seed % 3 == 0 {
                assert_eq!(queue.pop(), model.pop_front());
            } else {
                let bit = seed & 0x10 != 0;
                let pushed = queue.push(bit).is_ok();
                assert_eq!(pushed, model.len() < 8);
                if pushed {
                    model.push_back(bit);
                }
            }
            assert!(queue.len() <= queue.capacity());
            assert_eq!(queue.len(), model.len());
        }
    }

    #[test]
    fn clear_empties_queue() {
        let mut queue: BitQueue = BitQueue::new();
        queue.push(true).unwrap();
        queue.push(true).unwrap();
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.free(), DEFAULT_QUEUE_CAPACITY);
    }
}
