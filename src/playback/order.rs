use rand::seq::SliceRandom;
use rand::thread_rng;

/// Random play order over store indices, walked by a cursor.
#[derive(Debug, Clone)]
pub(crate) struct ShuffleOrder {
    order: Vec<usize>,
    pos: usize,
}

impl ShuffleOrder {
    /// A fresh permutation of `0..len` that starts at `first`.
    pub(crate) fn new(len: usize, first: usize) -> Self {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut thread_rng());
        if let Some(at) = order.iter().position(|&i| i == first) {
            order.swap(0, at);
        }
        Self { order, pos: 0 }
    }

    pub(crate) fn current(&self) -> Option<usize> {
        self.order.get(self.pos).copied()
    }

    /// Step forward; `None` once the order is exhausted (cursor stays on the last entry).
    pub(crate) fn advance(&mut self) -> Option<usize> {
        if self.pos + 1 < self.order.len() {
            self.pos += 1;
            self.current()
        } else {
            None
        }
    }

    /// Step back, stopping at the first entry.
    pub(crate) fn back(&mut self) -> Option<usize> {
        self.pos = self.pos.saturating_sub(1);
        self.current()
    }

    /// Point the cursor at `index` if it is part of the order.
    pub(crate) fn seek(&mut self, index: usize) {
        if let Some(at) = self.order.iter().position(|&i| i == index) {
            self.pos = at;
        }
    }
}
