//! Reorder buffer for sequenced status updates.
//!
//! Rooms number every status broadcast, but nothing guarantees that a
//! bot's inbound channel sees them in order. [`UpdateBuffer`] holds early
//! arrivals until the gap before them is filled, then releases the whole
//! contiguous run at once.
//!
//! ```text
//! expected = 1
//! push(2, b)  → []          pending {2}
//! push(3, c)  → []          pending {2, 3}
//! push(1, a)  → [a, b, c]   expected = 4
//! push(5, e)  → []          pending {5}   (4 still missing)
//! ```

use std::collections::BTreeMap;

/// Buffers out-of-order updates and releases them in sequence order.
#[derive(Debug, Clone)]
pub struct UpdateBuffer<T> {
    expected: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> UpdateBuffer<T> {
    /// An empty buffer waiting for sequence number 1.
    pub fn new() -> Self {
        Self {
            expected: 1,
            pending: BTreeMap::new(),
        }
    }

    /// The next sequence number the buffer will release.
    pub fn expected(&self) -> u64 {
        self.expected
    }

    /// Number of updates held back by a gap.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Accepts one update and returns every payload that is now in order.
    ///
    /// The returned payloads are the contiguous run starting at the
    /// expected sequence number, in increasing order. The run is only
    /// drained when `sequence` itself is the expected one; anything else
    /// is stored (a duplicate overwrites the earlier copy). Sequence
    /// numbers already released, and zero, are ignored.
    pub fn push(&mut self, sequence: u64, payload: T) -> Vec<T> {
        if sequence == 0 || sequence < self.expected {
            return Vec::new();
        }
        self.pending.insert(sequence, payload);
        if sequence != self.expected {
            return Vec::new();
        }

        let mut ready = Vec::new();
        while let Some(payload) = self.pending.remove(&self.expected) {
            ready.push(payload);
            self.expected += 1;
        }
        ready
    }
}

impl<T> Default for UpdateBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
