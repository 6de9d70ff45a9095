//! Pending-call table.
//!
//! Slot `i` belongs to the call with sequence number `i`. A slot is either
//! awaiting its reply (it holds the completion handle) or empty. Resolved
//! slots are emptied in place so that every higher slot keeps its index.
//!
//! The table length doubles as the next sequence number. After a reply for
//! the most recently issued call, trailing empty slots are trimmed, so the
//! table shrinks back to the highest call still awaiting a reply. Holes
//! below that call stay addressable until everything above them resolves.
//!
//! A trimmed sequence number is handed out again by the next `allocate`.
//! Numbers are never reused while their slot is awaiting a reply.

use tracing::trace;

use crate::error::CorrelationError;

/// Sequence-indexed table of outstanding calls.
///
/// Generic over the completion handle so the bookkeeping can be exercised
/// without a runtime.
#[derive(Debug)]
pub struct Correlator<H> {
    slots: Vec<Option<H>>,
}

impl<H> Default for Correlator<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Correlator<H> {
    /// Create an empty table; the first call gets sequence number 0.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// The sequence number the next `allocate` will return.
    pub fn next_sequence(&self) -> u64 {
        self.slots.len() as u64
    }

    /// Logical table length. Equal to [`next_sequence`](Self::next_sequence).
    pub fn len(&self) -> u64 {
        self.next_sequence()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots still awaiting a reply.
    pub fn outstanding(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether `sequence` is awaiting a reply.
    pub fn is_awaiting(&self, sequence: u64) -> bool {
        self.index(sequence)
            .is_some_and(|index| self.slots[index].is_some())
    }

    /// Record a new outstanding call and return its sequence number.
    pub fn allocate(&mut self, handle: H) -> u64 {
        let sequence = self.next_sequence();
        self.slots.push(Some(handle));
        trace!(sequence, "slot allocated");
        sequence
    }

    /// Take the completion handle for `sequence`, then trim the table tail.
    ///
    /// Unknown, out-of-range and already-resolved sequence numbers are
    /// rejected without touching any other slot.
    pub fn resolve(&mut self, sequence: u64) -> Result<H, CorrelationError> {
        let index = self.index(sequence).ok_or(CorrelationError::OutOfRange {
            sequence,
            len: self.len(),
        })?;
        let handle = self.slots[index]
            .take()
            .ok_or(CorrelationError::AlreadyResolved(sequence))?;
        self.compact(sequence);
        Ok(handle)
    }

    /// Empty the table, yielding every handle still awaiting a reply.
    pub fn drain(&mut self) -> impl Iterator<Item = (u64, H)> {
        std::mem::take(&mut self.slots)
            .into_iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|handle| (index as u64, handle)))
    }

    fn index(&self, sequence: u64) -> Option<usize> {
        usize::try_from(sequence)
            .ok()
            .filter(|&index| index < self.slots.len())
    }

    fn compact(&mut self, resolved: u64) {
        if resolved + 1 != self.next_sequence() {
            return;
        }
        while let Some(None) = self.slots.last() {
            self.slots.pop();
        }
        trace!(resolved, len = self.len(), "table compacted");
    }
}
