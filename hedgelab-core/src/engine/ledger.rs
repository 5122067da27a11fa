//! Position ledger: index arena of open positions.
//!
//! Closed positions leave a tombstone (`None`) in their slot so that the
//! remaining slots keep insertion order; the arena is compacted once
//! tombstones outnumber live positions.

use crate::domain::{Position, PositionId};

const COMPACT_MIN_SLOTS: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    slots: Vec<Option<Position>>,
    open: usize,
    next_id: u64,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the id for the next position to be inserted.
    pub fn next_id(&mut self) -> PositionId {
        let id = PositionId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, position: Position) {
        self.slots.push(Some(position));
        self.open += 1;
    }

    pub fn len(&self) -> usize {
        self.open
    }

    pub fn is_empty(&self) -> bool {
        self.open == 0
    }

    /// Open positions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.slots.iter().flatten()
    }

    /// Sum of margin reserved by currently open positions.
    pub fn reserved_margin(&self) -> f64 {
        self.iter().map(|p| p.margin).sum()
    }

    /// Remove every position for which `decide` returns `Some`, in insertion
    /// order, returning each with its decision.
    pub fn close_where<T>(
        &mut self,
        mut decide: impl FnMut(&Position) -> Option<T>,
    ) -> Vec<(Position, T)> {
        let mut closed = Vec::new();
        for slot in self.slots.iter_mut() {
            let Some(decision) = slot.as_ref().and_then(&mut decide) else {
                continue;
            };
            if let Some(position) = slot.take() {
                closed.push((position, decision));
            }
        }
        self.open -= closed.len();
        self.maybe_compact();
        closed
    }

    /// Remove all open positions, in insertion order.
    pub fn drain(&mut self) -> Vec<Position> {
        self.open = 0;
        self.slots.drain(..).flatten().collect()
    }

    fn maybe_compact(&mut self) {
        let tombstones = self.slots.len() - self.open;
        if self.slots.len() >= COMPACT_MIN_SLOTS && tombstones > self.open {
            self.slots.retain(Option::is_some);
        }
    }
}
