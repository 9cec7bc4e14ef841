//! Core slot allocation
//!
//! Slots are handed out from an explicit free-list sized `max_cores`.
//! Released slots go to the back of the list, so ids are reused only after
//! every never-used id has been handed out.

use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Index of an execution core (and of its register bank)
pub type CoreId = u32;

/// External position key a core is assigned to. Opaque to this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey {
    pub x: i32,
    pub y: i32,
}

impl PositionKey {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Key → core id assignment table with a bounded free-list
#[derive(Debug, Clone)]
pub struct SlotTable {
    free: VecDeque<CoreId>,
    assigned: HashMap<PositionKey, CoreId>,
    capacity: usize,
}

impl SlotTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: (0..capacity as CoreId).collect(),
            assigned: HashMap::new(),
            capacity,
        }
    }

    /// Take the next free slot for `key`; `None` when exhausted
    pub fn assign(&mut self, key: PositionKey) -> Option<CoreId> {
        let id = self.free.pop_front()?;
        self.assigned.insert(key, id);
        Some(id)
    }

    /// Return `key`'s slot to the free-list
    pub fn release(&mut self, key: &PositionKey) -> Option<CoreId> {
        let id = self.assigned.remove(key)?;
        self.free.push_back(id);
        Some(id)
    }

    pub fn lookup(&self, key: &PositionKey) -> Option<CoreId> {
        self.assigned.get(key).copied()
    }

    /// Assignments ordered by core id
    pub fn assignments(&self) -> Vec<(PositionKey, CoreId)> {
        let mut out: Vec<_> = self.assigned.iter().map(|(k, id)| (*k, *id)).collect();
        out.sort_by_key(|(_, id)| *id);
        out
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free_slots(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_in_order() {
        let mut table = SlotTable::new(3);
        assert_eq!(table.assign(PositionKey::new(0, 0)), Some(0));
        assert_eq!(table.assign(PositionKey::new(1, 0)), Some(1));
        assert_eq!(table.assign(PositionKey::new(2, 0)), Some(2));
        assert_eq!(table.assign(PositionKey::new(3, 0)), None);
        assert_eq!(table.free_slots(), 0);
    }

    #[test]
    fn test_release_goes_to_back() {
        let mut table = SlotTable::new(3);
        let a = PositionKey::new(0, 0);
        table.assign(a);
        assert_eq!(table.release(&a), Some(0));
        assert_eq!(table.release(&a), None);
        assert_eq!(table.assign(PositionKey::new(5, 5)), Some(1));
    }

    #[test]
    fn test_assignments_sorted() {
        let mut table = SlotTable::new(4);
        table.assign(PositionKey::new(9, 9));
        table.assign(PositionKey::new(-1, 2));
        assert_eq!(
            table.assignments(),
            vec![(PositionKey::new(9, 9), 0), (PositionKey::new(-1, 2), 1)]
        );
        assert_eq!(PositionKey::new(-1, 2).to_string(), "-1,2");
    }
}
