//! Supervisor-call vector table.
//!
//! `SVC adr,x` looks up `adr+x` here and, if there is an entry, calls the
//! mapped address. The table is configured by whoever drives the CPU; the
//! emulated program can only read it.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

/// Mapping from trap number to handler address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrapTable {
    vectors: BTreeMap<u16, u16>,
}

impl TrapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `trap` to `vector`, returning the previous vector if any.
    pub fn insert(&mut self, trap: u16, vector: u16) -> Option<u16> {
        self.vectors.insert(trap, vector)
    }

    pub fn remove(&mut self, trap: u16) -> Option<u16> {
        self.vectors.remove(&trap)
    }

    /// The handler address for `trap`.
    pub fn get(&self, trap: u16) -> Option<u16> {
        self.vectors.get(&trap).copied()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn clear(&mut self) {
        self.vectors.clear();
    }

    /// Iterate over `(trap, vector)` pairs in trap order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.vectors.iter().map(|(&trap, &vector)| (trap, vector))
    }
}

impl FromIterator<(u16, u16)> for TrapTable {
    fn from_iter<I: IntoIterator<Item = (u16, u16)>>(iter: I) -> Self {
        Self {
            vectors: iter.into_iter().collect(),
        }
    }
}

impl Extend<(u16, u16)> for TrapTable {
    fn extend<I: IntoIterator<Item = (u16, u16)>>(&mut self, iter: I) {
        self.vectors.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut traps = TrapTable::new();
        assert!(traps.is_empty());

        assert_eq!(traps.insert(1, 0x0100), None);
        assert_eq!(traps.insert(1, 0x0200), Some(0x0100));
        assert_eq!(traps.get(1), Some(0x0200));
        assert_eq!(traps.get(2), None);
        assert_eq!(traps.len(), 1);
    }

    #[test]
    fn test_collect_and_iterate() {
        let mut traps: TrapTable = [(3, 0x30), (1, 0x10)].into_iter().collect();
        traps.extend([(2, 0x20)]);

        let pairs: Vec<_> = traps.iter().collect();
        assert_eq!(pairs, vec![(1, 0x10), (2, 0x20), (3, 0x30)]);

        assert_eq!(traps.remove(2), Some(0x20));
        traps.clear();
        assert!(traps.is_empty());
    }
}
