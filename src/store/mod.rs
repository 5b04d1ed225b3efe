//! Immutable cell stores and the flat map over them
//!
//! ## Architecture
//! - **MutableSegment**: ingestion buffer ordered by the cell comparator
//! - **CellStore**: frozen, index-addressable snapshot (array / block / empty)
//! - **FlatCellMap**: navigable-map views over a contiguous store slice
//!
//! A store is built once, published behind `Arc`, and never mutated again.
//! Publication through `Arc` is the release/acquire edge readers rely on:
//! any thread that observes the store reference observes fully built
//! contents.

mod array;
mod block;
mod flat_map;
mod segment;

use std::sync::Arc;

pub use array::ArrayStore;
pub use block::{BlockStore, CellBlockBuilder};
pub use flat_map::{CellEntry, CellIter, FlatCellMap};
pub use segment::MutableSegment;

use crate::cell::Cell;

/// Frozen, index-addressable container of cells sorted ascending by the
/// cell comparator.
///
/// A tagged enum rather than a trait object: `cell_at` sits inside the
/// binary-search inner loop and the heap comparator.
#[derive(Debug)]
pub enum CellStore {
    Array(ArrayStore),
    Block(BlockStore),
    Empty,
}

impl CellStore {
    pub fn len(&self) -> usize {
        match self {
            CellStore::Array(s) => s.len(),
            CellStore::Block(s) => s.len(),
            CellStore::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The i-th cell in comparator order, or `None` past the end.
    pub fn cell_at(&self, index: usize) -> Option<Arc<Cell>> {
        match self {
            CellStore::Array(s) => s.cell_at(index),
            CellStore::Block(s) => s.cell_at(index),
            CellStore::Empty => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellType;
    use crate::config::{FlattenTarget, MemStoreConfig};

    #[test]
    fn test_segment_to_block_store_to_map() {
        let segment = MutableSegment::new(&MemStoreConfig::default());
        for (row, ts) in [("b", 2), ("a", 1), ("c", 5), ("a", 4)] {
            segment.put(Cell::new(row, "f", "q", ts, CellType::Put, format!("{row}@{ts}")));
        }
        let store = Arc::new(segment.freeze(FlattenTarget::Block).unwrap());
        assert!(matches!(*store, CellStore::Block(_)));

        let map = FlatCellMap::new(Arc::clone(&store));
        assert_eq!(map.len(), 4);
        assert_eq!(map.first_key().unwrap().value(), b"a@4");
        assert_eq!(map.last_key().unwrap().value(), b"c@5");

        let probe = Cell::new("b", "f", "q", 9, CellType::Put, "");
        assert_eq!(map.ceiling_key(&probe).unwrap().value(), b"b@2");
        assert_eq!(map.lower_key(&probe).unwrap().value(), b"a@1");

        let values: Vec<Vec<u8>> = map
            .descending_map()
            .values()
            .map(|c| c.value().to_vec())
            .collect();
        assert_eq!(values, vec![b"c@5".to_vec(), b"b@2".to_vec(), b"a@4".to_vec(), b"a@1".to_vec()]);
    }
}
