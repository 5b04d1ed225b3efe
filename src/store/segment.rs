//! Mutable ingestion segment
//!
//! The write buffer in front of the frozen stores: cells land here ordered
//! by the cell comparator, get stamped with a monotonic sequence id, and are
//! published as an immutable [`CellStore`] snapshot when the segment is
//! frozen. After `freeze` the data is never touched again, so readers of the
//! snapshot need no locks.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cell::{Cell, CellComparator};
use crate::config::{FlattenTarget, MemStoreConfig};
use crate::error::Result;

use super::{ArrayStore, BlockStore, CellBlockBuilder, CellStore};

/// `Arc<Cell>` ordered by the full cell comparator.
#[derive(Debug, Clone)]
struct OrderedCell(Arc<Cell>);

impl PartialEq for OrderedCell {
    fn eq(&self, other: &Self) -> bool {
        CellComparator::compare(&self.0, &other.0).is_eq()
    }
}

impl Eq for OrderedCell {}

impl PartialOrd for OrderedCell {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedCell {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        CellComparator::compare(&self.0, &other.0)
    }
}

/// In-memory write buffer.
pub struct MutableSegment {
    cells: RwLock<BTreeSet<OrderedCell>>,

    /// Approximate heap bytes held by the segment.
    heap_size: AtomicUsize,

    /// Next sequence id to stamp (ids start at 1).
    next_seq: AtomicU64,

    /// Heap-size threshold after which `should_flatten` reports true.
    flatten_size: usize,
}

impl MutableSegment {
    pub fn new(config: &MemStoreConfig) -> Self {
        Self {
            cells: RwLock::new(BTreeSet::new()),
            heap_size: AtomicUsize::new(0),
            next_seq: AtomicU64::new(1),
            flatten_size: config.segment_flatten_size,
        }
    }

    /// Insert a cell, stamping it with the next sequence id.
    /// Returns the id assigned to this write.
    pub fn put(&self, cell: Cell) -> u64 {
        let seq_id = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let cell = cell.with_seq(seq_id);
        self.heap_size.fetch_add(cell.heap_size(), Ordering::Relaxed);
        // seq ids are unique, so two writes never collate equal
        self.cells.write().insert(OrderedCell(Arc::new(cell)));
        seq_id
    }

    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }

    pub fn heap_size(&self) -> usize {
        self.heap_size.load(Ordering::Relaxed)
    }

    pub fn should_flatten(&self) -> bool {
        self.heap_size() >= self.flatten_size
    }

    /// Freeze the segment into an immutable store.
    ///
    /// Takes the segment by value: once a snapshot is published there is no
    /// path left that could mutate it.
    pub fn freeze(self, target: FlattenTarget) -> Result<CellStore> {
        let cells = self.cells.into_inner();
        if cells.is_empty() {
            return Ok(CellStore::Empty);
        }
        match target {
            FlattenTarget::Array => {
                let cells: Vec<Arc<Cell>> = cells.into_iter().map(|c| c.0).collect();
                Ok(CellStore::Array(ArrayStore::from_sorted(cells)))
            }
            FlattenTarget::Block => {
                let mut builder = CellBlockBuilder::new();
                for cell in &cells {
                    builder.push(&cell.0)?;
                }
                Ok(CellStore::Block(BlockStore::from_bytes(builder.finish()?)?))
            }
        }
    }
}
