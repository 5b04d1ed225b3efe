//! Array-backed cell store

use std::sync::Arc;

use crate::cell::{Cell, CellComparator};

/// On-heap store: one `Arc` slot per cell.
#[derive(Debug, Default)]
pub struct ArrayStore {
    cells: Vec<Arc<Cell>>,
}

impl ArrayStore {
    /// Wrap cells already sorted ascending by [`CellComparator`].
    pub fn from_sorted(cells: Vec<Arc<Cell>>) -> Self {
        debug_assert!(
            cells
                .windows(2)
                .all(|w| CellComparator::compare(&w[0], &w[1]).is_le()),
            "ArrayStore input must be sorted"
        );
        Self { cells }
    }

    /// Sort and wrap arbitrary cells. Test and ingestion convenience.
    pub fn from_cells(cells: Vec<Cell>) -> Self {
        let mut cells: Vec<Arc<Cell>> = cells.into_iter().map(Arc::new).collect();
        cells.sort_by(|a, b| CellComparator::compare(a, b));
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell_at(&self, index: usize) -> Option<Arc<Cell>> {
        self.cells.get(index).cloned()
    }
}
