//! Total order over cells
//!
//! Row ascending, then family, then qualifier, then timestamp *descending*
//! (newer first), then type tag, then sequence id descending. Embedding
//! newest-first in the comparator lets every binary search and every merge
//! inherit the scan semantics without special cases.

use std::cmp::Ordering;

use super::{Cell, CellType};

/// Stateless cell comparator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellComparator;

impl CellComparator {
    /// Full total order, including the sequence-id tier.
    pub fn compare(a: &Cell, b: &Cell) -> Ordering {
        Self::compare_keys(a, b).then_with(|| b.seq_id().cmp(&a.seq_id()))
    }

    /// Order ignoring sequence ids. Used where logically identical cells
    /// from different writes should collate as equal.
    pub fn compare_keys(a: &Cell, b: &Cell) -> Ordering {
        let row_ord = a.row().cmp(b.row());
        if row_ord != Ordering::Equal {
            return row_ord;
        }
        Self::compare_without_row(a, b)
    }

    /// Order by row only.
    pub fn compare_rows(a: &Cell, b: &Cell) -> Ordering {
        a.row().cmp(b.row())
    }

    pub fn matching_rows(a: &Cell, b: &Cell) -> bool {
        a.row() == b.row()
    }

    fn compare_without_row(a: &Cell, b: &Cell) -> Ordering {
        // A rowkey-only cell tagged Minimum stands in for "after the last
        // column of this row": there is no lexicographically-last column to
        // compare against, so it wins against any real cell outright.
        if Self::is_last_on_row_marker(a) {
            return Ordering::Greater;
        }
        if Self::is_last_on_row_marker(b) {
            return Ordering::Less;
        }
        a.family()
            .cmp(b.family())
            .then_with(|| a.qualifier().cmp(b.qualifier()))
            // newer timestamps first
            .then_with(|| b.timestamp().cmp(&a.timestamp()))
            // higher type codes first (deletes ahead of puts at equal ts)
            .then_with(|| b.cell_type().code().cmp(&a.cell_type().code()))
    }

    fn is_last_on_row_marker(cell: &Cell) -> bool {
        cell.family().is_empty()
            && cell.qualifier().is_empty()
            && cell.cell_type() == CellType::Minimum
    }
}
