//! Flat navigable map over a cell store slice
//!
//! A `FlatCellMap` is `(store, [min_idx, max_idx), descending)`: navigable
//! lookups and range views over a contiguous slice of a frozen store. Every
//! submap and descending view shares the same store; building one never
//! copies cells. The map is read-only by construction, and the handful of
//! mutating operations the navigable interface drags along fail with
//! [`StoreError::Unsupported`].
//!
//! Internally every operation works in *logical* coordinates: position 0 is
//! the first cell in iteration order whichever way the map is oriented, and
//! a single binary search serves both orientations by reversing the
//! comparison sign for descending views. Boundary indexes translate back to
//! physical store positions only when a submap is materialized.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::cell::{Cell, CellComparator};
use crate::error::{Result, StoreError};

use super::CellStore;

/// Navigable map keyed (and valued) by cells.
#[derive(Debug, Clone)]
pub struct FlatCellMap {
    store: Arc<CellStore>,
    min_idx: usize,
    max_idx: usize,
    descending: bool,
}

impl FlatCellMap {
    /// Ascending map over the whole store.
    pub fn new(store: Arc<CellStore>) -> Self {
        let max_idx = store.len();
        Self {
            store,
            min_idx: 0,
            max_idx,
            descending: false,
        }
    }

    pub fn len(&self) -> usize {
        self.max_idx - self.min_idx
    }

    pub fn is_empty(&self) -> bool {
        self.min_idx == self.max_idx
    }

    pub fn is_descending(&self) -> bool {
        self.descending
    }

    pub fn comparator(&self) -> CellComparator {
        CellComparator
    }

    /// The store slot backing logical position `logical`.
    fn physical(&self, logical: usize) -> usize {
        if self.descending {
            self.max_idx - 1 - logical
        } else {
            self.min_idx + logical
        }
    }

    pub(crate) fn cell_at_logical(&self, logical: usize) -> Option<Arc<Cell>> {
        if logical >= self.len() {
            return None;
        }
        self.store.cell_at(self.physical(logical))
    }

    fn compare_oriented(&self, a: &Cell, b: &Cell) -> Ordering {
        let ord = CellComparator::compare(a, b);
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }

    /// Binary search for `needle` over logical positions `[lo, hi)`.
    ///
    /// `Ok(i)` is an exact match; `Err(i)` is the insertion point: the first
    /// position holding a cell greater than the needle in oriented order.
    fn find_in(&self, mut lo: usize, mut hi: usize, needle: &Cell) -> std::result::Result<usize, usize> {
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let Some(mid_cell) = self.cell_at_logical(mid) else {
                return Err(lo);
            };
            match self.compare_oriented(&mid_cell, needle) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(mid),
            }
        }
        Err(lo)
    }

    fn find(&self, needle: &Cell) -> std::result::Result<usize, usize> {
        self.find_in(0, self.len(), needle)
    }

    // ---- point lookups ------------------------------------------------

    pub fn first_key(&self) -> Option<Arc<Cell>> {
        self.cell_at_logical(0)
    }

    pub fn last_key(&self) -> Option<Arc<Cell>> {
        self.len().checked_sub(1).and_then(|l| self.cell_at_logical(l))
    }

    /// Greatest key `<=` the given key in oriented order.
    pub fn floor_key(&self, key: &Cell) -> Option<Arc<Cell>> {
        match self.find(key) {
            Ok(found) => self.cell_at_logical(found),
            Err(insertion) => self.cell_at_logical(insertion.checked_sub(1)?),
        }
    }

    /// Least key `>=` the given key in oriented order.
    pub fn ceiling_key(&self, key: &Cell) -> Option<Arc<Cell>> {
        match self.find(key) {
            Ok(found) => self.cell_at_logical(found),
            Err(insertion) => self.cell_at_logical(insertion),
        }
    }

    /// Greatest key strictly `<` the given key.
    pub fn lower_key(&self, key: &Cell) -> Option<Arc<Cell>> {
        let at = match self.find(key) {
            Ok(found) => found,
            Err(insertion) => insertion,
        };
        self.cell_at_logical(at.checked_sub(1)?)
    }

    /// Least key strictly `>` the given key.
    pub fn higher_key(&self, key: &Cell) -> Option<Arc<Cell>> {
        match self.find(key) {
            Ok(found) => self.cell_at_logical(found + 1),
            Err(insertion) => self.cell_at_logical(insertion),
        }
    }

    pub fn get(&self, key: &Cell) -> Option<Arc<Cell>> {
        self.find(key).ok().and_then(|i| self.cell_at_logical(i))
    }

    pub fn contains_key(&self, key: &Cell) -> bool {
        self.find(key).is_ok()
    }

    pub fn first_entry(&self) -> Option<CellEntry> {
        self.first_key().map(CellEntry::new)
    }

    pub fn last_entry(&self) -> Option<CellEntry> {
        self.last_key().map(CellEntry::new)
    }

    pub fn floor_entry(&self, key: &Cell) -> Option<CellEntry> {
        self.floor_key(key).map(CellEntry::new)
    }

    pub fn ceiling_entry(&self, key: &Cell) -> Option<CellEntry> {
        self.ceiling_key(key).map(CellEntry::new)
    }

    pub fn lower_entry(&self, key: &Cell) -> Option<CellEntry> {
        self.lower_key(key).map(CellEntry::new)
    }

    pub fn higher_entry(&self, key: &Cell) -> Option<CellEntry> {
        self.higher_key(key).map(CellEntry::new)
    }

    // ---- range views ---------------------------------------------------

    /// Logical boundary index for a submap side.
    ///
    /// `tail` selects the lower side of the range. When the anchor key
    /// exists the index steps past it exactly when the anchor belongs to
    /// the other side's set; the result is clamped to `[0, len]`.
    fn boundary_index(&self, key: &Cell, inclusive: bool, tail: bool) -> usize {
        let at = match self.find(key) {
            Ok(found) => found + usize::from(tail ^ inclusive),
            Err(insertion) => insertion,
        };
        at.min(self.len())
    }

    /// View over logical positions `[lo, hi)`, sharing the store.
    fn slice(&self, lo: usize, hi: usize) -> Self {
        let lo = lo.min(self.len());
        let hi = hi.min(self.len()).max(lo);
        let (min_idx, max_idx) = if self.descending {
            (self.max_idx - hi, self.max_idx - lo)
        } else {
            (self.min_idx + lo, self.min_idx + hi)
        };
        Self {
            store: Arc::clone(&self.store),
            min_idx,
            max_idx,
            descending: self.descending,
        }
    }

    /// Keys from `from` to `to` in oriented order. Expects `from <= to`
    /// under the oriented comparator; reversed bounds yield an empty map.
    pub fn sub_map(
        &self,
        from: &Cell,
        from_inclusive: bool,
        to: &Cell,
        to_inclusive: bool,
    ) -> Self {
        let lo = self.boundary_index(from, from_inclusive, true);
        let hi = self.boundary_index(to, to_inclusive, false);
        self.slice(lo, hi.max(lo))
    }

    pub fn head_map(&self, to: &Cell, inclusive: bool) -> Self {
        self.slice(0, self.boundary_index(to, inclusive, false))
    }

    pub fn tail_map(&self, from: &Cell, inclusive: bool) -> Self {
        self.slice(self.boundary_index(from, inclusive, true), self.len())
    }

    /// Reverse-ordered view over the same slice. No copying.
    pub fn descending_map(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            min_idx: self.min_idx,
            max_idx: self.max_idx,
            descending: !self.descending,
        }
    }

    /// Cells in oriented order.
    pub fn values(&self) -> CellIter<'_> {
        CellIter { map: self, next: 0 }
    }

    // ---- index helpers for scanners ------------------------------------

    /// Logical position of the least cell `>=` key, searching `[lo, len)`.
    pub(crate) fn ceiling_index_from(&self, lo: usize, key: &Cell) -> usize {
        match self.find_in(lo.min(self.len()), self.len(), key) {
            Ok(found) => found,
            Err(insertion) => insertion,
        }
    }

    /// Logical position of the greatest cell strictly `<` key.
    pub(crate) fn lower_index(&self, key: &Cell) -> Option<usize> {
        let at = match self.find(key) {
            Ok(found) => found,
            Err(insertion) => insertion,
        };
        at.checked_sub(1)
    }

    // ---- unsupported navigable-map surface -----------------------------

    /// Frozen maps accept no inserts.
    pub fn put(&self, _key: Cell, _value: Cell) -> Result<Arc<Cell>> {
        Err(StoreError::Unsupported("put on a frozen cell map"))
    }

    pub fn remove(&self, _key: &Cell) -> Result<Arc<Cell>> {
        Err(StoreError::Unsupported("remove on a frozen cell map"))
    }

    pub fn clear(&self) -> Result<()> {
        Err(StoreError::Unsupported("clear on a frozen cell map"))
    }

    pub fn poll_first_entry(&self) -> Result<CellEntry> {
        Err(StoreError::Unsupported("poll_first_entry on a frozen cell map"))
    }

    pub fn poll_last_entry(&self) -> Result<CellEntry> {
        Err(StoreError::Unsupported("poll_last_entry on a frozen cell map"))
    }

    /// Value lookups are key lookups here, and scanning for one is not a
    /// supported access path.
    pub fn contains_value(&self, _value: &Cell) -> Result<bool> {
        Err(StoreError::Unsupported("contains_value on a frozen cell map"))
    }
}

impl<'a> IntoIterator for &'a FlatCellMap {
    type Item = Arc<Cell>;
    type IntoIter = CellIter<'a>;

    fn into_iter(self) -> CellIter<'a> {
        self.values()
    }
}

/// Single-pass iterator over a map's cells in oriented order.
pub struct CellIter<'a> {
    map: &'a FlatCellMap,
    next: usize,
}

impl Iterator for CellIter<'_> {
    type Item = Arc<Cell>;

    fn next(&mut self) -> Option<Arc<Cell>> {
        let cell = self.map.cell_at_logical(self.next)?;
        self.next += 1;
        Some(cell)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.map.len().saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for CellIter<'_> {}

/// Entry view: a cell is both key and value, so both accessors return the
/// same tuple.
#[derive(Debug, Clone)]
pub struct CellEntry {
    cell: Arc<Cell>,
}

impl CellEntry {
    fn new(cell: Arc<Cell>) -> Self {
        Self { cell }
    }

    pub fn key(&self) -> &Cell {
        &self.cell
    }

    pub fn value(&self) -> &Cell {
        &self.cell
    }

    pub fn into_cell(self) -> Arc<Cell> {
        self.cell
    }

    /// Entries of a frozen map are as immutable as the map.
    pub fn set_value(&mut self, _value: Cell) -> Result<Arc<Cell>> {
        Err(StoreError::Unsupported("set_value on a frozen map entry"))
    }
}
