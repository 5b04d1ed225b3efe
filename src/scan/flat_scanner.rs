//! Scanner over a flat cell map

use std::sync::Arc;

use crate::cell::{Cell, CellComparator};
use crate::error::Result;
use crate::store::{CellStore, FlatCellMap};

use super::ScannerPort;

/// Cursor over an ascending [`FlatCellMap`]. The workhorse scanner for
/// in-memory segments: every operation is a binary search or an index
/// increment, nothing can block.
pub struct FlatMapScanner {
    map: FlatCellMap,

    /// Logical position of the cached peek; `map.len()` when exhausted.
    pos: usize,

    /// Cached peek cell.
    cur: Option<Arc<Cell>>,

    closed: bool,
}

impl FlatMapScanner {
    pub fn new(map: FlatCellMap) -> Self {
        // reverse operations do their own index math; the cursor always
        // walks the ascending orientation
        let map = if map.is_descending() {
            map.descending_map()
        } else {
            map
        };
        let cur = map.cell_at_logical(0);
        Self {
            map,
            pos: 0,
            cur,
            closed: false,
        }
    }

    pub fn from_store(store: Arc<CellStore>) -> Self {
        Self::new(FlatCellMap::new(store))
    }

    fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
        self.cur = self.map.cell_at_logical(pos);
    }
}

impl ScannerPort for FlatMapScanner {
    fn peek(&self) -> Option<Arc<Cell>> {
        self.cur.clone()
    }

    fn next(&mut self) -> Result<Option<Arc<Cell>>> {
        let out = self.cur.take();
        if out.is_some() {
            self.pos += 1;
            self.cur = self.map.cell_at_logical(self.pos);
        }
        Ok(out)
    }

    fn seek(&mut self, key: &Cell) -> Result<bool> {
        let pos = self.map.ceiling_index_from(0, key);
        self.set_pos(pos);
        Ok(self.cur.is_some())
    }

    fn reseek(&mut self, key: &Cell) -> Result<bool> {
        // the caller promised key is not before the current position
        let pos = self.map.ceiling_index_from(self.pos, key);
        self.set_pos(pos);
        Ok(self.cur.is_some())
    }

    fn seek_to_previous_row(&mut self, key: &Cell) -> Result<bool> {
        let boundary = Cell::first_on_row(key.row());
        let Some(before_row) = self
            .map
            .lower_index(&boundary)
            .and_then(|i| self.map.cell_at_logical(i))
        else {
            self.set_pos(self.map.len());
            return Ok(false);
        };
        self.seek(&Cell::first_on_row(before_row.row()))
    }

    fn backward_seek(&mut self, key: &Cell) -> Result<bool> {
        self.seek(key)?;
        match &self.cur {
            Some(cell) if CellComparator::matching_rows(cell, key) => Ok(true),
            _ => self.seek_to_previous_row(key),
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.cur = None;
        self.pos = self.map.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellType;
    use crate::store::ArrayStore;

    fn kv(row: &str, ts: i64) -> Cell {
        Cell::new(row, "f", "q", ts, CellType::Put, format!("{row}@{ts}"))
    }

    fn scanner(cells: Vec<Cell>) -> FlatMapScanner {
        FlatMapScanner::from_store(Arc::new(CellStore::Array(ArrayStore::from_cells(cells))))
    }

    fn sample() -> FlatMapScanner {
        scanner(vec![kv("a", 2), kv("a", 1), kv("b", 3), kv("c", 2), kv("c", 1)])
    }

    #[test]
    fn test_next_walks_ascending() {
        let mut s = sample();
        let mut seen = Vec::new();
        while let Some(cell) = s.next().unwrap() {
            seen.push(String::from_utf8(cell.value().to_vec()).unwrap());
        }
        assert_eq!(seen, vec!["a@2", "a@1", "b@3", "c@2", "c@1"]);
        assert!(s.peek().is_none());
        assert!(s.next().unwrap().is_none());
    }

    #[test]
    fn test_peek_does_not_advance() {
        let mut s = sample();
        assert_eq!(s.peek().unwrap().value(), b"a@2");
        assert_eq!(s.peek().unwrap().value(), b"a@2");
        assert_eq!(s.next().unwrap().unwrap().value(), b"a@2");
        assert_eq!(s.peek().unwrap().value(), b"a@1");
    }

    #[test]
    fn test_seek_lands_on_ceiling() {
        let mut s = sample();
        assert!(s.seek(&kv("b", 9)).unwrap());
        // (b,9) sorts before (b,3): newest first
        assert_eq!(s.peek().unwrap().value(), b"b@3");
        assert!(s.seek(&kv("b", 1)).unwrap());
        assert_eq!(s.peek().unwrap().value(), b"c@2");
        assert!(!s.seek(&kv("z", 1)).unwrap());
        assert!(s.peek().is_none());
    }

    #[test]
    fn test_reseek_moves_forward_only() {
        let mut s = sample();
        assert!(s.seek(&kv("b", 3)).unwrap());
        assert!(s.reseek(&kv("c", 2)).unwrap());
        assert_eq!(s.peek().unwrap().value(), b"c@2");
    }

    #[test]
    fn test_seek_to_previous_row() {
        let mut s = sample();
        assert!(s.seek_to_previous_row(&kv("c", 1)).unwrap());
        // first (newest) cell of row b
        assert_eq!(s.peek().unwrap().value(), b"b@3");
        assert!(s.seek_to_previous_row(&kv("b", 3)).unwrap());
        assert_eq!(s.peek().unwrap().value(), b"a@2");
        // nothing before row a
        assert!(!s.seek_to_previous_row(&kv("a", 1)).unwrap());
        assert!(s.peek().is_none());
    }

    #[test]
    fn test_backward_seek_within_row() {
        let mut s = sample();
        assert!(s.backward_seek(&kv("c", 5)).unwrap());
        // row c has cells >= (c,5): the newest one
        assert_eq!(s.peek().unwrap().value(), b"c@2");
    }

    #[test]
    fn test_backward_seek_falls_to_previous_row() {
        let mut s = sample();
        // (b,1) is older than everything in row b, so fall back to row a
        assert!(s.backward_seek(&kv("b", 1)).unwrap());
        assert_eq!(s.peek().unwrap().value(), b"a@2");
        // before the first row entirely
        assert!(!s.backward_seek(&kv("a", 0)).unwrap());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut s = sample();
        s.close();
        assert!(s.peek().is_none());
        s.close();
        assert!(s.peek().is_none());
    }

    #[test]
    fn test_descending_map_is_normalized() {
        let store = Arc::new(CellStore::Array(ArrayStore::from_cells(vec![
            kv("a", 1),
            kv("b", 1),
        ])));
        let mut s = FlatMapScanner::new(FlatCellMap::new(store).descending_map());
        assert_eq!(s.next().unwrap().unwrap().row(), b"a");
        assert_eq!(s.next().unwrap().unwrap().row(), b"b");
    }
}
