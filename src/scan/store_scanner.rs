//! Frozen-store scanner with Bloom-assisted lazy seeks
//!
//! Wraps a [`FlatMapScanner`] with the two tricks file-backed scanners play
//! on the merge heaps:
//!
//! - a `request_seek` with the Bloom hint can answer "that column was never
//!   written" from the pre-filter and jump straight past it;
//! - otherwise the seek is recorded but not executed, and the scanner
//!   exposes the requested key as a *shadow* peek. The heap's
//!   `poll_real_cell` forces the real position (`enforce_seek`) only if the
//!   scanner actually reaches the top of the merge.

use std::sync::Arc;

use crate::cell::Cell;
use crate::config::MemStoreConfig;
use crate::error::Result;
use crate::store::CellStore;

use super::{FlatMapScanner, RowColBloom, ScannerPort};

pub struct StoreScanner {
    inner: FlatMapScanner,
    bloom: Option<RowColBloom>,

    /// False while a lazy request_seek is pending.
    real_seek_done: bool,
    delayed_key: Option<Cell>,
    delayed_is_reseek: bool,

    /// Shadow peek standing in for the pending position.
    shadow: Option<Arc<Cell>>,
}

impl StoreScanner {
    pub fn new(store: Arc<CellStore>) -> Self {
        Self {
            inner: FlatMapScanner::from_store(store),
            bloom: None,
            real_seek_done: true,
            delayed_key: None,
            delayed_is_reseek: false,
            shadow: None,
        }
    }

    /// Build the scanner together with a row/column Bloom over the store.
    pub fn with_bloom(store: Arc<CellStore>, config: &MemStoreConfig) -> Self {
        let bloom = RowColBloom::from_store(&store, config.bloom_bits_per_key);
        Self {
            bloom: Some(bloom),
            ..Self::new(store)
        }
    }

    fn clear_lazy(&mut self) {
        self.real_seek_done = true;
        self.delayed_key = None;
        self.shadow = None;
    }
}

impl ScannerPort for StoreScanner {
    fn peek(&self) -> Option<Arc<Cell>> {
        if self.real_seek_done {
            self.inner.peek()
        } else {
            self.shadow.clone()
        }
    }

    fn next(&mut self) -> Result<Option<Arc<Cell>>> {
        if !self.real_seek_done {
            self.enforce_seek()?;
        }
        self.inner.next()
    }

    fn seek(&mut self, key: &Cell) -> Result<bool> {
        self.clear_lazy();
        self.inner.seek(key)
    }

    fn reseek(&mut self, key: &Cell) -> Result<bool> {
        self.clear_lazy();
        self.inner.reseek(key)
    }

    fn seek_to_previous_row(&mut self, key: &Cell) -> Result<bool> {
        self.clear_lazy();
        self.inner.seek_to_previous_row(key)
    }

    fn backward_seek(&mut self, key: &Cell) -> Result<bool> {
        self.clear_lazy();
        self.inner.backward_seek(key)
    }

    fn close(&mut self) {
        self.clear_lazy();
        self.inner.close();
    }

    fn request_seek(&mut self, key: &Cell, forward: bool, use_bloom: bool) -> Result<bool> {
        if use_bloom && !key.family().is_empty() {
            if let Some(bloom) = &self.bloom {
                if !bloom.may_contain(key.row(), key.qualifier()) {
                    // the column was never written: skip every version of it
                    self.clear_lazy();
                    return self.inner.seek(&Cell::last_on_row_col(key));
                }
            }
        }
        self.real_seek_done = false;
        self.delayed_key = Some(key.clone());
        self.delayed_is_reseek = forward;
        self.shadow = Some(Arc::new(key.clone()));
        Ok(true)
    }

    fn seek_done(&self) -> bool {
        self.real_seek_done
    }

    fn enforce_seek(&mut self) -> Result<()> {
        if self.real_seek_done {
            return Ok(());
        }
        let key = self.delayed_key.take();
        let is_reseek = self.delayed_is_reseek;
        self.clear_lazy();
        if let Some(key) = key {
            if is_reseek {
                self.inner.reseek(&key)?;
            } else {
                self.inner.seek(&key)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellType;
    use crate::store::ArrayStore;

    fn cell(row: &str, qualifier: &str, ts: i64) -> Cell {
        Cell::new(row, "f", qualifier, ts, CellType::Put, format!("{row}:{qualifier}@{ts}"))
    }

    fn store() -> Arc<CellStore> {
        Arc::new(CellStore::Array(ArrayStore::from_cells(vec![
            cell("a", "q1", 2),
            cell("a", "q1", 1),
            cell("a", "q3", 1),
            cell("b", "q1", 1),
        ])))
    }

    #[test]
    fn test_plain_scan_matches_flat_scanner() {
        let mut s = StoreScanner::new(store());
        assert_eq!(s.peek().unwrap().value(), b"a:q1@2");
        assert!(s.seek(&cell("a", "q3", 9)).unwrap());
        assert_eq!(s.peek().unwrap().value(), b"a:q3@1");
    }

    #[test]
    fn test_bloom_miss_jumps_past_the_column() {
        let config = MemStoreConfig::default();
        let store = store();
        // find an absent qualifier the (deterministic) filter rejects; every
        // candidate sorts between q1 and q3 so the landing spot is fixed
        let bloom = RowColBloom::from_store(&store, config.bloom_bits_per_key);
        let qualifier = (0..100)
            .map(|i| format!("q2-{i}"))
            .find(|q| !bloom.may_contain(b"a", q.as_bytes()))
            .expect("bloom rejected none of 100 absent qualifiers");

        let mut s = StoreScanner::with_bloom(store, &config);
        assert!(s.request_seek(&cell("a", &qualifier, 5), false, true).unwrap());
        assert!(s.seek_done());
        assert_eq!(s.peek().unwrap().value(), b"a:q3@1");
    }

    #[test]
    fn test_bloom_hit_defers_the_seek() {
        let mut s = StoreScanner::with_bloom(store(), &MemStoreConfig::default());
        let key = cell("a", "q3", 5);
        assert!(s.request_seek(&key, false, true).unwrap());
        assert!(!s.seek_done());
        // shadow peek is the requested key itself
        assert_eq!(s.peek().unwrap().qualifier(), b"q3");
        assert_eq!(s.peek().unwrap().timestamp(), 5);

        s.enforce_seek().unwrap();
        assert!(s.seek_done());
        assert_eq!(s.peek().unwrap().value(), b"a:q3@1");
    }

    #[test]
    fn test_next_forces_pending_seek() {
        let mut s = StoreScanner::with_bloom(store(), &MemStoreConfig::default());
        assert!(s.request_seek(&cell("b", "q1", 5), false, true).unwrap());
        assert!(!s.seek_done());
        assert_eq!(s.next().unwrap().unwrap().value(), b"b:q1@1");
        assert!(s.peek().is_none());
    }

    #[test]
    fn test_real_seek_clears_pending_state() {
        let mut s = StoreScanner::with_bloom(store(), &MemStoreConfig::default());
        assert!(s.request_seek(&cell("a", "q3", 5), false, true).unwrap());
        assert!(s.seek(&cell("b", "q1", 5)).unwrap());
        assert!(s.seek_done());
        assert_eq!(s.peek().unwrap().row(), b"b");
    }

    #[test]
    fn test_without_bloom_request_seek_still_lazy() {
        let mut s = StoreScanner::new(store());
        assert!(s.request_seek(&cell("a", "q3", 5), true, true).unwrap());
        assert!(!s.seek_done());
        s.enforce_seek().unwrap();
        assert_eq!(s.peek().unwrap().value(), b"a:q3@1");
    }
}
