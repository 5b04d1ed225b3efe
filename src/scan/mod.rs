//! Scanners and scan-merging heaps
//!
//! ## Architecture
//! - **ScannerPort**: uniform view over any source of sorted cells
//! - **FlatMapScanner / StoreScanner**: ports over frozen in-memory stores
//! - **ForwardScanHeap**: k-way merge in ascending cell order
//! - **ReversedScanHeap**: k-way merge walking rows from highest to lowest,
//!   newest-first within each row
//!
//! A scan session is single-threaded; the heaps own their scanners and hand
//! exhausted ones back through a delayed-close list so callers can release
//! resources in bulk outside the merge hot path.

mod bloom;
mod flat_scanner;
mod forward_heap;
mod reversed_heap;
mod store_scanner;

use std::sync::Arc;

pub use bloom::RowColBloom;
pub use flat_scanner::FlatMapScanner;
pub use forward_heap::ForwardScanHeap;
pub use reversed_heap::ReversedScanHeap;
pub use store_scanner::StoreScanner;

use crate::cell::Cell;
use crate::error::Result;

/// A positioned stream of cells sorted ascending by the cell comparator.
///
/// Lifecycle: open → (advance | seek)* → closed. Exhaustion is reported by
/// `None` peeks and `false` seek returns, never by an error. `close` is
/// idempotent; no operation is invoked on a scanner after it was handed to
/// a close list.
pub trait ScannerPort {
    /// The cell the next `next` call would return. Does not advance.
    fn peek(&self) -> Option<Arc<Cell>>;

    /// Return the current peek and advance past it.
    fn next(&mut self) -> Result<Option<Arc<Cell>>>;

    /// Position so `peek` is the least cell `>=` key. Returns whether any
    /// cells remain.
    fn seek(&mut self, key: &Cell) -> Result<bool>;

    /// Like `seek`, with the caller's promise that `key` is not before the
    /// current position, so the search may start where the scanner stands.
    fn reseek(&mut self, key: &Cell) -> Result<bool>;

    /// Position on the first (newest) cell of the greatest row strictly
    /// below `key`'s row. Returns whether any cells remain.
    fn seek_to_previous_row(&mut self, key: &Cell) -> Result<bool>;

    /// Position on the greatest cell at-or-before `key` in reversed-scan
    /// order: within `key`'s row if it has cells `>=` key, else on the
    /// previous row. Returns whether any cells remain.
    fn backward_seek(&mut self, key: &Cell) -> Result<bool>;

    /// Release the scanner's resources. Idempotent.
    fn close(&mut self);

    /// Seek that may be satisfied lazily or answered from a Bloom
    /// pre-filter. `forward` promises the key is not before the current
    /// position. The default is a real seek.
    fn request_seek(&mut self, key: &Cell, forward: bool, use_bloom: bool) -> Result<bool> {
        let _ = use_bloom;
        if forward {
            self.reseek(key)
        } else {
            self.seek(key)
        }
    }

    /// False while `peek` is a shadow position recorded by a lazy
    /// `request_seek` rather than a materialized cell.
    fn seek_done(&self) -> bool {
        true
    }

    /// Turn a pending lazy position into a real one.
    fn enforce_seek(&mut self) -> Result<()> {
        Ok(())
    }
}
