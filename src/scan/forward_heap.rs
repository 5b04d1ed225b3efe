//! K-way ascending merge of scanner ports
//!
//! A priority queue of scanners keyed by their current peek under the cell
//! comparator. `current` always holds the scanner whose peek is the next
//! cell to emit; the queue holds the rest. Scanners that exhaust or fail
//! mid-operation land on a delayed-close list instead of being closed
//! inside the merge loop.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::cell::{Cell, CellComparator};
use crate::error::{Result, StoreError};

use super::ScannerPort;

/// Heap entry: a scanner plus its registration order, the stable tie-break
/// when two peeks compare equal.
struct HeapNode {
    scanner: Box<dyn ScannerPort>,
    order: u64,
}

impl HeapNode {
    fn cmp_forward(a: &HeapNode, b: &HeapNode) -> Ordering {
        match (a.scanner.peek(), b.scanner.peek()) {
            (Some(x), Some(y)) => {
                CellComparator::compare(&x, &y).then_with(|| a.order.cmp(&b.order))
            }
            // exhausted scanners sink to the bottom
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.order.cmp(&b.order),
        }
    }
}

impl PartialEq for HeapNode {
    fn eq(&self, other: &Self) -> bool {
        HeapNode::cmp_forward(self, other) == Ordering::Equal
    }
}

impl Eq for HeapNode {}

impl PartialOrd for HeapNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapNode {
    fn cmp(&self, other: &Self) -> Ordering {
        HeapNode::cmp_forward(self, other)
    }
}

#[derive(Clone, Copy)]
enum SeekKind {
    Seek,
    Reseek,
    Request { forward: bool, use_bloom: bool },
}

/// Merges many sorted cell streams into one ascending stream.
pub struct ForwardScanHeap {
    /// Min-heap over the scanners' peeks.
    heap: BinaryHeap<Reverse<HeapNode>>,

    /// Scanner owning the next cell to emit. `None` once the merge is done.
    current: Option<HeapNode>,

    /// Scanners retired mid-operation, closed in bulk by the owner.
    pending_close: Vec<Box<dyn ScannerPort>>,

    next_order: u64,
}

impl ForwardScanHeap {
    /// Build the heap. Scanners with nothing to offer are closed on the
    /// spot; the rest enter the queue.
    pub fn new(scanners: Vec<Box<dyn ScannerPort>>) -> Result<Self> {
        let mut this = Self {
            heap: BinaryHeap::with_capacity(scanners.len()),
            current: None,
            pending_close: Vec::new(),
            next_order: 0,
        };
        for mut scanner in scanners {
            if scanner.peek().is_some() {
                let order = this.next_order;
                this.next_order += 1;
                this.heap.push(Reverse(HeapNode { scanner, order }));
            } else {
                scanner.close();
            }
        }
        this.current = this.poll_real_cell()?;
        Ok(this)
    }

    /// The next cell the merge would emit.
    pub fn peek(&self) -> Option<Arc<Cell>> {
        self.current.as_ref().and_then(|node| node.scanner.peek())
    }

    /// Emit the least cell across all scanners and advance its owner.
    pub fn next(&mut self) -> Result<Option<Arc<Cell>>> {
        loop {
            let Some(mut cur) = self.current.take() else {
                return Ok(None);
            };
            let emitted = match cur.scanner.next() {
                Ok(Some(cell)) => cell,
                // exhausted or failed under us: retire and keep merging
                Ok(None) => {
                    self.pending_close.push(cur.scanner);
                    self.current = self.poll_real_cell()?;
                    continue;
                }
                Err(_) => {
                    self.pending_close.push(cur.scanner);
                    self.current = self.poll_real_cell()?;
                    continue;
                }
            };
            if cur.scanner.peek().is_none() {
                self.pending_close.push(cur.scanner);
                self.current = self.poll_real_cell()?;
            } else {
                let outranked = self
                    .heap
                    .peek()
                    .map_or(false, |Reverse(top)| {
                        HeapNode::cmp_forward(&cur, top) == Ordering::Greater
                    });
                if outranked {
                    self.heap.push(Reverse(cur));
                    self.current = self.poll_real_cell()?;
                } else {
                    self.current = Some(cur);
                }
            }
            return Ok(Some(emitted));
        }
    }

    /// Position every scanner at-or-after `key`; `peek` becomes the least
    /// cell `>=` key across the merge. Returns whether any cells remain.
    pub fn seek(&mut self, key: &Cell) -> Result<bool> {
        self.generalized_seek(key, SeekKind::Seek)
    }

    /// `seek` with the forward-only promise passed through to scanners.
    pub fn reseek(&mut self, key: &Cell) -> Result<bool> {
        self.generalized_seek(key, SeekKind::Reseek)
    }

    /// Seek that lets scanners answer lazily or from their Bloom filters.
    pub fn request_seek(&mut self, key: &Cell, forward: bool, use_bloom: bool) -> Result<bool> {
        self.generalized_seek(key, SeekKind::Request { forward, use_bloom })
    }

    fn generalized_seek(&mut self, key: &Cell, kind: SeekKind) -> Result<bool> {
        let Some(cur) = self.current.take() else {
            return Ok(false);
        };
        self.heap.push(Reverse(cur));

        while let Some(Reverse(mut node)) = self.heap.pop() {
            let Some(top) = node.scanner.peek() else {
                self.pending_close.push(node.scanner);
                continue;
            };
            if CellComparator::compare(key, &top).is_le() {
                // already at-or-past the target; nothing to do for this one
                self.heap.push(Reverse(node));
                self.current = self.poll_real_cell()?;
                return Ok(self.current.is_some());
            }
            let seeked = match kind {
                SeekKind::Seek => node.scanner.seek(key),
                SeekKind::Reseek => node.scanner.reseek(key),
                SeekKind::Request { forward, use_bloom } => {
                    node.scanner.request_seek(key, forward, use_bloom)
                }
            };
            match seeked {
                Ok(true) if node.scanner.peek().is_some() => self.heap.push(Reverse(node)),
                Ok(_) | Err(_) => self.pending_close.push(node.scanner),
            }
        }
        Ok(false)
    }

    /// Pop heap entries until one holds a materialized peek. Scanners whose
    /// peek is a lazy shadow get their seek enforced and re-enter the queue
    /// in their real position.
    fn poll_real_cell(&mut self) -> Result<Option<HeapNode>> {
        while let Some(Reverse(mut node)) = self.heap.pop() {
            if node.scanner.peek().is_none() {
                self.pending_close.push(node.scanner);
                continue;
            }
            if node.scanner.seek_done() {
                return Ok(Some(node));
            }
            match node.scanner.enforce_seek() {
                Ok(()) if node.scanner.peek().is_some() => self.heap.push(Reverse(node)),
                Ok(()) | Err(_) => self.pending_close.push(node.scanner),
            }
        }
        Ok(None)
    }

    /// Hand over the scanners retired since the last drain. The heap never
    /// closes these itself; the owner releases them at a safe point.
    pub fn take_pending_close(&mut self) -> Vec<Box<dyn ScannerPort>> {
        std::mem::take(&mut self.pending_close)
    }

    /// Close every scanner still owned by the heap, retired or not.
    pub fn close_all(&mut self) {
        if let Some(mut cur) = self.current.take() {
            cur.scanner.close();
        }
        while let Some(Reverse(mut node)) = self.heap.pop() {
            node.scanner.close();
        }
        for scanner in &mut self.pending_close {
            scanner.close();
        }
        self.pending_close.clear();
    }
}

impl ScannerPort for ForwardScanHeap {
    fn peek(&self) -> Option<Arc<Cell>> {
        ForwardScanHeap::peek(self)
    }

    fn next(&mut self) -> Result<Option<Arc<Cell>>> {
        ForwardScanHeap::next(self)
    }

    fn seek(&mut self, key: &Cell) -> Result<bool> {
        ForwardScanHeap::seek(self, key)
    }

    fn reseek(&mut self, key: &Cell) -> Result<bool> {
        ForwardScanHeap::reseek(self, key)
    }

    fn seek_to_previous_row(&mut self, _key: &Cell) -> Result<bool> {
        Err(StoreError::Unsupported(
            "seek_to_previous_row on a forward scan heap",
        ))
    }

    fn backward_seek(&mut self, _key: &Cell) -> Result<bool> {
        Err(StoreError::Unsupported(
            "backward_seek on a forward scan heap",
        ))
    }

    fn request_seek(&mut self, key: &Cell, forward: bool, use_bloom: bool) -> Result<bool> {
        ForwardScanHeap::request_seek(self, key, forward, use_bloom)
    }

    fn close(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellType;
    use crate::config::MemStoreConfig;
    use crate::scan::{FlatMapScanner, StoreScanner};
    use crate::store::{ArrayStore, CellStore};

    fn kv(row: &str, ts: i64) -> Cell {
        Cell::new(row, "f", "q", ts, CellType::Put, format!("{row}@{ts}"))
    }

    fn flat(cells: Vec<Cell>) -> Box<dyn ScannerPort> {
        Box::new(FlatMapScanner::from_store(Arc::new(CellStore::Array(
            ArrayStore::from_cells(cells),
        ))))
    }

    fn drain(heap: &mut ForwardScanHeap) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(cell) = heap.next().unwrap() {
            out.push(String::from_utf8(cell.value().to_vec()).unwrap());
        }
        out
    }

    #[test]
    fn test_merge_is_non_decreasing() {
        let mut heap = ForwardScanHeap::new(vec![
            flat(vec![kv("a", 1), kv("c", 2), kv("c", 1)]),
            flat(vec![kv("b", 5), kv("d", 1)]),
            flat(vec![kv("a", 9), kv("e", 3)]),
        ])
        .unwrap();
        assert_eq!(
            drain(&mut heap),
            vec!["a@9", "a@1", "b@5", "c@2", "c@1", "d@1", "e@3"]
        );
        assert!(heap.peek().is_none());
        assert!(heap.next().unwrap().is_none());
    }

    #[test]
    fn test_duplicate_keys_emit_newest_write_first() {
        let one = kv("a", 5).with_seq(1);
        let two = kv("a", 5).with_seq(2);
        let mut heap =
            ForwardScanHeap::new(vec![flat(vec![one]), flat(vec![two])]).unwrap();
        assert_eq!(heap.next().unwrap().unwrap().seq_id(), 2);
        assert_eq!(heap.next().unwrap().unwrap().seq_id(), 1);
    }

    #[test]
    fn test_empty_scanners_closed_at_construction() {
        let mut heap = ForwardScanHeap::new(vec![flat(vec![]), flat(vec![kv("a", 1)])]).unwrap();
        assert_eq!(drain(&mut heap), vec!["a@1"]);
    }

    #[test]
    fn test_exhausted_scanners_go_to_pending_close() {
        let mut heap = ForwardScanHeap::new(vec![
            flat(vec![kv("a", 1)]),
            flat(vec![kv("b", 1)]),
        ])
        .unwrap();
        assert_eq!(drain(&mut heap).len(), 2);
        assert_eq!(heap.take_pending_close().len(), 2);
        assert!(heap.take_pending_close().is_empty());
    }

    #[test]
    fn test_seek_skips_every_scanner_forward() {
        let mut heap = ForwardScanHeap::new(vec![
            flat(vec![kv("a", 1), kv("c", 1)]),
            flat(vec![kv("b", 1), kv("d", 1)]),
        ])
        .unwrap();
        assert!(heap.seek(&kv("c", 9)).unwrap());
        assert_eq!(drain(&mut heap), vec!["c@1", "d@1"]);
    }

    #[test]
    fn test_seek_past_everything() {
        let mut heap =
            ForwardScanHeap::new(vec![flat(vec![kv("a", 1)]), flat(vec![kv("b", 1)])]).unwrap();
        assert!(!heap.seek(&kv("z", 1)).unwrap());
        assert!(heap.peek().is_none());
    }

    #[test]
    fn test_reseek_after_partial_drain() {
        let mut heap = ForwardScanHeap::new(vec![
            flat(vec![kv("a", 1), kv("d", 1)]),
            flat(vec![kv("b", 1), kv("e", 1)]),
        ])
        .unwrap();
        assert_eq!(heap.next().unwrap().unwrap().value(), b"a@1");
        assert!(heap.reseek(&kv("d", 9)).unwrap());
        assert_eq!(drain(&mut heap), vec!["d@1", "e@1"]);
    }

    #[test]
    fn test_request_seek_materializes_lazy_scanners() {
        let store = Arc::new(CellStore::Array(ArrayStore::from_cells(vec![
            Cell::new("a", "f", "q", 1, CellType::Put, "store-a"),
            Cell::new("c", "f", "q", 1, CellType::Put, "store-c"),
        ])));
        let lazy = Box::new(StoreScanner::with_bloom(store, &MemStoreConfig::default()));
        let mut heap =
            ForwardScanHeap::new(vec![lazy, flat(vec![kv("b", 1), kv("c", 9)])]).unwrap();

        let probe = Cell::new("c", "f", "q", 9, CellType::Put, "");
        assert!(heap.request_seek(&probe, false, true).unwrap());
        // the lazy scanner's shadow peek was forced into a real position
        // before anything was emitted
        assert_eq!(heap.next().unwrap().unwrap().value(), b"c@9");
        assert_eq!(heap.next().unwrap().unwrap().value(), b"store-c");
        assert!(heap.next().unwrap().is_none());
    }

    #[test]
    fn test_unsupported_reverse_operations() {
        let mut heap = ForwardScanHeap::new(vec![flat(vec![kv("a", 1)])]).unwrap();
        assert!(matches!(
            ScannerPort::seek_to_previous_row(&mut heap, &kv("a", 1)),
            Err(StoreError::Unsupported(_))
        ));
        assert!(matches!(
            ScannerPort::backward_seek(&mut heap, &kv("a", 1)),
            Err(StoreError::Unsupported(_))
        ));
    }

    /// Scanner that fails on the first `next` after construction.
    struct FailingScanner {
        cell: Option<Arc<Cell>>,
    }

    impl ScannerPort for FailingScanner {
        fn peek(&self) -> Option<Arc<Cell>> {
            self.cell.clone()
        }
        fn next(&mut self) -> Result<Option<Arc<Cell>>> {
            Err(StoreError::Scanner("device went away".into()))
        }
        fn seek(&mut self, _key: &Cell) -> Result<bool> {
            Err(StoreError::Scanner("device went away".into()))
        }
        fn reseek(&mut self, key: &Cell) -> Result<bool> {
            self.seek(key)
        }
        fn seek_to_previous_row(&mut self, key: &Cell) -> Result<bool> {
            self.seek(key)
        }
        fn backward_seek(&mut self, key: &Cell) -> Result<bool> {
            self.seek(key)
        }
        fn close(&mut self) {
            self.cell = None;
        }
    }

    #[test]
    fn test_failing_scanner_is_retired_and_merge_continues() {
        let failing = Box::new(FailingScanner {
            cell: Some(Arc::new(kv("a", 9))),
        });
        let mut heap = ForwardScanHeap::new(vec![failing, flat(vec![kv("b", 1)])]).unwrap();
        // the failing scanner held the least cell; its failure retires it
        // and the merge carries on with the healthy scanner
        assert_eq!(heap.next().unwrap().unwrap().value(), b"b@1");
        assert!(heap.next().unwrap().is_none());
        assert_eq!(heap.take_pending_close().len(), 2);
    }

    #[test]
    fn test_close_all_releases_everything() {
        let mut heap = ForwardScanHeap::new(vec![
            flat(vec![kv("a", 1), kv("b", 1)]),
            flat(vec![kv("c", 1)]),
        ])
        .unwrap();
        assert_eq!(heap.next().unwrap().unwrap().value(), b"a@1");
        heap.close_all();
        assert!(heap.peek().is_none());
        assert!(heap.take_pending_close().is_empty());
    }
}
