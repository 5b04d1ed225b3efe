//! K-way reverse merge of scanner ports
//!
//! Walks rows from highest to lowest while emitting each row's cells in the
//! canonical newest-first order. The queue order is deliberately
//! asymmetric: between different rows the *greater* row wins, inside one
//! row the plain ascending comparator decides. Forward seeks make no sense
//! here and fail with an illegal-state error; the scan is driven by
//! `next`, `seek_to_previous_row` and `backward_seek` only.
//!
//! Callers position each scanner (via its own `backward_seek` or
//! `seek_to_previous_row`) before handing it to the heap; the heap then
//! keeps all of them converging row by row.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::cell::{Cell, CellComparator};
use crate::error::{Result, StoreError};

use super::ScannerPort;

struct RevNode {
    scanner: Box<dyn ScannerPort>,
    order: u64,
}

impl RevNode {
    /// Descending by row, ascending inside a row, registration order as the
    /// stable tie-break.
    fn cmp_reversed(a: &RevNode, b: &RevNode) -> Ordering {
        match (a.scanner.peek(), b.scanner.peek()) {
            (Some(x), Some(y)) => {
                let by_row = CellComparator::compare_rows(&x, &y);
                let oriented = if by_row != Ordering::Equal {
                    by_row.reverse()
                } else {
                    CellComparator::compare(&x, &y)
                };
                oriented.then_with(|| a.order.cmp(&b.order))
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.order.cmp(&b.order),
        }
    }
}

impl PartialEq for RevNode {
    fn eq(&self, other: &Self) -> bool {
        RevNode::cmp_reversed(self, other) == Ordering::Equal
    }
}

impl Eq for RevNode {}

impl PartialOrd for RevNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RevNode {
    fn cmp(&self, other: &Self) -> Ordering {
        RevNode::cmp_reversed(self, other)
    }
}

/// Merges many sorted cell streams into one reverse-scan stream.
pub struct ReversedScanHeap {
    heap: BinaryHeap<Reverse<RevNode>>,
    current: Option<RevNode>,
    pending_close: Vec<Box<dyn ScannerPort>>,
    next_order: u64,
}

impl ReversedScanHeap {
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
                this.heap.push(Reverse(RevNode { scanner, order }));
            } else {
                scanner.close();
            }
        }
        this.current = this.poll_real_cell()?;
        Ok(this)
    }

    pub fn peek(&self) -> Option<Arc<Cell>> {
        self.current.as_ref().and_then(|node| node.scanner.peek())
    }

    /// Emit the next cell of the reverse scan.
    ///
    /// When the emitting scanner runs off its row's end (forward, into a
    /// greater row, or out of cells) it cannot contribute to the current
    /// row anymore: it is re-positioned onto the row before the one just
    /// emitted, or retired if it has none.
    pub fn next(&mut self) -> Result<Option<Arc<Cell>>> {
        loop {
            let Some(mut cur) = self.current.take() else {
                return Ok(None);
            };
            let emitted = match cur.scanner.next() {
                Ok(Some(cell)) => cell,
                Ok(None) | Err(_) => {
                    self.pending_close.push(cur.scanner);
                    self.current = self.poll_real_cell()?;
                    continue;
                }
            };
            let crossed_row = match cur.scanner.peek() {
                None => true,
                Some(after) => CellComparator::compare_rows(&after, &emitted) == Ordering::Greater,
            };
            if crossed_row {
                match cur.scanner.seek_to_previous_row(&emitted) {
                    Ok(true) => self.heap.push(Reverse(cur)),
                    Ok(false) | Err(_) => self.pending_close.push(cur.scanner),
                }
                self.current = self.poll_real_cell()?;
            } else {
                let outranked = self
                    .heap
                    .peek()
                    .map_or(false, |Reverse(top)| {
                        RevNode::cmp_reversed(&cur, top) == Ordering::Greater
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

    /// Move the whole merge to the row before `key`'s row. Afterwards the
    /// next emitted cell (if any) has a row strictly below `key.row()`.
    pub fn seek_to_previous_row(&mut self, key: &Cell) -> Result<bool> {
        let Some(cur) = self.current.take() else {
            return Ok(false);
        };
        self.heap.push(Reverse(cur));

        while let Some(Reverse(mut node)) = self.heap.pop() {
            let Some(top) = node.scanner.peek() else {
                self.pending_close.push(node.scanner);
                continue;
            };
            if CellComparator::compare_rows(&top, key) == Ordering::Less {
                // already in a row before the seek row
                self.heap.push(Reverse(node));
                self.current = self.poll_real_cell()?;
                return Ok(self.current.is_some());
            }
            match node.scanner.seek_to_previous_row(key) {
                Ok(true) => self.heap.push(Reverse(node)),
                Ok(false) | Err(_) => self.pending_close.push(node.scanner),
            }
        }
        Ok(false)
    }

    /// Move the whole merge to the greatest position at-or-before `key` in
    /// reverse-scan order: within `key`'s row when it still has cells
    /// `>=` key, else onto the previous row.
    pub fn backward_seek(&mut self, key: &Cell) -> Result<bool> {
        let Some(cur) = self.current.take() else {
            return Ok(false);
        };
        self.heap.push(Reverse(cur));

        while let Some(Reverse(mut node)) = self.heap.pop() {
            let Some(top) = node.scanner.peek() else {
                self.pending_close.push(node.scanner);
                continue;
            };
            let already_behind = (CellComparator::matching_rows(key, &top)
                && CellComparator::compare(key, &top).is_le())
                || CellComparator::compare_rows(key, &top) == Ordering::Greater;
            if already_behind {
                self.heap.push(Reverse(node));
                self.current = self.poll_real_cell()?;
                return Ok(self.current.is_some());
            }
            match node.scanner.backward_seek(key) {
                Ok(true) => self.heap.push(Reverse(node)),
                Ok(false) | Err(_) => self.pending_close.push(node.scanner),
            }
        }
        Ok(false)
    }

    /// Not provided on a reverse heap.
    pub fn seek_to_last_row(&mut self) -> Result<bool> {
        Err(StoreError::Unsupported(
            "seek_to_last_row on a reversed scan heap",
        ))
    }

    fn poll_real_cell(&mut self) -> Result<Option<RevNode>> {
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

    pub fn take_pending_close(&mut self) -> Vec<Box<dyn ScannerPort>> {
        std::mem::take(&mut self.pending_close)
    }

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

impl ScannerPort for ReversedScanHeap {
    fn peek(&self) -> Option<Arc<Cell>> {
        ReversedScanHeap::peek(self)
    }

    fn next(&mut self) -> Result<Option<Arc<Cell>>> {
        ReversedScanHeap::next(self)
    }

    /// Forward seeks contradict a reverse scan.
    fn seek(&mut self, _key: &Cell) -> Result<bool> {
        Err(StoreError::IllegalState("seek on a reversed scan heap"))
    }

    fn reseek(&mut self, _key: &Cell) -> Result<bool> {
        Err(StoreError::IllegalState("reseek on a reversed scan heap"))
    }

    fn request_seek(&mut self, _key: &Cell, _forward: bool, _use_bloom: bool) -> Result<bool> {
        Err(StoreError::IllegalState(
            "request_seek on a reversed scan heap",
        ))
    }

    fn seek_to_previous_row(&mut self, key: &Cell) -> Result<bool> {
        ReversedScanHeap::seek_to_previous_row(self, key)
    }

    fn backward_seek(&mut self, key: &Cell) -> Result<bool> {
        ReversedScanHeap::backward_seek(self, key)
    }

    fn close(&mut self) {
        self.close_all();
    }
}
