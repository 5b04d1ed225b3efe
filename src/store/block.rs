//! Byte-region-backed cell store
//!
//! ## Block format
//! ```text
//! [slot 0] [slot 1] ... [slot n-1]
//! [index: n x (slot_offset u32, seq_id u64)]
//! [footer: index_offset u32, cell_count u32, crc32 u32, magic u32]
//! ```
//!
//! Slots use the big-endian cell layout from [`crate::cell`]. The crc32
//! covers slots and index. The backing region may live on the heap or be a
//! memory-mapped file; either way the block is validated once when opened
//! and decoded lazily per access afterwards.

use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

use crate::cell::{decode_slot, encode_slot, Cell, CellComparator};
use crate::error::{Result, StoreError};

const BLOCK_MAGIC: u32 = 0x43424C4B; // "CBLK"
const FOOTER_LEN: usize = 16;
const INDEX_ENTRY_LEN: usize = 4 + 8;

/// Backing memory of a block store.
enum BlockData {
    Heap(Vec<u8>),
    Mapped(Mmap),
}

impl BlockData {
    fn as_slice(&self) -> &[u8] {
        match self {
            BlockData::Heap(buf) => buf,
            BlockData::Mapped(map) => map,
        }
    }
}

impl std::fmt::Debug for BlockData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockData::Heap(buf) => write!(f, "BlockData::Heap({} bytes)", buf.len()),
            BlockData::Mapped(map) => write!(f, "BlockData::Mapped({} bytes)", map.len()),
        }
    }
}

/// Encoded-block store: contiguous slots plus an offset/sequence index.
#[derive(Debug)]
pub struct BlockStore {
    data: BlockData,
    /// (slot offset, slot length, sequence id) per cell.
    index: Vec<(u32, u32, u64)>,
}

impl BlockStore {
    /// Open a block held in a heap buffer.
    pub fn from_bytes(buf: Vec<u8>) -> Result<Self> {
        Self::open(BlockData::Heap(buf))
    }

    /// Open a block held in a memory-mapped region.
    pub fn from_mmap(map: Mmap) -> Result<Self> {
        Self::open(BlockData::Mapped(map))
    }

    /// Map a block file and open it.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        // Safety: the region is treated as immutable for the store's life;
        // concurrent truncation of the underlying file is out of contract.
        let map = unsafe { Mmap::map(&file)? };
        Self::from_mmap(map)
    }

    fn open(data: BlockData) -> Result<Self> {
        let buf = data.as_slice();
        if buf.len() < FOOTER_LEN {
            return Err(StoreError::Corruption("block shorter than footer".into()));
        }
        let footer = &buf[buf.len() - FOOTER_LEN..];
        let index_offset = read_u32(footer, 0) as usize;
        let cell_count = read_u32(footer, 4) as usize;
        let crc = read_u32(footer, 8);
        let magic = read_u32(footer, 12);
        if magic != BLOCK_MAGIC {
            return Err(StoreError::Corruption(format!(
                "bad block magic {magic:#010x}"
            )));
        }

        let index_len = cell_count
            .checked_mul(INDEX_ENTRY_LEN)
            .ok_or_else(|| StoreError::Corruption("cell count overflow".into()))?;
        let index_end = index_offset
            .checked_add(index_len)
            .ok_or_else(|| StoreError::Corruption("index overflow".into()))?;
        if index_end != buf.len() - FOOTER_LEN {
            return Err(StoreError::Corruption("index does not abut footer".into()));
        }

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&buf[..index_end]);
        let actual = hasher.finalize();
        if actual != crc {
            return Err(StoreError::Corruption(format!(
                "crc mismatch: stored {crc:#010x}, computed {actual:#010x}"
            )));
        }

        // Parse the index and validate every slot up front so that
        // cell_at never has to surface a decode failure.
        let mut index = Vec::with_capacity(cell_count);
        let mut prev: Option<Cell> = None;
        for i in 0..cell_count {
            let entry_at = index_offset + i * INDEX_ENTRY_LEN;
            let offset = read_u32(&buf[entry_at..], 0) as usize;
            let seq_id = read_u64(&buf[entry_at..], 4);
            let end = if i + 1 < cell_count {
                read_u32(&buf[index_offset + (i + 1) * INDEX_ENTRY_LEN..], 0) as usize
            } else {
                index_offset
            };
            if offset > end || end > index_offset {
                return Err(StoreError::Corruption(format!(
                    "slot {i} offsets out of order"
                )));
            }
            let cell = decode_slot(&buf[offset..end], seq_id)?;
            if let Some(p) = &prev {
                if CellComparator::compare(p, &cell).is_gt() {
                    return Err(StoreError::Corruption(format!(
                        "slot {i} out of cell order"
                    )));
                }
            }
            prev = Some(cell);
            index.push(((offset) as u32, (end - offset) as u32, seq_id));
        }

        Ok(Self { data, index })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn cell_at(&self, index: usize) -> Option<Arc<Cell>> {
        let &(offset, len, seq_id) = self.index.get(index)?;
        let start = offset as usize;
        let slot = &self.data.as_slice()[start..start + len as usize];
        // Slots were fully validated at open.
        decode_slot(slot, seq_id).ok().map(Arc::new)
    }
}

/// Serializes sorted cells into the block format.
pub struct CellBlockBuilder {
    buf: Vec<u8>,
    index: Vec<(u32, u64)>,
    last: Option<Cell>,
}

impl Default for CellBlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CellBlockBuilder {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            index: Vec::new(),
            last: None,
        }
    }

    /// Append a cell. Cells must arrive in ascending comparator order.
    pub fn push(&mut self, cell: &Cell) -> Result<()> {
        if let Some(last) = &self.last {
            if CellComparator::compare(last, cell).is_gt() {
                return Err(StoreError::InvalidData(
                    "cells pushed out of comparator order".into(),
                ));
            }
        }
        let offset = self.buf.len();
        if offset > u32::MAX as usize {
            return Err(StoreError::InvalidData("block exceeds u32 framing".into()));
        }
        encode_slot(cell, &mut self.buf)?;
        self.index.push((offset as u32, cell.seq_id()));
        self.last = Some(cell.clone());
        Ok(())
    }

    pub fn cell_count(&self) -> usize {
        self.index.len()
    }

    /// Finish the block: append index, crc and footer.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let index_offset = self.buf.len();
        if index_offset > u32::MAX as usize {
            return Err(StoreError::InvalidData("block exceeds u32 framing".into()));
        }
        for &(offset, seq_id) in &self.index {
            self.buf.extend_from_slice(&offset.to_be_bytes());
            self.buf.extend_from_slice(&seq_id.to_be_bytes());
        }

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.buf);
        let crc = hasher.finalize();

        self.buf
            .extend_from_slice(&(index_offset as u32).to_be_bytes());
        self.buf
            .extend_from_slice(&(self.index.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(&crc.to_be_bytes());
        self.buf.extend_from_slice(&BLOCK_MAGIC.to_be_bytes());
        Ok(self.buf)
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[at..at + 4]);
    u32::from_be_bytes(raw)
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[at..at + 8]);
    u64::from_be_bytes(raw)
}
