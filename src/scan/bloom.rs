//! Row/column Bloom pre-filter
//!
//! Answers "might this (row, qualifier) pair exist in the store" without
//! touching cells, so a `request_seek` with the Bloom hint can skip a
//! column that was never written. About 1% false positives at 10 bits per
//! key; never a false negative.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::store::CellStore;

pub struct RowColBloom {
    /// Bit array
    bits: Vec<u8>,

    /// Number of hash functions
    num_hashes: u32,

    /// Number of bits
    num_bits: usize,
}

impl RowColBloom {
    /// # Parameters
    /// - `num_keys`: expected number of (row, qualifier) pairs
    /// - `bits_per_key`: bits allocated per key (typically 10)
    pub fn new(num_keys: usize, bits_per_key: usize) -> Self {
        let num_bits = (num_keys * bits_per_key).max(8);
        let num_bytes = (num_bits + 7) / 8;

        // Optimal hash count: k = (m/n) * ln(2)
        let num_hashes = ((bits_per_key as f64) * 0.693).ceil() as u32;
        let num_hashes = num_hashes.clamp(1, 30);

        Self {
            bits: vec![0u8; num_bytes],
            num_hashes,
            num_bits,
        }
    }

    /// Populate from every (row, qualifier) pair in a store.
    pub fn from_store(store: &CellStore, bits_per_key: usize) -> Self {
        let mut bloom = Self::new(store.len(), bits_per_key);
        for i in 0..store.len() {
            if let Some(cell) = store.cell_at(i) {
                bloom.insert(cell.row(), cell.qualifier());
            }
        }
        bloom
    }

    pub fn insert(&mut self, row: &[u8], qualifier: &[u8]) {
        for i in 0..self.num_hashes {
            let hash = self.hash(row, qualifier, i);
            let bit_pos = (hash as usize) % self.num_bits;
            self.set_bit(bit_pos);
        }
    }

    /// May report a pair that was never inserted, never the reverse.
    pub fn may_contain(&self, row: &[u8], qualifier: &[u8]) -> bool {
        for i in 0..self.num_hashes {
            let hash = self.hash(row, qualifier, i);
            let bit_pos = (hash as usize) % self.num_bits;
            if !self.get_bit(bit_pos) {
                return false;
            }
        }
        true
    }

    fn hash(&self, row: &[u8], qualifier: &[u8], seed: u32) -> u64 {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        row.hash(&mut hasher);
        qualifier.hash(&mut hasher);
        hasher.finish()
    }

    fn set_bit(&mut self, pos: usize) {
        self.bits[pos / 8] |= 1 << (pos % 8);
    }

    fn get_bit(&self, pos: usize) -> bool {
        (self.bits[pos / 8] & (1 << (pos % 8))) != 0
    }
}
