//! Memstore configuration
//!
//! Controls when a mutable segment is flattened and which immutable
//! representation it is flattened into.

use serde::{Deserialize, Serialize};

/// Immutable representation a frozen segment flattens into.
///
/// - `Array`: one `Arc<Cell>` slot per cell, cheapest to read.
/// - `Block`: cells serialized into a contiguous big-endian block with an
///   offset index, decoded lazily on access. Densest layout, and the one
///   that interoperates with file-backed block regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlattenTarget {
    Array,
    Block,
}

impl Default for FlattenTarget {
    fn default() -> Self {
        FlattenTarget::Array
    }
}

/// Configuration for the in-memory cell store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemStoreConfig {
    /// Heap-size threshold (bytes) after which a mutable segment reports
    /// `should_flatten` (default 4MB).
    pub segment_flatten_size: usize,

    /// Bloom filter bits per key for frozen-store scanners (default 10,
    /// roughly 1% false positives).
    pub bloom_bits_per_key: usize,

    /// Representation to flatten frozen segments into.
    pub flatten_target: FlattenTarget,
}

impl Default for MemStoreConfig {
    fn default() -> Self {
        Self {
            segment_flatten_size: 4 * 1024 * 1024,
            bloom_bits_per_key: 10,
            flatten_target: FlattenTarget::default(),
        }
    }
}
