//! cellstore: flat cell map and scan-merging core
//!
//! The in-memory read path of a column-oriented region store: immutable
//! flat-array snapshots of sorted cells, navigable-map views over them,
//! and the k-way merge heaps that turn many sorted sources into one scan.
//!
//! ## Architecture
//! - Cell layer: the (row, family, qualifier, timestamp, type, value)
//!   tuple, its total order, and the big-endian slot codec
//! - Store layer: mutable ingestion segment frozen into array- or
//!   block-backed stores, with `FlatCellMap` navigable views
//! - Scan layer: `ScannerPort` streams merged by `ForwardScanHeap`
//!   (ascending) and `ReversedScanHeap` (rows descending, newest-first
//!   within a row)
//!
//! Stores are built once and published behind `Arc`; after publication
//! every read is lock-free. A scan session is single-threaded.

pub mod cell;
pub mod config;
pub mod scan;
pub mod store;

mod error;

pub use cell::{Cell, CellComparator, CellType, LATEST_TIMESTAMP, OLDEST_TIMESTAMP};
pub use config::{FlattenTarget, MemStoreConfig};
pub use error::{Result, StoreError};
pub use scan::{
    FlatMapScanner, ForwardScanHeap, ReversedScanHeap, RowColBloom, ScannerPort, StoreScanner,
};
pub use store::{
    ArrayStore, BlockStore, CellBlockBuilder, CellEntry, CellStore, FlatCellMap, MutableSegment,
};
