//! Cell: the key-value unit of the store
//!
//! A cell is an immutable (row, family, qualifier, timestamp, type, value)
//! tuple plus a per-write sequence id. A cell is logically both key and
//! value: every map and scanner in this crate hands out the same tuple for
//! either role.

mod codec;
mod comparator;

pub use codec::{decode_slot, encode_slot, encoded_len};
pub use comparator::CellComparator;

/// Timestamp assigned to synthetic "newest possible" boundary cells.
pub const LATEST_TIMESTAMP: i64 = i64::MAX;

/// Timestamp assigned to synthetic "oldest possible" boundary cells.
pub const OLDEST_TIMESTAMP: i64 = i64::MIN;

/// Fixed per-cell overhead charged by heap-size accounting, in addition to
/// the byte payloads (struct header, three Vec headers, Arc refcounts).
const CELL_FIXED_OVERHEAD: usize = 96;

/// Cell type tag. Byte codes follow the on-disk key layout, so encoded
/// blocks interoperate with file-backed block regions.
///
/// `Minimum` and `Maximum` never appear in stored data; they exist for
/// synthetic boundary cells used by seeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CellType {
    Minimum = 0,
    Put = 4,
    Delete = 8,
    DeleteFamilyVersion = 10,
    DeleteColumn = 12,
    DeleteFamily = 14,
    Maximum = 255,
}

impl CellType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<CellType> {
        match code {
            0 => Some(CellType::Minimum),
            4 => Some(CellType::Put),
            8 => Some(CellType::Delete),
            10 => Some(CellType::DeleteFamilyVersion),
            12 => Some(CellType::DeleteColumn),
            14 => Some(CellType::DeleteFamily),
            255 => Some(CellType::Maximum),
            _ => None,
        }
    }

    /// Whether this tag marks any flavor of delete.
    pub fn is_delete(self) -> bool {
        matches!(
            self,
            CellType::Delete
                | CellType::DeleteColumn
                | CellType::DeleteFamily
                | CellType::DeleteFamilyVersion
        )
    }
}

/// Immutable cell tuple.
///
/// Constructed once, then shared behind `Arc` by stores, maps and scanners.
/// There is no mutation API; `with_seq` / `with_tags` are builder steps used
/// before a cell is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    row: Vec<u8>,
    family: Vec<u8>,
    qualifier: Vec<u8>,
    timestamp: i64,
    cell_type: CellType,
    value: Vec<u8>,
    tags: Vec<u8>,
    seq_id: u64,
}

impl Cell {
    pub fn new(
        row: impl Into<Vec<u8>>,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        timestamp: i64,
        cell_type: CellType,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            row: row.into(),
            family: family.into(),
            qualifier: qualifier.into(),
            timestamp,
            cell_type,
            value: value.into(),
            tags: Vec::new(),
            seq_id: 0,
        }
    }

    /// Builder step: stamp the per-write sequence id.
    pub fn with_seq(mut self, seq_id: u64) -> Self {
        self.seq_id = seq_id;
        self
    }

    /// Builder step: attach tag bytes.
    pub fn with_tags(mut self, tags: impl Into<Vec<u8>>) -> Self {
        self.tags = tags.into();
        self
    }

    pub fn row(&self) -> &[u8] {
        &self.row
    }

    pub fn family(&self) -> &[u8] {
        &self.family
    }

    pub fn qualifier(&self) -> &[u8] {
        &self.qualifier
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn tags(&self) -> &[u8] {
        &self.tags
    }

    pub fn seq_id(&self) -> u64 {
        self.seq_id
    }

    /// Approximate heap footprint, used for segment flatten accounting.
    pub fn heap_size(&self) -> usize {
        CELL_FIXED_OVERHEAD
            + self.row.len()
            + self.family.len()
            + self.qualifier.len()
            + self.value.len()
            + self.tags.len()
    }

    /// Synthetic cell sorting before every real cell of `row`.
    pub fn first_on_row(row: impl Into<Vec<u8>>) -> Cell {
        Cell::new(row, "", "", LATEST_TIMESTAMP, CellType::Maximum, "").with_seq(u64::MAX)
    }

    /// Synthetic cell sorting after every real cell of `row`.
    ///
    /// There is no lexicographically-last column, so the comparator gives
    /// rowkey-only `Minimum` cells the "after everything in the row"
    /// position instead.
    pub fn last_on_row(row: impl Into<Vec<u8>>) -> Cell {
        Cell::new(row, "", "", OLDEST_TIMESTAMP, CellType::Minimum, "")
    }

    /// Synthetic cell sorting before every version of `template`'s
    /// (row, family, qualifier).
    pub fn first_on_row_col(template: &Cell) -> Cell {
        Cell::new(
            template.row(),
            template.family(),
            template.qualifier(),
            LATEST_TIMESTAMP,
            CellType::Maximum,
            "",
        )
        .with_seq(u64::MAX)
    }

    /// Synthetic cell sorting after every version of `template`'s
    /// (row, family, qualifier).
    pub fn last_on_row_col(template: &Cell) -> Cell {
        Cell::new(
            template.row(),
            template.family(),
            template.qualifier(),
            OLDEST_TIMESTAMP,
            CellType::Minimum,
            "",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_round_trip() {
        for t in [
            CellType::Minimum,
            CellType::Put,
            CellType::Delete,
            CellType::DeleteFamilyVersion,
            CellType::DeleteColumn,
            CellType::DeleteFamily,
            CellType::Maximum,
        ] {
            assert_eq!(CellType::from_code(t.code()), Some(t));
        }
        assert_eq!(CellType::from_code(7), None);
    }

    #[test]
    fn test_builder_steps() {
        let cell = Cell::new("r1", "f", "q", 5, CellType::Put, "v")
            .with_seq(42)
            .with_tags(vec![1, 2, 3]);
        assert_eq!(cell.row(), b"r1");
        assert_eq!(cell.seq_id(), 42);
        assert_eq!(cell.tags(), &[1, 2, 3]);
        assert!(cell.heap_size() > cell.row().len() + cell.value().len());
    }

    #[test]
    fn test_delete_tags() {
        assert!(CellType::DeleteColumn.is_delete());
        assert!(!CellType::Put.is_delete());
        assert!(!CellType::Maximum.is_delete());
    }
}
