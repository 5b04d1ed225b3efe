//! Big-endian cell slot codec
//!
//! One slot is:
//!
//! ```text
//! [key_len u32] [value_len u32]
//! [row_len u16] [row] [family_len u8] [family] [qualifier]
//! [timestamp i64] [type u8]
//! [value]
//! [tags_len u32] [tags]          (present only when the cell has tags)
//! ```
//!
//! The qualifier has no length of its own: it runs to the end of the key
//! minus the 9 trailing timestamp/type bytes. Everything is big-endian so
//! the layout matches file-backed block regions byte for byte.
//!
//! Sequence ids are not part of the slot; block stores carry them in their
//! offset index next to each slot.

use crate::error::{Result, StoreError};

use super::{Cell, CellType};

const HEADER_LEN: usize = 8;
// row_len + family_len + timestamp + type
const KEY_FIXED_LEN: usize = 2 + 1 + 8 + 1;

/// Encoded size of `cell`, including the slot header.
pub fn encoded_len(cell: &Cell) -> usize {
    let mut len = HEADER_LEN
        + KEY_FIXED_LEN
        + cell.row().len()
        + cell.family().len()
        + cell.qualifier().len()
        + cell.value().len();
    if !cell.tags().is_empty() {
        len += 4 + cell.tags().len();
    }
    len
}

/// Append `cell` to `out` in slot layout.
pub fn encode_slot(cell: &Cell, out: &mut Vec<u8>) -> Result<()> {
    if cell.row().len() > u16::MAX as usize {
        return Err(StoreError::InvalidData(format!(
            "row length {} exceeds u16",
            cell.row().len()
        )));
    }
    if cell.family().len() > u8::MAX as usize {
        return Err(StoreError::InvalidData(format!(
            "family length {} exceeds u8",
            cell.family().len()
        )));
    }
    let key_len = KEY_FIXED_LEN + cell.row().len() + cell.family().len() + cell.qualifier().len();
    if key_len > u32::MAX as usize || cell.value().len() > u32::MAX as usize {
        return Err(StoreError::InvalidData("cell exceeds u32 framing".into()));
    }

    out.reserve(encoded_len(cell));
    out.extend_from_slice(&(key_len as u32).to_be_bytes());
    out.extend_from_slice(&(cell.value().len() as u32).to_be_bytes());
    out.extend_from_slice(&(cell.row().len() as u16).to_be_bytes());
    out.extend_from_slice(cell.row());
    out.push(cell.family().len() as u8);
    out.extend_from_slice(cell.family());
    out.extend_from_slice(cell.qualifier());
    out.extend_from_slice(&cell.timestamp().to_be_bytes());
    out.push(cell.cell_type().code());
    out.extend_from_slice(cell.value());
    if !cell.tags().is_empty() {
        if cell.tags().len() > u32::MAX as usize {
            return Err(StoreError::InvalidData("tags exceed u32 framing".into()));
        }
        out.extend_from_slice(&(cell.tags().len() as u32).to_be_bytes());
        out.extend_from_slice(cell.tags());
    }
    Ok(())
}

/// Decode one complete slot. `slot` must span exactly the encoded cell;
/// the caller supplies the sequence id kept outside the slot.
pub fn decode_slot(slot: &[u8], seq_id: u64) -> Result<Cell> {
    let mut r = Reader::new(slot);
    let key_len = r.read_u32()? as usize;
    let value_len = r.read_u32()? as usize;
    if key_len < KEY_FIXED_LEN {
        return Err(corrupt("key length shorter than fixed key fields"));
    }

    let key_end = HEADER_LEN
        .checked_add(key_len)
        .ok_or_else(|| corrupt("key length overflow"))?;
    let row_len = r.read_u16()? as usize;
    let row = r.read_bytes(row_len)?.to_vec();
    let family_len = r.read_u8()? as usize;
    let family = r.read_bytes(family_len)?.to_vec();

    let qualifier_len = key_len
        .checked_sub(KEY_FIXED_LEN + row_len + family_len)
        .ok_or_else(|| corrupt("row/family lengths exceed key"))?;
    let qualifier = r.read_bytes(qualifier_len)?.to_vec();

    let timestamp = i64::from_be_bytes(r.read_bytes(8)?.try_into().map_err(|_| corrupt("ts"))?);
    let type_code = r.read_u8()?;
    let cell_type = CellType::from_code(type_code)
        .ok_or_else(|| StoreError::Corruption(format!("unknown cell type code {type_code}")))?;
    debug_assert_eq!(r.pos, key_end);

    let value = r.read_bytes(value_len)?.to_vec();

    let mut cell = Cell::new(row, family, qualifier, timestamp, cell_type, value).with_seq(seq_id);
    if r.remaining() > 0 {
        let tags_len = r.read_u32()? as usize;
        let tags = r.read_bytes(tags_len)?.to_vec();
        if r.remaining() != 0 {
            return Err(corrupt("trailing bytes after tags"));
        }
        cell = cell.with_tags(tags);
    }
    Ok(cell)
}

fn corrupt(msg: &str) -> StoreError {
    StoreError::Corruption(msg.to_string())
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(corrupt("slot truncated"));
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(
            self.read_bytes(2)?.try_into().map_err(|_| corrupt("u16"))?,
        ))
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(
            self.read_bytes(4)?.try_into().map_err(|_| corrupt("u32"))?,
        ))
    }
}
