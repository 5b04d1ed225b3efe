//! Error types for the cellstore core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Mutating or otherwise not-implemented navigable-map operation.
    /// Frozen maps are read-only; hitting this is a caller bug.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Forward-seek operation invoked on a reverse scan heap.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupted cell block: {0}")]
    Corruption(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Scanner failure: {0}")]
    Scanner(String),
}
