/// Error taxonomy for the rating core.
use thiserror::Error;

use crate::types::ItemId;

/// Errors from `RatingEngine` operations. Any error means no state was touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Unknown item id: {0}")]
    InvalidId(ItemId),

    #[error("Duplicate item id in catalog: {0}")]
    DuplicateId(ItemId),

    #[error("Item {0} cannot be compared with itself")]
    SameItem(ItemId),
}

/// Errors from pair selection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PairingError {
    #[error("Need at least 2 items to draw a pair, got {available}")]
    InsufficientPool { available: usize },
}

/// Internal storage failures.
///
/// `PersistenceStore` never hands these to its callers; they are logged and
/// normalized to "absent" or `false`. Backends return them so the store can decide.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),
}

/// Errors surfaced by `SessionController`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Pairing(#[from] PairingError),
}
