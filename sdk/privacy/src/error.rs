//! Error definitions for the stealth protocol, the Merkle forest and snapshots.

use shade_keychain::KeyError;
use thiserror::Error;

/// Hard failures while creating or recovering a stealth message.
///
/// A message that is merely addressed to someone else is not an error; see
/// [`crate::stealth::Recovery::NotAddressedToUs`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StealthError {
    /// Message does not have the fixed wire length
    #[error("Malformed message: expected {expected} bytes, got {actual}")]
    MalformedMessage { expected: usize, actual: usize },

    /// Hex form of a message is missing its prefix or has bad digits
    #[error("Malformed message hex: {0}")]
    MalformedMessageHex(&'static str),

    /// Key material failed validation (includes off-curve points)
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The block cipher rejected the buffer
    #[error("Cipher failure")]
    Cipher,
}

/// Errors raised by the Merkle forest
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Insertion attempted on a full or finalized tree
    #[error("Tree {0} is full")]
    TreeFull(u32),

    /// Batches must contain exactly three leaves
    #[error("Invalid batch size: expected 3 leaves, got {0}")]
    InvalidBatchSize(usize),

    /// Membership check failed for the claimed root
    #[error("Unknown root for tree {tree_id}")]
    UnknownRoot { tree_id: u32 },

    /// No tree with this id exists in the forest
    #[error("Unknown tree: {0}")]
    UnknownTree(u32),

    /// Leaf index is not populated (not inserted yet, or the unused fourth slot)
    #[error("Leaf {leaf_index} not found in tree {tree_id}")]
    LeafNotFound { tree_id: u32, leaf_index: u64 },

    /// Depth outside 1..=32
    #[error("Invalid tree depth: {0}")]
    InvalidDepth(u32),

    /// Configured zero value is not a canonical field element
    #[error("Invalid zero value: {0}")]
    InvalidZeroValue(String),
}

/// Errors raised while encoding, decoding or persisting snapshots
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Decompression failure: {0}")]
    DecompressionFailure(String),

    #[error("Deserialization failure: {0}")]
    DeserializationFailure(String),

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    #[error("Encoding failure: {0}")]
    Encode(String),

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StealthError::MalformedMessage {
            expected: 64,
            actual: 63,
        };
        assert_eq!(
            err.to_string(),
            "Malformed message: expected 64 bytes, got 63"
        );

        let err: StealthError = KeyError::InvalidPoint("identity").into();
        assert_eq!(err.to_string(), "Invalid point: identity");

        assert_eq!(
            TreeError::InvalidBatchSize(2).to_string(),
            "Invalid batch size: expected 3 leaves, got 2"
        );
    }
}
