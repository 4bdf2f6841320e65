//! Keychain error definitions.

use thiserror::Error;

/// Errors produced while parsing or deriving keys
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// A raw scalar encoding was not below the subgroup order Q
    #[error("Invalid scalar: value is not below the subgroup order")]
    InvalidScalar,

    /// Packed point is malformed, off-curve, outside the prime-order subgroup or the identity
    #[error("Invalid point: {0}")]
    InvalidPoint(&'static str),

    /// Seed is zero (or reduces to zero modulo Q)
    #[error("Invalid seed: must be non-zero modulo the subgroup order")]
    InvalidSeed,

    /// Signature does not follow the 0x-prefixed 65-byte convention
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// A raw field encoding was not canonical (not below P)
    #[error("Invalid field element: {0}")]
    InvalidField(String),
}

/// Result type for keychain operations
pub type Result<T> = std::result::Result<T, KeyError>;
