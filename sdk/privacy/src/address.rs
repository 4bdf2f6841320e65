//! Stealth address: the public key pair a recipient publishes once.
//!
//! ```text
//! address = pack(root_pub) || pack(channel_pub)    (64 bytes)
//! ```
//!
//! `root_pub` blinds the per-note spend key; `channel_pub` is only used for
//! the ECDH channel that carries the blinding scalar.

use shade_keychain::{
    ECPoint, KeyError, Keypair, PACKED_POINT_LEN, ensure_valid_point, pack_point, unpack_point,
};

/// Encoded address length
pub const ADDRESS_LEN: usize = 2 * PACKED_POINT_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StealthAddress {
    root_pub: ECPoint,
    channel_pub: ECPoint,
}

impl StealthAddress {
    /// Build from already-decoded points; both are validated
    pub fn new(root_pub: ECPoint, channel_pub: ECPoint) -> Result<Self, KeyError> {
        ensure_valid_point(&root_pub)?;
        ensure_valid_point(&channel_pub)?;
        Ok(Self {
            root_pub,
            channel_pub,
        })
    }

    pub fn from_keypairs(root: &Keypair, channel: &Keypair) -> Self {
        Self {
            root_pub: *root.public_key(),
            channel_pub: *channel.public_key(),
        }
    }

    pub fn root_pub(&self) -> &ECPoint {
        &self.root_pub
    }

    pub fn channel_pub(&self) -> &ECPoint {
        &self.channel_pub
    }

    pub fn to_bytes(&self) -> [u8; ADDRESS_LEN] {
        let mut out = [0u8; ADDRESS_LEN];
        out[..PACKED_POINT_LEN].copy_from_slice(&pack_point(&self.root_pub));
        out[PACKED_POINT_LEN..].copy_from_slice(&pack_point(&self.channel_pub));
        out
    }

    /// Decode an address received from outside; both points must be valid
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != ADDRESS_LEN {
            return Err(KeyError::InvalidPoint("stealth address must be 64 bytes"));
        }
        let (root, channel) = bytes.split_at(PACKED_POINT_LEN);
        Ok(Self {
            root_pub: unpack_point(root)?,
            channel_pub: unpack_point(channel)?,
        })
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let digits = s
            .strip_prefix("0x")
            .ok_or(KeyError::InvalidPoint("address hex must start with 0x"))?;
        let bytes =
            hex::decode(digits).map_err(|_| KeyError::InvalidPoint("address is not valid hex"))?;
        Self::from_bytes(&bytes)
    }
}
