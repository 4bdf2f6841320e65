//! Note Commitments
//!
//! ```text
//! Commitment = Poseidon3(spend_pub.x, spend_pub.y, pack(amount, asset_id, creation_time))
//!
//! pack: bits   0..128  amount
//!       bits 128..192  asset_id
//!       bits 192..224  creation_time
//! ```
//!
//! The commitment is the unit stored in the Merkle forest. Recipients
//! recompute it from their recovered spend key before treating a note as
//! their own.

use ark_ff::PrimeField;
use serde::{Deserialize, Serialize};
use shade_keychain::{ECPoint, FieldElement, KeyError, field_from_be_bytes, field_to_be_bytes, hash3};

/// Public note fields bound into the commitment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteMetadata {
    pub amount: u128,
    pub asset_id: u64,
    pub creation_time: u32,
}

impl NoteMetadata {
    pub fn new(amount: u128, asset_id: u64, creation_time: u32) -> Self {
        Self {
            amount,
            asset_id,
            creation_time,
        }
    }

    /// Pack all fields into one field element (always below 2^224 < P)
    pub fn pack(&self) -> FieldElement {
        let mut bytes = [0u8; 32];
        bytes[4..8].copy_from_slice(&self.creation_time.to_be_bytes());
        bytes[8..16].copy_from_slice(&self.asset_id.to_be_bytes());
        bytes[16..32].copy_from_slice(&self.amount.to_be_bytes());
        // Top 32 bits are zero, so no reduction happens
        FieldElement::from_be_bytes_mod_order(&bytes)
    }

    /// Inverse of [`NoteMetadata::pack`]; `None` if any of the top 32 bits is set
    pub fn unpack(packed: &FieldElement) -> Option<Self> {
        let bytes = field_to_be_bytes(packed);
        if bytes[..4].iter().any(|&b| b != 0) {
            return None;
        }

        let mut time = [0u8; 4];
        let mut asset = [0u8; 8];
        let mut amount = [0u8; 16];
        time.copy_from_slice(&bytes[4..8]);
        asset.copy_from_slice(&bytes[8..16]);
        amount.copy_from_slice(&bytes[16..32]);

        Some(Self {
            amount: u128::from_be_bytes(amount),
            asset_id: u64::from_be_bytes(asset),
            creation_time: u32::from_be_bytes(time),
        })
    }
}

/// A note commitment (one field element)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment(pub FieldElement);

impl Commitment {
    /// Commit to a spend public key and the note metadata
    pub fn compute(spend_pub: &ECPoint, metadata: &NoteMetadata) -> Self {
        Self(hash3(&spend_pub.x, &spend_pub.y, &metadata.pack()))
    }

    /// Create commitment from field element
    pub fn from_field(f: FieldElement) -> Self {
        Self(f)
    }

    /// Convert to field element
    pub fn to_field(&self) -> FieldElement {
        self.0
    }

    /// Big-endian bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        field_to_be_bytes(&self.0)
    }

    /// Parse canonical big-endian bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, KeyError> {
        field_from_be_bytes(bytes).map(Self)
    }
}

impl From<FieldElement> for Commitment {
    fn from(f: FieldElement) -> Self {
        Self(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::Field;
    use rand::{SeedableRng, rngs::StdRng};
    use shade_keychain::Keypair;

    #[test]
    fn test_pack_layout() {
        let meta = NoteMetadata::new(1, 2, 3);
        let bytes = field_to_be_bytes(&meta.pack());
        assert_eq!(bytes[31], 1);
        assert_eq!(bytes[15], 2);
        assert_eq!(bytes[7], 3);
        assert_eq!(NoteMetadata::unpack(&meta.pack()), Some(meta));
    }

    #[test]
    fn test_pack_extremes() {
        let meta = NoteMetadata::new(u128::MAX, u64::MAX, u32::MAX);
        assert_eq!(NoteMetadata::unpack(&meta.pack()), Some(meta));
        assert_eq!(
            meta.pack(),
            FieldElement::from(2u64).pow([224u64]) - FieldElement::from(1u64)
        );
        assert_eq!(NoteMetadata::unpack(&-FieldElement::from(1u64)), None);
    }

    #[test]
    fn test_commitment_deterministic() {
        let mut rng = StdRng::seed_from_u64(0);
        let key = Keypair::random(&mut rng);
        let meta = NoteMetadata::new(1000, 1, 1_700_000_000);

        let c1 = Commitment::compute(key.public_key(), &meta);
        let c2 = Commitment::compute(key.public_key(), &meta);
        assert_eq!(c1, c2, "same inputs should produce same commitment");
    }

    #[test]
    fn test_commitment_binding() {
        let mut rng = StdRng::seed_from_u64(1);
        let key = Keypair::random(&mut rng);
        let other = Keypair::random(&mut rng);
        let meta = NoteMetadata::new(1000, 1, 1_700_000_000);

        let base = Commitment::compute(key.public_key(), &meta);
        assert_ne!(
            base,
            Commitment::compute(key.public_key(), &NoteMetadata::new(2000, 1, 1_700_000_000)),
            "different amounts should produce different commitments"
        );
        assert_ne!(
            base,
            Commitment::compute(key.public_key(), &NoteMetadata::new(1000, 2, 1_700_000_000)),
            "different assets should produce different commitments"
        );
        assert_ne!(
            base,
            Commitment::compute(other.public_key(), &meta),
            "different owners should produce different commitments"
        );
    }

    #[test]
    fn test_commitment_bytes() {
        let c = Commitment::from_field(FieldElement::from(77u64));
        assert_eq!(Commitment::from_bytes(&c.to_bytes()).unwrap(), c);
    }
}
