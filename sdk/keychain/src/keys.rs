//! Key derivation
//!
//! ```text
//! root keypair   : (a, A = a·Base)         long-lived, shared once
//! child keypair  : (a·ρ, ρ·A)              per transaction, never stored
//! ```
//!
//! The child identity `(a·ρ)·Base == ρ·(a·Base)` lets a sender derive the
//! spend public key from the published root key while only the recipient,
//! who knows `a`, can derive the matching private key.

use std::fmt;

use ark_ff::{PrimeField, Zero};
use ark_std::rand::{CryptoRng, RngCore};

use crate::curve::{ECPoint, mul_base, mul_point};
use crate::error::{KeyError, Result};
use crate::field::{
    ENCODED_LEN, FieldElement, Scalar, field_to_scalar, parse_hex_word, random_scalar,
};
use crate::hash::hash2;

/// Raw signature length: r (32) || s (32) || v (1)
pub const SIGNATURE_LEN: usize = 65;

/// Hex signature length including the `0x` prefix
pub const SIGNATURE_HEX_LEN: usize = 2 + SIGNATURE_LEN * 2;

/// A private scalar and its public point.
///
/// Invariant: `public_key == private_key · Base`.
#[derive(Clone, PartialEq, Eq)]
pub struct Keypair {
    private_key: Scalar,
    public_key: ECPoint,
}

impl Keypair {
    /// Build from a non-zero private scalar
    pub fn from_private_key(private_key: Scalar) -> Result<Self> {
        if private_key.is_zero() {
            return Err(KeyError::InvalidSeed);
        }
        Ok(Self {
            private_key,
            public_key: mul_base(&private_key),
        })
    }

    /// Generate a fresh random keypair
    pub fn random<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Self {
        loop {
            let private_key = random_scalar(rng);
            if !private_key.is_zero() {
                return Self {
                    private_key,
                    public_key: mul_base(&private_key),
                };
            }
        }
    }

    pub fn private_key(&self) -> &Scalar {
        &self.private_key
    }

    pub fn public_key(&self) -> &ECPoint {
        &self.public_key
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Derive a keypair from a 256-bit big-endian seed.
///
/// The private key is `seed mod Q`; a seed that is zero, or reduces to zero,
/// is rejected.
pub fn derive_from_seed(seed: &[u8; ENCODED_LEN]) -> Result<Keypair> {
    if seed.iter().all(|&b| b == 0) {
        return Err(KeyError::InvalidSeed);
    }
    Keypair::from_private_key(Scalar::from_be_bytes_mod_order(seed))
}

/// Derive a keypair from a `0x`-prefixed hex seed such as `"0xAABBCCDDEEFF"`
pub fn derive_from_seed_hex(seed: &str) -> Result<Keypair> {
    let bytes = parse_hex_word(seed).map_err(|_| KeyError::InvalidSeed)?;
    derive_from_seed(&bytes)
}

/// Derive a keypair from a wallet signature given as 132 hex characters
/// (`0x` followed by 65 bytes).
///
/// The signature is only an entropy source and is never verified.
pub fn derive_from_signature(signature: &str) -> Result<Keypair> {
    if signature.len() != SIGNATURE_HEX_LEN {
        return Err(KeyError::MalformedSignature(format!(
            "expected {SIGNATURE_HEX_LEN} characters, got {}",
            signature.len()
        )));
    }
    let digits = signature
        .strip_prefix("0x")
        .ok_or_else(|| KeyError::MalformedSignature("missing 0x prefix".into()))?;

    let mut raw = [0u8; SIGNATURE_LEN];
    hex::decode_to_slice(digits, &mut raw)
        .map_err(|e| KeyError::MalformedSignature(e.to_string()))?;
    derive_from_signature_bytes(&raw)
}

/// Byte form of [`derive_from_signature`]; input must be exactly 65 bytes
pub fn derive_from_signature_bytes(signature: &[u8]) -> Result<Keypair> {
    if signature.len() != SIGNATURE_LEN {
        return Err(KeyError::MalformedSignature(format!(
            "expected {SIGNATURE_LEN} bytes, got {}",
            signature.len()
        )));
    }

    // The trailing recovery byte carries almost no entropy and is dropped.
    let (r, rest) = signature.split_at(ENCODED_LEN);
    let s = &rest[..ENCODED_LEN];

    let r_f = FieldElement::from_be_bytes_mod_order(r);
    let s_f = FieldElement::from_be_bytes_mod_order(s);
    let digest = hash2(&r_f, &s_f);

    Keypair::from_private_key(field_to_scalar(&digest))
}

/// `ρ · rootPub`
pub fn derive_child_public_key(root_pub: &ECPoint, rho: &Scalar) -> ECPoint {
    mul_point(root_pub, rho)
}

/// `rootPriv · ρ mod Q`
pub fn derive_child_private_key(root_priv: &Scalar, rho: &Scalar) -> Scalar {
    *root_priv * rho
}

/// Child keypair for a given blinding scalar
pub fn derive_child_keypair(root: &Keypair, rho: &Scalar) -> Result<Keypair> {
    Keypair::from_private_key(derive_child_private_key(root.private_key(), rho))
}
