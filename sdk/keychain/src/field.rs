//! Field and scalar domains
//!
//! ```text
//! FieldElement  mod P  (BLS12-381 scalar field = Jubjub base field)
//! Scalar        mod Q  (Jubjub prime-order subgroup, Q < P)
//! ```
//!
//! Byte encodings are 32-byte big-endian throughout. The strict parsers
//! reject non-canonical values; the `_mod_order` variants reduce.

use ark_ff::{BigInt, BigInteger, Field, PrimeField};
use ark_std::rand::{CryptoRng, RngCore};

use crate::error::{KeyError, Result};

/// Residue modulo P. Hash inputs/outputs and curve coordinates.
pub type FieldElement = ark_bls12_381::Fr;

/// Residue modulo Q. Private keys and blinding randoms.
pub type Scalar = ark_ed_on_bls12_381::Fr;

/// Length of every encoded field element or scalar
pub const ENCODED_LEN: usize = 32;

/// Interpret 32 big-endian bytes as a 256-bit integer
pub fn bigint_from_be_bytes(bytes: &[u8; ENCODED_LEN]) -> BigInt<4> {
    let mut limbs = [0u64; 4];
    for (limb, chunk) in limbs.iter_mut().rev().zip(bytes.chunks_exact(8)) {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        *limb = u64::from_be_bytes(word);
    }
    BigInt::new(limbs)
}

fn bigint_to_be_bytes(value: BigInt<4>) -> [u8; ENCODED_LEN] {
    let bytes = value.to_bytes_be();
    let mut arr = [0u8; ENCODED_LEN];
    arr[ENCODED_LEN - bytes.len()..].copy_from_slice(&bytes);
    arr
}

/// Canonical big-endian encoding of a field element
pub fn field_to_be_bytes(value: &FieldElement) -> [u8; ENCODED_LEN] {
    bigint_to_be_bytes(value.into_bigint())
}

/// Parse a canonical field element (value must be below P)
pub fn field_from_be_bytes(bytes: &[u8; ENCODED_LEN]) -> Result<FieldElement> {
    FieldElement::from_bigint(bigint_from_be_bytes(bytes))
        .ok_or_else(|| KeyError::InvalidField("value is not below the field modulus".into()))
}

/// `0x`-prefixed, zero-padded, lowercase hex of a field element
pub fn field_to_hex(value: &FieldElement) -> String {
    format!("0x{}", hex::encode(field_to_be_bytes(value)))
}

/// Parse `0x`-prefixed hex (up to 64 digits) into a canonical field element
pub fn field_from_hex(s: &str) -> Result<FieldElement> {
    let bytes = parse_hex_word(s).map_err(KeyError::InvalidField)?;
    field_from_be_bytes(&bytes)
}

/// Parse a `0x`-prefixed hex string of at most 64 digits into 32 big-endian bytes
pub(crate) fn parse_hex_word(s: &str) -> std::result::Result<[u8; ENCODED_LEN], String> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| format!("missing 0x prefix in {s:?}"))?;
    if digits.is_empty() || digits.len() > ENCODED_LEN * 2 {
        return Err(format!(
            "expected 1..=64 hex digits, got {}",
            digits.len()
        ));
    }

    let padded = format!("{digits:0>64}");
    let mut out = [0u8; ENCODED_LEN];
    hex::decode_to_slice(&padded, &mut out).map_err(|e| e.to_string())?;
    Ok(out)
}

/// Canonical big-endian encoding of a scalar
pub fn scalar_to_be_bytes(value: &Scalar) -> [u8; ENCODED_LEN] {
    bigint_to_be_bytes(value.into_bigint())
}

/// Parse a scalar, failing with `InvalidScalar` when the value is not below Q
pub fn scalar_from_be_bytes(bytes: &[u8; ENCODED_LEN]) -> Result<Scalar> {
    Scalar::from_bigint(bigint_from_be_bytes(bytes)).ok_or(KeyError::InvalidScalar)
}

/// Reduce 32 big-endian bytes modulo Q
pub fn scalar_from_be_bytes_mod_order(bytes: &[u8; ENCODED_LEN]) -> Scalar {
    Scalar::from_be_bytes_mod_order(bytes)
}

/// Reduce a field element (mod P) into the scalar domain (mod Q)
pub fn field_to_scalar(value: &FieldElement) -> Scalar {
    Scalar::from_le_bytes_mod_order(&value.into_bigint().to_bytes_le())
}

/// Largest multiple of Q that fits in 256 bits, i.e. `2^256 - (2^256 mod Q)`.
///
/// Draws at or above this bound are rejected by [`random_scalar`].
pub fn rejection_limit() -> BigInt<4> {
    let remainder = Scalar::from(2u64).pow([256u64]).into_bigint();
    let mut limit = BigInt::new([0u64; 4]);
    // 0 - r wraps to 2^256 - r; the borrow out of the top limb is expected.
    let _wrapped: bool = limit.sub_with_borrow(&remainder);
    limit
}

/// Uniform scalar in `[0, Q)` by rejection sampling.
///
/// Q > 2^251, so a single 256-bit draw is accepted with probability above
/// 0.9 and k consecutive rejections happen with probability below 0.1^k.
/// The loop therefore has no iteration cap.
pub fn random_scalar<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Scalar {
    let limit = rejection_limit();
    loop {
        let candidate = BigInt::new([
            rng.next_u64(),
            rng.next_u64(),
            rng.next_u64(),
            rng.next_u64(),
        ]);
        if candidate < limit {
            return Scalar::from_le_bytes_mod_order(&candidate.to_bytes_le());
        }
    }
}
