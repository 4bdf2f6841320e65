//! Jubjub curve layer
//!
//! Twisted-Edwards curve whose base field is the hash/circuit field, so point
//! coordinates can be fed straight into Poseidon.
//!
//! Packing uses the arkworks compressed form: the y coordinate with the sign
//! of x folded into the spare high bit, 32 bytes in total. Unpacking rejects
//! anything that does not decode to a non-identity point of the prime-order
//! subgroup.

use ark_ec::{AffineRepr, CurveGroup};
use ark_ed_on_bls12_381::EdwardsAffine;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

use crate::error::{KeyError, Result};
use crate::field::Scalar;

/// Affine Jubjub point
pub type ECPoint = EdwardsAffine;

/// Size of a packed point
pub const PACKED_POINT_LEN: usize = 32;

/// The fixed generator `Base`
pub fn base_point() -> ECPoint {
    EdwardsAffine::generator()
}

/// `k · Base`
pub fn mul_base(k: &Scalar) -> ECPoint {
    (base_point() * k).into_affine()
}

/// `k · point`
pub fn mul_point(point: &ECPoint, k: &Scalar) -> ECPoint {
    (*point * k).into_affine()
}

/// Group addition
pub fn add_points(a: &ECPoint, b: &ECPoint) -> ECPoint {
    (*a + *b).into_affine()
}

/// Canonical 32-byte encoding
pub fn pack_point(point: &ECPoint) -> [u8; PACKED_POINT_LEN] {
    let mut out = [0u8; PACKED_POINT_LEN];
    point
        .serialize_compressed(&mut out[..])
        .expect("compressed Jubjub point fits in 32 bytes");
    out
}

/// Decode and validate a packed point received from outside the core
pub fn unpack_point(bytes: &[u8]) -> Result<ECPoint> {
    if bytes.len() != PACKED_POINT_LEN {
        return Err(KeyError::InvalidPoint("packed point must be 32 bytes"));
    }

    // Validate::Yes: on-curve and prime-order subgroup checks
    let point = EdwardsAffine::deserialize_compressed(bytes)
        .map_err(|_| KeyError::InvalidPoint("not a point of the prime-order subgroup"))?;

    if point.is_zero() {
        return Err(KeyError::InvalidPoint("identity"));
    }
    if pack_point(&point) != bytes {
        return Err(KeyError::InvalidPoint("non-canonical encoding"));
    }

    Ok(point)
}

/// Reject the identity for points that arrive already decoded
pub fn ensure_valid_point(point: &ECPoint) -> Result<()> {
    if point.is_zero() {
        return Err(KeyError::InvalidPoint("identity"));
    }
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(KeyError::InvalidPoint("not a point of the prime-order subgroup"));
    }
    Ok(())
}
