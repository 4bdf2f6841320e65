//! Shade Keychain
//!
//! Deterministic key derivation over the Jubjub curve embedded in the
//! BLS12-381 scalar field, plus the Poseidon hash shared with the circuits.
//!
//! ```text
//!   seed ──────────────┐
//!                      ├──► private a (mod Q) ──► A = a·Base   (root keypair)
//!   wallet signature ──┘            │
//!        (r, s) ─► Poseidon(r, s)   │  ρ (per transaction)
//!                                   ▼
//!                       child: (a·ρ, ρ·A)                     (stealth keypair)
//! ```

pub mod curve;
pub mod error;
pub mod field;
pub mod hash;
pub mod keys;

pub use curve::{
    ECPoint, PACKED_POINT_LEN, add_points, base_point, ensure_valid_point, mul_base, mul_point,
    pack_point, unpack_point,
};
pub use error::{KeyError, Result};
pub use field::{
    FieldElement, Scalar, field_from_be_bytes, field_from_hex, field_to_be_bytes, field_to_hex,
    random_scalar, scalar_from_be_bytes, scalar_from_be_bytes_mod_order, scalar_to_be_bytes,
};
pub use hash::{hash2, hash3};
pub use keys::{
    Keypair, derive_child_keypair, derive_child_private_key, derive_child_public_key,
    derive_from_seed, derive_from_seed_hex, derive_from_signature, derive_from_signature_bytes,
};
