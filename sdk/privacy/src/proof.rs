//! Inclusion proofs and the data handed to the spend circuit

use std::fmt;

use ark_ff::PrimeField;
use serde::{Deserialize, Serialize};
use shade_keychain::{FieldElement, Scalar};

use crate::merkle::{LEAF_ID_STRIDE, MerkleHasher, TRIAD_SIZE};

/// Inclusion proof for one commitment.
///
/// `path_elements` holds the two other commitments of the triad, then one
/// sibling per binary level. `path_indices` holds the 2-bit selector split
/// into two bits, then one direction bit per binary level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub tree_id: u32,
    pub leaf: FieldElement,
    pub leaf_index: u64,
    pub path_elements: Vec<FieldElement>,
    pub path_indices: Vec<u8>,
    pub root: FieldElement,
}

impl MerkleProof {
    /// Recompute the root from the path and compare with `self.root`
    pub fn verify<H: MerkleHasher>(&self, hasher: &H) -> bool {
        verify_merkle_path(self, hasher)
    }

    /// Binary levels above the triad node
    pub fn binary_levels(&self) -> usize {
        self.path_elements.len().saturating_sub(TRIAD_SIZE - 1)
    }

    pub fn to_circuit_path(&self) -> CircuitPath {
        CircuitPath {
            root: field_to_decimal(&self.root),
            leaf: field_to_decimal(&self.leaf),
            path_elements: self.path_elements.iter().map(field_to_decimal).collect(),
            path_indices: self.path_indices.clone(),
        }
    }
}

/// Check a proof against its own root.
///
/// Returns `false` for any structural inconsistency: wrong lengths,
/// non-binary indices, the unused fourth selector, or indices that do not
/// agree with `leaf_index`.
pub fn verify_merkle_path<H: MerkleHasher>(proof: &MerkleProof, hasher: &H) -> bool {
    let triad_siblings = TRIAD_SIZE - 1;
    if proof.path_elements.len() < triad_siblings
        || proof.path_elements.len() != proof.path_indices.len()
        || proof.path_indices.iter().any(|&bit| bit > 1)
    {
        return false;
    }

    let selector = (proof.path_indices[0] | (proof.path_indices[1] << 1)) as u64;
    let (s0, s1) = (&proof.path_elements[0], &proof.path_elements[1]);
    let mut current = match selector {
        0 => hasher.hash3(&proof.leaf, s0, s1),
        1 => hasher.hash3(s0, &proof.leaf, s1),
        2 => hasher.hash3(s0, s1, &proof.leaf),
        _ => return false,
    };

    let levels = &proof.path_indices[triad_siblings..];
    if levels.len() >= 64 {
        return false;
    }
    let mut triad = 0u64;
    for (level, (bit, sibling)) in levels
        .iter()
        .zip(&proof.path_elements[triad_siblings..])
        .enumerate()
    {
        triad |= (*bit as u64) << level;
        current = if *bit == 0 {
            hasher.hash2(&current, sibling)
        } else {
            hasher.hash2(sibling, &current)
        };
    }

    let expected_index = triad
        .checked_mul(LEAF_ID_STRIDE)
        .and_then(|id| id.checked_add(selector));
    expected_index == Some(proof.leaf_index) && current == proof.root
}

/// Circuit-facing encoding: field elements as decimal strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitPath {
    pub root: String,
    pub leaf: String,
    pub path_elements: Vec<String>,
    pub path_indices: Vec<u8>,
}

/// Everything a spender submits to the verifier
#[derive(Clone, PartialEq, Eq)]
pub struct SpendWitness {
    pub spend_priv: Scalar,
    pub tree_id: u32,
    pub leaf_id: u64,
    pub path_elements: Vec<FieldElement>,
    pub path_indices: Vec<u8>,
    pub root: FieldElement,
    /// Root cache slot the verifier should check first
    pub cache_index_hint: usize,
}

impl fmt::Debug for SpendWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpendWitness")
            .field("spend_priv", &"<redacted>")
            .field("tree_id", &self.tree_id)
            .field("leaf_id", &self.leaf_id)
            .field("path_elements", &self.path_elements.len())
            .field("root", &self.root)
            .field("cache_index_hint", &self.cache_index_hint)
            .finish()
    }
}

fn field_to_decimal(value: &FieldElement) -> String {
    value.into_bigint().to_string()
}
