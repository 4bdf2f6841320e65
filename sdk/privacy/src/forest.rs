//! Merkle Forest
//!
//! An append-only sequence of fixed-depth [`Tree`]s. Only the last tree
//! accepts insertions; once it fills, its root is frozen and the next
//! insertion opens a fresh tree with the following id.
//!
//! The forest is a plain owned value. A single writer applies batches in
//! ledger order; readers work on a clone or a shared reference.

use std::mem;

use shade_config::ForestConfig;
use shade_keychain::{FieldElement, Scalar, field_from_hex};
use tracing::info;

use crate::error::TreeError;
use crate::merkle::{
    InsertedBatch, LEAF_ID_STRIDE, MerkleHasher, PoseidonHasher, RootCache, Tree, check_depth,
    default_zero_value,
};
use crate::proof::{MerkleProof, SpendWitness};

#[derive(Debug, Clone)]
pub struct MerkleForest<H = PoseidonHasher> {
    depth: u32,
    zero_value: FieldElement,
    hasher: H,
    finalized: Vec<Tree>,
    active: Tree,
}

impl MerkleForest<PoseidonHasher> {
    pub fn new(depth: u32, zero_value: FieldElement) -> Result<Self, TreeError> {
        Self::with_hasher(depth, zero_value, PoseidonHasher)
    }

    /// Build from configuration; the zero value defaults to 0
    pub fn from_config(config: &ForestConfig) -> Result<Self, TreeError> {
        let zero_value = match &config.zero_value {
            Some(hex) => field_from_hex(hex)
                .map_err(|e| TreeError::InvalidZeroValue(format!("{hex}: {e}")))?,
            None => default_zero_value(),
        };
        Self::new(config.depth, zero_value)
    }
}

impl<H: MerkleHasher> MerkleForest<H> {
    pub fn with_hasher(depth: u32, zero_value: FieldElement, hasher: H) -> Result<Self, TreeError> {
        check_depth(depth)?;
        let active = Tree::new(0, depth, zero_value, &hasher)?;
        Ok(Self {
            depth,
            zero_value,
            hasher,
            finalized: Vec::new(),
            active,
        })
    }

    /// Reassemble from trees that were already validated
    pub(crate) fn from_trees(
        depth: u32,
        zero_value: FieldElement,
        hasher: H,
        mut trees: Vec<Tree>,
    ) -> Result<Self, TreeError> {
        check_depth(depth)?;
        let active = match trees.pop() {
            Some(tree) => tree,
            None => Tree::new(0, depth, zero_value, &hasher)?,
        };
        Ok(Self {
            depth,
            zero_value,
            hasher,
            finalized: trees,
            active,
        })
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn zero_value(&self) -> &FieldElement {
        &self.zero_value
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// The tree currently accepting insertions
    pub fn active_tree(&self) -> &Tree {
        &self.active
    }

    pub fn active_tree_id(&self) -> u32 {
        self.active.id()
    }

    /// All trees, oldest first
    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.finalized.iter().chain(std::iter::once(&self.active))
    }

    pub fn tree_count(&self) -> usize {
        self.finalized.len() + 1
    }

    pub fn tree(&self, tree_id: u32) -> Option<&Tree> {
        let index = tree_id as usize;
        if index < self.finalized.len() {
            self.finalized.get(index)
        } else if tree_id == self.active.id() {
            Some(&self.active)
        } else {
            None
        }
    }

    /// Insert exactly three commitments, opening a new tree if the active
    /// one is full.
    pub fn insert_batch(&mut self, leaves: &[FieldElement]) -> Result<InsertedBatch, TreeError> {
        if leaves.len() != 3 {
            return Err(TreeError::InvalidBatchSize(leaves.len()));
        }

        if self.active.is_full() {
            let next_id = self.active.id() + 1;
            let fresh = Tree::new(next_id, self.depth, self.zero_value, &self.hasher)?;
            let full = mem::replace(&mut self.active, fresh);
            info!(
                finished_tree = full.id(),
                active_tree = next_id,
                "switched to new tree"
            );
            self.finalized.push(full);
        }

        let inserted = self.active.insert_batch(leaves, &self.hasher)?;
        if let Some(final_root) = self.active.final_root() {
            info!(
                tree_id = self.active.id(),
                final_root = %final_root,
                "tree finalized"
            );
        }
        Ok(inserted)
    }

    /// Whether `root` is an acceptable root for `tree_id`.
    ///
    /// Unknown trees and unpopulated or out-of-range hints yield `false`.
    pub fn is_known_root(&self, tree_id: u32, root: &FieldElement, cache_index_hint: usize) -> bool {
        self.tree(tree_id)
            .is_some_and(|tree| tree.is_known_root(root, cache_index_hint))
    }

    /// Like [`MerkleForest::is_known_root`] but as a `Result`
    pub fn ensure_known_root(
        &self,
        tree_id: u32,
        root: &FieldElement,
        cache_index_hint: usize,
    ) -> Result<(), TreeError> {
        if self.is_known_root(tree_id, root, cache_index_hint) {
            Ok(())
        } else {
            Err(TreeError::UnknownRoot { tree_id })
        }
    }

    pub fn gen_merkle_path(&self, tree_id: u32, leaf_index: u64) -> Result<MerkleProof, TreeError> {
        self.tree(tree_id)
            .ok_or(TreeError::UnknownTree(tree_id))?
            .gen_merkle_path(leaf_index)
    }

    pub fn verify(&self, proof: &MerkleProof) -> bool {
        proof.verify(&self.hasher)
    }

    /// Assemble a spend submission for the commitment at `leaf_index`.
    ///
    /// The hint points at the cache slot of the most recent batch, which
    /// stays valid for the next 256 insertions. Finalized trees use 0.
    pub fn spend_witness(
        &self,
        spend_priv: Scalar,
        tree_id: u32,
        leaf_index: u64,
    ) -> Result<SpendWitness, TreeError> {
        let tree = self.tree(tree_id).ok_or(TreeError::UnknownTree(tree_id))?;
        let proof = tree.gen_merkle_path(leaf_index)?;

        let cache_index_hint = if tree.is_finalized() {
            0
        } else {
            RootCache::slot_for(tree.next_index().saturating_sub(LEAF_ID_STRIDE))
        };

        Ok(SpendWitness {
            spend_priv,
            tree_id,
            leaf_id: leaf_index,
            path_elements: proof.path_elements,
            path_indices: proof.path_indices,
            root: proof.root,
            cache_index_hint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::Zero;

    fn triad(seed: u64) -> [FieldElement; 3] {
        [
            FieldElement::from(seed * 3 + 1),
            FieldElement::from(seed * 3 + 2),
            FieldElement::from(seed * 3 + 3),
        ]
    }

    #[test]
    fn test_new_forest() {
        let forest = MerkleForest::new(3, FieldElement::zero()).unwrap();
        assert_eq!(forest.tree_count(), 1);
        assert_eq!(forest.active_tree_id(), 0);
        assert!(forest.tree(1).is_none());
        assert_eq!(
            MerkleForest::new(0, FieldElement::zero()).unwrap_err(),
            TreeError::InvalidDepth(0)
        );
    }

    #[test]
    fn test_from_config() {
        let config = ForestConfig {
            depth: 5,
            zero_value: Some("0x2a".to_string()),
        };
        let forest = MerkleForest::from_config(&config).unwrap();
        assert_eq!(forest.depth(), 5);
        assert_eq!(*forest.zero_value(), FieldElement::from(42u64));

        let bad = ForestConfig {
            depth: 5,
            zero_value: Some("not-hex".to_string()),
        };
        assert!(matches!(
            MerkleForest::from_config(&bad),
            Err(TreeError::InvalidZeroValue(_))
        ));
    }

    #[test]
    fn test_switch_is_lazy() {
        let mut forest = MerkleForest::new(2, FieldElement::zero()).unwrap();
        forest.insert_batch(&triad(0)).unwrap();
        let last = forest.insert_batch(&triad(1)).unwrap();

        // Full, frozen, but still the active tree until the next insert
        assert_eq!(forest.tree_count(), 1);
        assert_eq!(forest.active_tree().final_root(), Some(last.root));

        let next = forest.insert_batch(&triad(2)).unwrap();
        assert_eq!(next.tree_id, 1);
        assert_eq!(next.left_leaf_id, 0);
        assert_eq!(forest.tree_count(), 2);
        assert!(forest.is_known_root(0, &last.root, 0));
        assert!(forest.is_known_root(0, &last.root, 77));
    }

    #[test]
    fn test_ensure_known_root() {
        let mut forest = MerkleForest::new(3, FieldElement::zero()).unwrap();
        let inserted = forest.insert_batch(&triad(0)).unwrap();
        assert!(forest.ensure_known_root(0, &inserted.root, 0).is_ok());
        assert_eq!(
            forest.ensure_known_root(0, &FieldElement::zero(), 0),
            Err(TreeError::UnknownRoot { tree_id: 0 })
        );
        assert!(!forest.is_known_root(9, &inserted.root, 0));
    }

    #[test]
    fn test_gen_path_unknown_tree() {
        let forest = MerkleForest::new(3, FieldElement::zero()).unwrap();
        assert_eq!(
            forest.gen_merkle_path(4, 0),
            Err(TreeError::UnknownTree(4))
        );
        assert_eq!(
            forest.gen_merkle_path(0, 0),
            Err(TreeError::LeafNotFound {
                tree_id: 0,
                leaf_index: 0
            })
        );
    }

    #[test]
    fn test_spend_witness_hint() {
        let mut forest = MerkleForest::new(4, FieldElement::zero()).unwrap();
        forest.insert_batch(&triad(0)).unwrap();
        let latest = forest.insert_batch(&triad(1)).unwrap();

        let witness = forest.spend_witness(Scalar::from(5u64), 0, 1).unwrap();
        assert_eq!(witness.cache_index_hint, latest.cache_index);
        assert_eq!(witness.root, latest.root);
        assert!(forest.is_known_root(witness.tree_id, &witness.root, witness.cache_index_hint));
        assert!(format!("{witness:?}").contains("<redacted>"));
    }
}
