//! Triad Merkle Tree for Note Commitments
//!
//! Commitments arrive in batches of three. Each batch is hashed into one
//! "triad" node with the 3-ary Poseidon, and the triad nodes are the leaves
//! of an ordinary append-only binary tree built with the 2-ary Poseidon.
//!
//! ```text
//!                      Root                    level D-1
//!                    /      \
//!                 H01        H23               ...
//!                /   \      /   \
//!              T0    T1   T2    T3             level 0 (triads)
//!             /|\   /|\   /|\   /|\
//!            c c c c c c c c c c c c           commitments
//! ```
//!
//! Leaf ids advance by four per triad, the spare slot leaves room for the
//! 2-bit selector the spend circuit uses. Only the first three ids of every
//! group of four are ever populated.

use ark_ff::Zero;
use shade_keychain::{FieldElement, hash2, hash3};
use tracing::debug;

use crate::error::TreeError;
use crate::proof::MerkleProof;

/// Smallest supported depth (a single triad)
pub const MIN_DEPTH: u32 = 1;

/// Largest supported depth
pub const MAX_DEPTH: u32 = 32;

/// Leaves per insertion batch
pub const TRIAD_SIZE: usize = 3;

/// Leaf-id space consumed per triad
pub const LEAF_ID_STRIDE: u64 = 4;

/// Ring slots in the root cache, excluding the current-root slot
pub const ROOT_RING_SLOTS: usize = 256;

/// Total root cache slots; slot 0 always holds the current root
pub const ROOT_CACHE_SLOTS: usize = ROOT_RING_SLOTS + 1;

/// Leaf-id window covered by one turn of the ring
pub const ROOT_RING_WINDOW: u64 = ROOT_RING_SLOTS as u64 * LEAF_ID_STRIDE;

/// Hash functions used to build the tree
pub trait MerkleHasher {
    /// Parent of two binary children
    fn hash2(&self, left: &FieldElement, right: &FieldElement) -> FieldElement;

    /// Triad node of three commitments
    fn hash3(&self, a: &FieldElement, b: &FieldElement, c: &FieldElement) -> FieldElement;
}

/// Poseidon over BLS12-381 Fr, matching the spend circuit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoseidonHasher;

impl MerkleHasher for PoseidonHasher {
    fn hash2(&self, left: &FieldElement, right: &FieldElement) -> FieldElement {
        hash2(left, right)
    }

    fn hash3(&self, a: &FieldElement, b: &FieldElement, c: &FieldElement) -> FieldElement {
        hash3(a, b, c)
    }
}

/// Roots of empty subtrees, one per level.
///
/// `zeros[0] = hash3(z, z, z)`, `zeros[i] = hash2(zeros[i-1], zeros[i-1])`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZeroHashes {
    levels: Vec<FieldElement>,
}

impl ZeroHashes {
    pub fn new<H: MerkleHasher>(hasher: &H, zero_value: &FieldElement, depth: u32) -> Self {
        let mut levels = Vec::with_capacity(depth as usize);
        let mut current = hasher.hash3(zero_value, zero_value, zero_value);
        levels.push(current);
        for _ in 1..depth {
            current = hasher.hash2(&current, &current);
            levels.push(current);
        }
        Self { levels }
    }

    pub fn at(&self, level: usize) -> &FieldElement {
        &self.levels[level]
    }

    /// Root of a tree with no insertions
    pub fn empty_root(&self) -> FieldElement {
        self.levels[self.levels.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Recent roots of one tree.
///
/// Slot 0 is overwritten with the current root on every insertion. Slots
/// 1..=256 form a ring addressed by `(left_leaf_id mod 1024) / 4 + 1`, so a
/// root stays addressable for 256 further insertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootCache {
    slots: Vec<Option<FieldElement>>,
}

impl RootCache {
    pub fn new(current: FieldElement) -> Self {
        let mut slots = vec![None; ROOT_CACHE_SLOTS];
        slots[0] = Some(current);
        Self { slots }
    }

    /// Ring slot a batch starting at `left_leaf_id` is recorded in
    pub fn slot_for(left_leaf_id: u64) -> usize {
        ((left_leaf_id % ROOT_RING_WINDOW) / LEAF_ID_STRIDE) as usize + 1
    }

    /// Record `root` for the batch at `left_leaf_id`; returns the ring slot
    pub fn record(&mut self, left_leaf_id: u64, root: FieldElement) -> usize {
        let slot = Self::slot_for(left_leaf_id);
        self.slots[slot] = Some(root);
        self.slots[0] = Some(root);
        slot
    }

    /// Populated slot content; `None` for empty or out-of-range slots
    pub fn get(&self, index: usize) -> Option<&FieldElement> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn current(&self) -> Option<&FieldElement> {
        self.get(0)
    }

    pub fn slots(&self) -> &[Option<FieldElement>] {
        &self.slots
    }

    pub(crate) fn from_slots(slots: Vec<Option<FieldElement>>) -> Option<Self> {
        (slots.len() == ROOT_CACHE_SLOTS).then_some(Self { slots })
    }
}

/// Result of one batch insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertedBatch {
    pub tree_id: u32,
    /// Leaf id of the first commitment of the triad
    pub left_leaf_id: u64,
    /// Tree root after the insertion
    pub root: FieldElement,
    /// Root cache slot holding `root` until it is overwritten
    pub cache_index: usize,
}

/// One fixed-depth tree of the forest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub(crate) id: u32,
    pub(crate) depth: u32,
    pub(crate) zero_value: FieldElement,
    pub(crate) leaves_num: u64,
    pub(crate) next_index: u64,
    pub(crate) root: FieldElement,
    pub(crate) final_root: Option<FieldElement>,
    /// Last left child seen at each binary level (D-1 entries)
    pub(crate) filled_subtrees: Vec<FieldElement>,
    pub(crate) leaves: Vec<FieldElement>,
    /// Every computed node, level 0 (triads) up to the root level (D entries)
    pub(crate) filled_paths: Vec<Vec<FieldElement>>,
    pub(crate) root_cache: RootCache,
    pub(crate) zeros: ZeroHashes,
}

impl Tree {
    pub fn new<H: MerkleHasher>(
        id: u32,
        depth: u32,
        zero_value: FieldElement,
        hasher: &H,
    ) -> Result<Self, TreeError> {
        check_depth(depth)?;
        let zeros = ZeroHashes::new(hasher, &zero_value, depth);
        let root = zeros.empty_root();
        let filled_subtrees = (0..depth as usize - 1).map(|l| *zeros.at(l)).collect();

        Ok(Self {
            id,
            depth,
            zero_value,
            leaves_num: 0,
            next_index: 0,
            root,
            final_root: None,
            filled_subtrees,
            leaves: Vec::new(),
            filled_paths: vec![Vec::new(); depth as usize],
            root_cache: RootCache::new(root),
            zeros,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn zero_value(&self) -> &FieldElement {
        &self.zero_value
    }

    pub fn root(&self) -> FieldElement {
        self.root
    }

    /// Root frozen when the tree filled up
    pub fn final_root(&self) -> Option<FieldElement> {
        self.final_root
    }

    pub fn leaves_num(&self) -> u64 {
        self.leaves_num
    }

    /// Leaf id the next triad will start at
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    pub fn leaves(&self) -> &[FieldElement] {
        &self.leaves
    }

    pub fn filled_subtrees(&self) -> &[FieldElement] {
        &self.filled_subtrees
    }

    pub fn filled_paths(&self) -> &[Vec<FieldElement>] {
        &self.filled_paths
    }

    pub fn root_cache(&self) -> &RootCache {
        &self.root_cache
    }

    pub fn zeros(&self) -> &ZeroHashes {
        &self.zeros
    }

    /// Maximum number of commitments, `3 · 2^(D-1)`
    pub fn capacity(&self) -> u64 {
        triad_capacity(self.depth)
    }

    pub fn triads(&self) -> u64 {
        self.leaves_num / TRIAD_SIZE as u64
    }

    pub fn is_full(&self) -> bool {
        self.leaves_num >= self.capacity()
    }

    pub fn is_finalized(&self) -> bool {
        self.final_root.is_some()
    }

    /// Append one triad.
    ///
    /// Fails with `TreeFull` once the tree is finalized; the forest never
    /// lets that happen.
    pub fn insert_batch<H: MerkleHasher>(
        &mut self,
        leaves: &[FieldElement],
        hasher: &H,
    ) -> Result<InsertedBatch, TreeError> {
        if leaves.len() != TRIAD_SIZE {
            return Err(TreeError::InvalidBatchSize(leaves.len()));
        }
        if self.is_finalized() || self.is_full() {
            return Err(TreeError::TreeFull(self.id));
        }

        let left_leaf_id = self.next_index;
        let mut index = self.triads();
        let mut current = hasher.hash3(&leaves[0], &leaves[1], &leaves[2]);
        self.set_node(0, index, current);

        for level in 0..self.depth as usize - 1 {
            let (left, right) = if index % 2 == 0 {
                self.filled_subtrees[level] = current;
                (current, *self.zeros.at(level))
            } else {
                (self.filled_subtrees[level], current)
            };
            current = hasher.hash2(&left, &right);
            index /= 2;
            self.set_node(level + 1, index, current);
        }

        self.root = current;
        self.leaves.extend_from_slice(leaves);
        self.leaves_num += TRIAD_SIZE as u64;
        self.next_index += LEAF_ID_STRIDE;
        let cache_index = self.root_cache.record(left_leaf_id, current);

        if self.is_full() {
            self.final_root = Some(current);
        }

        debug!(
            tree_id = self.id,
            left_leaf_id,
            leaves_num = self.leaves_num,
            cache_index,
            "inserted triad"
        );

        Ok(InsertedBatch {
            tree_id: self.id,
            left_leaf_id,
            root: current,
            cache_index,
        })
    }

    /// Membership check for a claimed root; the hint is never trusted
    /// without a value match.
    pub fn is_known_root(&self, root: &FieldElement, cache_index_hint: usize) -> bool {
        if let Some(final_root) = &self.final_root {
            return final_root == root;
        }
        if cache_index_hint == 0 {
            return self.root == *root;
        }
        self.root_cache.get(cache_index_hint) == Some(root)
    }

    /// Commitment stored at a leaf id, if populated
    pub fn leaf(&self, leaf_index: u64) -> Option<&FieldElement> {
        let (triad, selector) = split_leaf_index(leaf_index);
        if selector >= TRIAD_SIZE as u64 || triad >= self.triads() {
            return None;
        }
        self.leaves.get((triad * TRIAD_SIZE as u64 + selector) as usize)
    }

    /// Inclusion proof for the commitment at `leaf_index`
    pub fn gen_merkle_path(&self, leaf_index: u64) -> Result<MerkleProof, TreeError> {
        let leaf = *self.leaf(leaf_index).ok_or(TreeError::LeafNotFound {
            tree_id: self.id,
            leaf_index,
        })?;
        let (triad, selector) = split_leaf_index(leaf_index);

        let base = (triad * TRIAD_SIZE as u64) as usize;
        let mut path_elements = Vec::with_capacity(self.depth as usize + 1);
        path_elements.extend(
            (0..TRIAD_SIZE as u64)
                .filter(|&k| k != selector)
                .map(|k| self.leaves[base + k as usize]),
        );

        let mut path_indices = Vec::with_capacity(self.depth as usize + 1);
        path_indices.push((selector & 1) as u8);
        path_indices.push((selector >> 1) as u8);

        let mut index = triad;
        for level in 0..self.depth as usize - 1 {
            path_indices.push((index & 1) as u8);
            path_elements.push(self.node_or_zero(level, index ^ 1));
            index /= 2;
        }

        Ok(MerkleProof {
            tree_id: self.id,
            leaf,
            leaf_index,
            path_elements,
            path_indices,
            root: self.root,
        })
    }

    fn node_or_zero(&self, level: usize, index: u64) -> FieldElement {
        self.filled_paths[level]
            .get(index as usize)
            .copied()
            .unwrap_or(*self.zeros.at(level))
    }

    fn set_node(&mut self, level: usize, index: u64, value: FieldElement) {
        let nodes = &mut self.filled_paths[level];
        let index = index as usize;
        if index < nodes.len() {
            nodes[index] = value;
        } else {
            nodes.push(value);
        }
    }
}

/// Reject depths outside `1..=32`
pub fn check_depth(depth: u32) -> Result<(), TreeError> {
    if (MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
        Ok(())
    } else {
        Err(TreeError::InvalidDepth(depth))
    }
}

/// Commitment capacity of a tree of the given depth
pub fn capacity_for(depth: u32) -> Result<u64, TreeError> {
    check_depth(depth)?;
    Ok(triad_capacity(depth))
}

// depth already checked
fn triad_capacity(depth: u32) -> u64 {
    (TRIAD_SIZE as u64) << (depth - 1)
}

/// Split a leaf id into (triad index, selector)
pub fn split_leaf_index(leaf_index: u64) -> (u64, u64) {
    (leaf_index / LEAF_ID_STRIDE, leaf_index % LEAF_ID_STRIDE)
}

/// Default zero value for empty leaves
pub fn default_zero_value() -> FieldElement {
    FieldElement::zero()
}
