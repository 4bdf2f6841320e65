//! Snapshot codec
//!
//! Trees are stored as versioned JSON with every field element written as
//! `0x`-prefixed big-endian hex. Files may additionally be gzip-compressed;
//! [`load`] detects the gzip magic on its own.
//!
//! Loading re-validates the structure so a corrupt or hand-edited file is
//! rejected instead of producing a tree that computes wrong roots.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use shade_config::SnapshotConfig;
use shade_keychain::{FieldElement, field_from_hex, field_to_hex};
use tracing::info;

use crate::error::SnapshotError;
use crate::forest::MerkleForest;
use crate::merkle::{
    LEAF_ID_STRIDE, MerkleHasher, PoseidonHasher, ROOT_CACHE_SLOTS, RootCache, TRIAD_SIZE, Tree,
    ZeroHashes, capacity_for,
};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Serialized form of one tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub version: u32,
    pub id: u32,
    pub depth: u32,
    pub zero_value: String,
    pub leaves_num: u64,
    pub next_index: u64,
    pub root: String,
    pub final_root: Option<String>,
    pub filled_subtrees: Vec<String>,
    pub leaves: Vec<String>,
    pub filled_paths: Vec<Vec<String>>,
    pub root_cache: Vec<Option<String>>,
}

/// Serialized form of a whole forest, oldest tree first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestSnapshot {
    pub version: u32,
    pub depth: u32,
    pub zero_value: String,
    pub trees: Vec<TreeSnapshot>,
}

impl TreeSnapshot {
    pub fn from_tree(tree: &Tree) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            id: tree.id,
            depth: tree.depth,
            zero_value: field_to_hex(&tree.zero_value),
            leaves_num: tree.leaves_num,
            next_index: tree.next_index,
            root: field_to_hex(&tree.root),
            final_root: tree.final_root.as_ref().map(field_to_hex),
            filled_subtrees: hex_vec(&tree.filled_subtrees),
            leaves: hex_vec(&tree.leaves),
            filled_paths: tree.filled_paths.iter().map(|l| hex_vec(l)).collect(),
            root_cache: tree
                .root_cache
                .slots()
                .iter()
                .map(|slot| slot.as_ref().map(field_to_hex))
                .collect(),
        }
    }

    /// Rebuild and validate a tree
    pub fn into_tree(self) -> Result<Tree, SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.version));
        }
        let capacity = capacity_for(self.depth).map_err(|e| invalid(e.to_string()))?;
        let depth = self.depth as usize;
        if self.leaves_num > capacity || self.leaves_num % TRIAD_SIZE as u64 != 0 {
            return Err(invalid(format!(
                "leaves_num {} is not a multiple of 3 within capacity {capacity}",
                self.leaves_num
            )));
        }
        let triads = self.leaves_num / TRIAD_SIZE as u64;
        if self.next_index != triads * LEAF_ID_STRIDE {
            return Err(invalid(format!(
                "next_index {} does not match {} leaves",
                self.next_index, self.leaves_num
            )));
        }
        if self.leaves.len() as u64 != self.leaves_num {
            return Err(invalid("leaf count does not match leaves_num"));
        }
        if self.filled_subtrees.len() != depth - 1 {
            return Err(invalid("filled_subtrees length does not match depth"));
        }
        if self.filled_paths.len() != depth {
            return Err(invalid("filled_paths length does not match depth"));
        }
        for (level, nodes) in self.filled_paths.iter().enumerate() {
            let expected = triads.div_ceil(1u64 << level);
            if nodes.len() as u64 != expected {
                return Err(invalid(format!(
                    "filled_paths level {level} has {} nodes, expected {expected}",
                    nodes.len()
                )));
            }
        }

        let zero_value = parse_field(&self.zero_value)?;
        let root = parse_field(&self.root)?;
        let final_root = self.final_root.as_deref().map(parse_field).transpose()?;
        let filled_subtrees = parse_vec(&self.filled_subtrees)?;
        let leaves = parse_vec(&self.leaves)?;
        let filled_paths = self
            .filled_paths
            .iter()
            .map(|level| parse_vec(level))
            .collect::<Result<Vec<_>, _>>()?;
        let slots = self
            .root_cache
            .iter()
            .map(|slot| slot.as_deref().map(parse_field).transpose())
            .collect::<Result<Vec<_>, _>>()?;
        let root_cache = RootCache::from_slots(slots).ok_or_else(|| {
            invalid(format!("root_cache must have {ROOT_CACHE_SLOTS} slots"))
        })?;

        let zeros = ZeroHashes::new(&PoseidonHasher, &zero_value, self.depth);
        let expected_root = match filled_paths[depth - 1].first() {
            Some(top) => *top,
            None => zeros.empty_root(),
        };
        if root != expected_root {
            return Err(invalid("root does not match filled paths"));
        }
        check_nodes(&PoseidonHasher, &zeros, &leaves, &filled_paths, &filled_subtrees)?;
        if root_cache.current() != Some(&root) {
            return Err(invalid("root cache slot 0 does not hold the current root"));
        }
        if triads > 0 {
            let latest = RootCache::slot_for(self.next_index - LEAF_ID_STRIDE);
            if root_cache.get(latest) != Some(&root) {
                return Err(invalid(format!(
                    "root cache slot {latest} does not hold the latest root"
                )));
            }
        }
        let full = self.leaves_num == capacity;
        if full != final_root.is_some() || final_root.is_some_and(|f| f != root) {
            return Err(invalid("final_root inconsistent with tree occupancy"));
        }

        Ok(Tree {
            id: self.id,
            depth: self.depth,
            zero_value,
            leaves_num: self.leaves_num,
            next_index: self.next_index,
            root,
            final_root,
            filled_subtrees,
            leaves,
            filled_paths,
            root_cache,
            zeros,
        })
    }
}

impl ForestSnapshot {
    pub fn from_forest(forest: &MerkleForest) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            depth: forest.depth(),
            zero_value: field_to_hex(forest.zero_value()),
            trees: forest.trees().map(TreeSnapshot::from_tree).collect(),
        }
    }

    /// Rebuild and validate a forest
    pub fn into_forest(self) -> Result<MerkleForest, SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.version));
        }
        if self.trees.is_empty() {
            return Err(invalid("forest snapshot has no trees"));
        }
        let zero_value = parse_field(&self.zero_value)?;

        let count = self.trees.len();
        let mut trees = Vec::with_capacity(count);
        for (position, snapshot) in self.trees.into_iter().enumerate() {
            let tree = snapshot.into_tree()?;
            if tree.id as usize != position {
                return Err(invalid(format!(
                    "tree at position {position} has id {}",
                    tree.id
                )));
            }
            if tree.depth != self.depth || tree.zero_value != zero_value {
                return Err(invalid(format!(
                    "tree {} does not share the forest parameters",
                    tree.id
                )));
            }
            if position + 1 < count && !tree.is_finalized() {
                return Err(invalid(format!("tree {} is not last but not finalized", tree.id)));
            }
            trees.push(tree);
        }

        MerkleForest::from_trees(self.depth, zero_value, PoseidonHasher, trees)
            .map_err(SnapshotError::from)
    }
}

pub fn serialize_tree(tree: &Tree) -> Result<String, SnapshotError> {
    serde_json::to_string(&TreeSnapshot::from_tree(tree))
        .map_err(|e| SnapshotError::Encode(e.to_string()))
}

pub fn deserialize_tree(json: &str) -> Result<Tree, SnapshotError> {
    let snapshot: TreeSnapshot = serde_json::from_str(json)
        .map_err(|e| SnapshotError::DeserializationFailure(e.to_string()))?;
    snapshot.into_tree()
}

pub fn serialize_forest(forest: &MerkleForest) -> Result<String, SnapshotError> {
    serde_json::to_string(&ForestSnapshot::from_forest(forest))
        .map_err(|e| SnapshotError::Encode(e.to_string()))
}

pub fn deserialize_forest(json: &str) -> Result<MerkleForest, SnapshotError> {
    let snapshot: ForestSnapshot = serde_json::from_str(json)
        .map_err(|e| SnapshotError::DeserializationFailure(e.to_string()))?;
    snapshot.into_forest()
}

/// Gzip-compress a serialized snapshot
pub fn compress(data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| SnapshotError::DecompressionFailure(e.to_string()))?;
    Ok(out)
}

pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// Write the forest to `path`, optionally gzip-compressed
pub fn save(path: &Path, forest: &MerkleForest, compressed: bool) -> Result<(), SnapshotError> {
    let json = serialize_forest(forest)?;
    let bytes = if compressed {
        compress(json.as_bytes())?
    } else {
        json.into_bytes()
    };
    fs::write(path, &bytes)?;

    info!(
        path = %path.display(),
        trees = forest.tree_count(),
        bytes = bytes.len(),
        compressed,
        "saved forest snapshot"
    );
    Ok(())
}

/// Read a forest written by [`save`], compressed or not
pub fn load(path: &Path) -> Result<MerkleForest, SnapshotError> {
    let raw = fs::read(path)?;
    let compressed = is_gzip(&raw);
    let bytes = if compressed { decompress(&raw)? } else { raw };
    let json = String::from_utf8(bytes)
        .map_err(|e| SnapshotError::DeserializationFailure(e.to_string()))?;
    let forest = deserialize_forest(&json)?;

    info!(
        path = %path.display(),
        trees = forest.tree_count(),
        compressed,
        "loaded forest snapshot"
    );
    Ok(forest)
}

/// [`save`] using the configured path and compression
pub fn save_configured(config: &SnapshotConfig, forest: &MerkleForest) -> Result<(), SnapshotError> {
    save(Path::new(&config.path), forest, config.compress)
}

/// [`load`] from the configured path
pub fn load_configured(config: &SnapshotConfig) -> Result<MerkleForest, SnapshotError> {
    load(Path::new(&config.path))
}

/// Recompute every stored node from the leaves.
///
/// Level 0 holds `hash3` of each triad, every higher node is `hash2` of its
/// children with the level's zero hash standing in for a missing right
/// child, and `filled_subtrees[l]` is the last left child at level `l`.
fn check_nodes<H: MerkleHasher>(
    hasher: &H,
    zeros: &ZeroHashes,
    leaves: &[FieldElement],
    filled_paths: &[Vec<FieldElement>],
    filled_subtrees: &[FieldElement],
) -> Result<(), SnapshotError> {
    for (i, (triad, node)) in leaves
        .chunks_exact(TRIAD_SIZE)
        .zip(&filled_paths[0])
        .enumerate()
    {
        if hasher.hash3(&triad[0], &triad[1], &triad[2]) != *node {
            return Err(invalid(format!("triad node {i} does not match its leaves")));
        }
    }

    for (level, subtree) in filled_subtrees.iter().enumerate() {
        let nodes = &filled_paths[level];
        for (j, parent) in filled_paths[level + 1].iter().enumerate() {
            let left = &nodes[2 * j];
            let right = nodes.get(2 * j + 1).unwrap_or(zeros.at(level));
            if hasher.hash2(left, right) != *parent {
                return Err(invalid(format!(
                    "node {j} at level {} does not match its children",
                    level + 1
                )));
            }
        }

        let expected = match nodes.len() {
            0 => zeros.at(level),
            n => &nodes[(n - 1) & !1],
        };
        if subtree != expected {
            return Err(invalid(format!(
                "filled_subtrees[{level}] is not the last left node"
            )));
        }
    }
    Ok(())
}

fn hex_vec(values: &[FieldElement]) -> Vec<String> {
    values.iter().map(field_to_hex).collect()
}

fn parse_field(s: &str) -> Result<FieldElement, SnapshotError> {
    field_from_hex(s).map_err(|e| invalid(format!("{s}: {e}")))
}

fn parse_vec(values: &[String]) -> Result<Vec<FieldElement>, SnapshotError> {
    values.iter().map(|s| parse_field(s)).collect()
}

fn invalid(reason: impl Into<String>) -> SnapshotError {
    SnapshotError::DeserializationFailure(reason.into())
}
