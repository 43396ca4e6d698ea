//! Merkle tree and path types for identity and cell-map membership.
//!
//! Paths are positional data: a leaf, one sibling per level, and the leaf
//! index whose bits pick the left/right order at each level.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::field::FieldElement;
use crate::hash::hash2;

/// Deepest path accepted; the leaf index is a `u64`.
pub const MAX_DEPTH: usize = 64;

/// Deepest tree [`MerkleTree`] will materialize in memory.
pub const MAX_TREE_DEPTH: usize = 32;

/// Errors that can occur with Merkle path operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MerkleError {
    #[error("merkle path depth {depth} exceeds the maximum of {MAX_DEPTH}")]
    PathTooDeep { depth: usize },

    #[error("leaf index {leaf_index} does not fit in a path of depth {depth}")]
    IndexOutOfRange { leaf_index: u64, depth: usize },

    #[error("tree depth {depth} exceeds the in-memory maximum of {MAX_TREE_DEPTH}")]
    TreeTooDeep { depth: usize },
}

/// Fold a leaf up to the root.
///
/// At level `i`, bit `i` of `leaf_index` being 0 places the running value on
/// the left of the sibling; 1 places it on the right.
pub fn compute_merkle_root(
    leaf: &FieldElement,
    siblings: &[FieldElement],
    leaf_index: u64,
) -> Result<FieldElement, MerkleError> {
    let depth = siblings.len();
    if depth > MAX_DEPTH {
        return Err(MerkleError::PathTooDeep { depth });
    }
    if depth < MAX_DEPTH && leaf_index >> depth != 0 {
        return Err(MerkleError::IndexOutOfRange { leaf_index, depth });
    }

    let mut current = *leaf;
    for (level, sibling) in siblings.iter().enumerate() {
        current = if (leaf_index >> level) & 1 == 0 {
            hash2(&current, sibling)
        } else {
            hash2(sibling, &current)
        };
    }
    Ok(current)
}

/// A Merkle path (proof) for membership verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePath {
    /// The leaf value being proven.
    pub leaf: FieldElement,
    /// Sibling hashes along the path from leaf to root.
    pub siblings: Vec<FieldElement>,
    /// Position of the leaf; bit `i` is the direction at level `i`.
    pub leaf_index: u64,
}

impl MerklePath {
    /// Compute the root from this path.
    pub fn compute_root(&self) -> Result<FieldElement, MerkleError> {
        compute_merkle_root(&self.leaf, &self.siblings, self.leaf_index)
    }

    /// Verify this path against a given root. Malformed paths verify as false.
    pub fn verify(&self, root: &FieldElement) -> bool {
        matches!(self.compute_root(), Ok(computed) if &computed == root)
    }

    /// Get the depth of this path.
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }
}

/// Binary Merkle tree with Poseidon2 `hash2` nodes.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// All nodes stored in a flat array (level-order).
    /// Index 0 = root, the last `2^depth` entries are the leaves.
    nodes: Vec<FieldElement>,
    depth: usize,
    num_leaves: usize,
    leaf_index: HashMap<FieldElement, usize>,
}

impl MerkleTree {
    /// Build a tree from a list of leaves, padded with zero leaves to the
    /// next power of two.
    pub fn new(leaves: Vec<FieldElement>) -> Self {
        let depth = leaves.len().max(1).next_power_of_two().trailing_zeros().max(1);
        Self::build(depth as usize, leaves)
    }

    /// Build a tree of a fixed depth. Leaves beyond `2^depth` are dropped.
    pub fn with_depth(depth: usize, leaves: Vec<FieldElement>) -> Result<Self, MerkleError> {
        if depth > MAX_TREE_DEPTH {
            return Err(MerkleError::TreeTooDeep { depth });
        }
        Ok(Self::build(depth, leaves))
    }

    fn build(depth: usize, leaves: Vec<FieldElement>) -> Self {
        let padded_size = 1usize << depth;
        let num_leaves = leaves.len().min(padded_size);

        let mut nodes = vec![FieldElement::zero(); 2 * padded_size - 1];
        let leaf_start = padded_size - 1;
        for (i, leaf) in leaves.into_iter().take(num_leaves).enumerate() {
            nodes[leaf_start + i] = leaf;
        }

        for i in (0..leaf_start).rev() {
            nodes[i] = hash2(&nodes[2 * i + 1], &nodes[2 * i + 2]);
        }

        let mut leaf_index = HashMap::new();
        for i in 0..num_leaves {
            leaf_index.entry(nodes[leaf_start + i]).or_insert(i);
        }

        Self {
            nodes,
            depth,
            num_leaves,
            leaf_index,
        }
    }

    /// Get the Merkle root.
    pub fn root(&self) -> FieldElement {
        self.nodes[0]
    }

    /// Get tree depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Get number of actual (non-padding) leaves.
    pub fn num_leaves(&self) -> usize {
        self.num_leaves
    }

    /// Index of the first occurrence of a leaf.
    pub fn find_leaf(&self, leaf: &FieldElement) -> Option<usize> {
        self.leaf_index.get(leaf).copied()
    }

    /// Check if a leaf exists in the tree.
    pub fn contains(&self, leaf: &FieldElement) -> bool {
        self.find_leaf(leaf).is_some()
    }

    /// Generate a Merkle path for the leaf at the given index.
    pub fn get_path(&self, leaf_index: usize) -> Option<MerklePath> {
        if leaf_index >= self.num_leaves {
            return None;
        }

        let leaf_start = (1usize << self.depth) - 1;
        let mut node_index = leaf_start + leaf_index;
        let leaf = self.nodes[node_index];
        let mut siblings = Vec::with_capacity(self.depth);

        while node_index > 0 {
            let is_right = node_index % 2 == 0;
            let sibling_index = if is_right {
                node_index - 1
            } else {
                node_index + 1
            };
            siblings.push(self.nodes[sibling_index]);
            node_index = (node_index - 1) / 2;
        }

        Some(MerklePath {
            leaf,
            siblings,
            leaf_index: leaf_index as u64,
        })
    }

    /// Generate a Merkle path for a specific leaf value.
    pub fn get_path_for_leaf(&self, leaf: &FieldElement) -> Option<MerklePath> {
        let index = self.find_leaf(leaf)?;
        self.get_path(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fe(v: u64) -> FieldElement {
        FieldElement::from_u64(v)
    }

    #[test]
    fn test_single_level_orders() {
        let leaf = fe(11);
        let sibling = fe(22);
        assert_eq!(
            compute_merkle_root(&leaf, &[sibling], 0).unwrap(),
            hash2(&leaf, &sibling)
        );
        assert_eq!(
            compute_merkle_root(&leaf, &[sibling], 1).unwrap(),
            hash2(&sibling, &leaf)
        );
    }

    #[test]
    fn test_two_levels_follow_index_bits() {
        let leaf = fe(1);
        let s0 = fe(2);
        let s1 = fe(3);
        // index 2 = 0b10: left at level 0, right at level 1
        let expected = hash2(&s1, &hash2(&leaf, &s0));
        assert_eq!(compute_merkle_root(&leaf, &[s0, s1], 2).unwrap(), expected);
    }

    #[test]
    fn test_empty_path_is_leaf() {
        assert_eq!(compute_merkle_root(&fe(5), &[], 0).unwrap(), fe(5));
    }

    #[test]
    fn test_index_out_of_range() {
        assert_eq!(
            compute_merkle_root(&fe(1), &[fe(2)], 2),
            Err(MerkleError::IndexOutOfRange {
                leaf_index: 2,
                depth: 1
            })
        );
    }

    #[test]
    fn test_path_too_deep() {
        let siblings = vec![fe(0); MAX_DEPTH + 1];
        assert_eq!(
            compute_merkle_root(&fe(1), &siblings, 0),
            Err(MerkleError::PathTooDeep {
                depth: MAX_DEPTH + 1
            })
        );
    }

    #[test]
    fn test_single_leaf() {
        let leaf = fe(42);
        let tree = MerkleTree::new(vec![leaf]);

        assert_eq!(tree.num_leaves(), 1);
        assert_eq!(tree.depth(), 1);
        assert!(tree.contains(&leaf));

        let path = tree.get_path(0).unwrap();
        assert!(path.verify(&tree.root()));
    }

    #[test]
    fn test_multiple_leaves() {
        let leaves: Vec<FieldElement> = (0..8).map(fe).collect();
        let tree = MerkleTree::new(leaves.clone());

        assert_eq!(tree.num_leaves(), 8);
        assert_eq!(tree.depth(), 3);

        for (i, leaf) in leaves.iter().enumerate() {
            let path = tree.get_path(i).unwrap();
            assert_eq!(path.leaf_index, i as u64);
            assert_eq!(&path.leaf, leaf);
            assert!(path.verify(&tree.root()));
        }
    }

    #[test]
    fn test_non_power_of_two() {
        let leaves: Vec<FieldElement> = (10..15).map(fe).collect();
        let tree = MerkleTree::new(leaves.clone());

        assert_eq!(tree.num_leaves(), 5);
        assert_eq!(tree.depth(), 3);

        for i in 0..leaves.len() {
            assert!(tree.get_path(i).unwrap().verify(&tree.root()));
        }
        assert!(tree.get_path(5).is_none());
    }

    #[test]
    fn test_fixed_depth_tree() {
        let tree = MerkleTree::with_depth(5, vec![fe(7), fe(8)]).unwrap();
        let path = tree.get_path_for_leaf(&fe(8)).unwrap();
        assert_eq!(path.depth(), 5);
        assert_eq!(path.leaf_index, 1);
        assert!(path.verify(&tree.root()));
    }

    #[test]
    fn test_fixed_depth_bounded() {
        for depth in [MAX_TREE_DEPTH + 1, 64, usize::MAX] {
            assert_eq!(
                MerkleTree::with_depth(depth, vec![fe(1)]).unwrap_err(),
                MerkleError::TreeTooDeep { depth }
            );
        }
        assert_eq!(MerkleTree::with_depth(0, vec![fe(1)]).unwrap().root(), fe(1));
    }

    #[test]
    fn test_invalid_path_fails() {
        let leaves: Vec<FieldElement> = (0..4).map(fe).collect();
        let tree = MerkleTree::new(leaves);

        let mut path = tree.get_path(0).unwrap();
        path.siblings[0] = fe(999);
        assert!(!path.verify(&tree.root()));

        let mut path = tree.get_path(1).unwrap();
        path.leaf_index = 0;
        assert!(!path.verify(&tree.root()));
    }

    #[test]
    fn test_find_leaf() {
        let leaves: Vec<FieldElement> = (0..8).map(fe).collect();
        let tree = MerkleTree::new(leaves);

        assert_eq!(tree.find_leaf(&fe(3)), Some(3));
        assert_eq!(tree.find_leaf(&fe(100)), None);
    }

    #[test]
    fn test_path_serializes_as_hex() {
        let tree = MerkleTree::new((0..4).map(fe).collect());
        let path = tree.get_path(2).unwrap();
        let json = serde_json::to_string(&path).unwrap();
        let back: MerklePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(json.contains(&fe(2).to_hex()));
    }
}
