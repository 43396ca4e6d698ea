pub mod tree;

pub use tree::{compute_merkle_root, MerkleError, MerklePath, MerkleTree, MAX_DEPTH, MAX_TREE_DEPTH};
