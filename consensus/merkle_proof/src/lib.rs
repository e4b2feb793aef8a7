//! Binary merkle trees over 32-byte leaves, with proof generation and
//! verification. Used for the KZG-commitment inclusion proofs carried by
//! blob sidecars.

use alloy_primitives::B256 as Hash256;
use ethereum_hashing::{ZERO_HASHES_MAX_INDEX, hash32_concat};
use once_cell::sync::Lazy;

/// The zero hash at each layer: `ZERO_HASHES[i]` is the root of a depth-`i`
/// tree whose leaves are all zero.
pub static ZERO_HASHES: Lazy<Vec<Hash256>> = Lazy::new(|| {
    let mut hashes = vec![Hash256::ZERO; ZERO_HASHES_MAX_INDEX + 1];
    for i in 0..ZERO_HASHES_MAX_INDEX {
        hashes[i + 1] = Hash256::from_slice(&hash32_concat(
            hashes[i].as_slice(),
            hashes[i].as_slice(),
        ));
    }
    hashes
});

#[derive(Debug, PartialEq, Clone)]
pub enum MerkleTreeError {
    /// Trying to push more leaves than the depth allows.
    MerkleTreeFull,
    DepthTooSmall,
    /// The requested proof index lies outside the tree.
    InvalidIndex,
}

static ZERO_NODE: MerkleTree = MerkleTree::Zero(0);

/// A binary merkle tree. `Zero(depth)` subtrees stand in for unfilled
/// regions without materializing them.
#[derive(Debug, PartialEq, Clone)]
pub enum MerkleTree {
    Leaf(Hash256),
    Node(Hash256, Box<MerkleTree>, Box<MerkleTree>),
    Zero(usize),
}

impl MerkleTree {
    /// Build a tree of `depth` levels from `leaves`, padding with zero
    /// subtrees on the right.
    pub fn create(leaves: &[Hash256], depth: usize) -> Self {
        use MerkleTree::{Leaf, Node, Zero};

        if leaves.is_empty() {
            return Zero(depth);
        }

        match depth {
            0 => {
                debug_assert_eq!(leaves.len(), 1);
                Leaf(leaves[0])
            }
            _ => {
                let subtree_capacity = 2usize.pow(depth as u32 - 1);
                let (left_leaves, right_leaves) = if leaves.len() <= subtree_capacity {
                    (leaves, &[] as &[Hash256])
                } else {
                    leaves.split_at(subtree_capacity)
                };

                let left = MerkleTree::create(left_leaves, depth - 1);
                let right = MerkleTree::create(right_leaves, depth - 1);
                let root = Hash256::from_slice(&hash32_concat(
                    left.hash().as_slice(),
                    right.hash().as_slice(),
                ));
                Node(root, Box::new(left), Box::new(right))
            }
        }
    }

    pub fn hash(&self) -> Hash256 {
        match self {
            MerkleTree::Leaf(h) => *h,
            MerkleTree::Node(h, _, _) => *h,
            MerkleTree::Zero(depth) => ZERO_HASHES[*depth],
        }
    }

    /// Returns `(leaf, branch)` for the leaf at `index`, where `branch` is
    /// ordered bottom-up.
    pub fn generate_proof(
        &self,
        index: usize,
        depth: usize,
    ) -> Result<(Hash256, Vec<Hash256>), MerkleTreeError> {
        if index >= 2usize.pow(depth as u32) {
            return Err(MerkleTreeError::InvalidIndex);
        }

        let mut proof = vec![];
        let mut current_node = self;
        let mut current_depth = depth;
        while current_depth > 0 {
            let ith_bit = (index >> (current_depth - 1)) & 0x01;
            match current_node {
                MerkleTree::Node(_, left, right) => {
                    if ith_bit == 1 {
                        proof.push(left.hash());
                        current_node = right;
                    } else {
                        proof.push(right.hash());
                        current_node = left;
                    }
                }
                MerkleTree::Zero(_) | MerkleTree::Leaf(_) => {
                    // Descending into an unexpanded region: every sibling
                    // from here down is a zero hash.
                    proof.push(ZERO_HASHES[current_depth - 1]);
                    current_node = &ZERO_NODE;
                }
            }
            current_depth -= 1;
        }

        debug_assert_eq!(proof.len(), depth);
        proof.reverse();

        Ok((current_node.hash(), proof))
    }
}

/// Verify a proof that `leaf` exists at `index` in a depth-`depth` tree with
/// the given `root`.
pub fn verify_merkle_proof(
    leaf: Hash256,
    branch: &[Hash256],
    depth: usize,
    index: usize,
    root: Hash256,
) -> bool {
    branch.len() == depth && merkle_root_from_branch(leaf, branch, depth, index) == root
}

/// Recompute a root from a leaf and a bottom-up branch.
pub fn merkle_root_from_branch(
    leaf: Hash256,
    branch: &[Hash256],
    depth: usize,
    index: usize,
) -> Hash256 {
    assert_eq!(branch.len(), depth, "proof length should equal depth");

    let mut merkle_root = leaf;
    for (i, sibling) in branch.iter().enumerate().take(depth) {
        let ith_bit = (index >> i) & 0x01;
        let digest = if ith_bit == 1 {
            hash32_concat(sibling.as_slice(), merkle_root.as_slice())
        } else {
            hash32_concat(merkle_root.as_slice(), sibling.as_slice())
        };
        merkle_root = Hash256::from_slice(&digest);
    }

    merkle_root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(byte: u8) -> Hash256 {
        Hash256::repeat_byte(byte)
    }

    #[test]
    fn zero_depth_tree_is_the_leaf() {
        let tree = MerkleTree::create(&[leaf(1)], 0);
        assert_eq!(tree.hash(), leaf(1));
    }

    #[test]
    fn empty_tree_matches_zero_hashes() {
        for depth in 0..8 {
            assert_eq!(MerkleTree::create(&[], depth).hash(), ZERO_HASHES[depth]);
        }
    }

    #[test]
    fn proofs_verify_for_every_leaf() {
        let depth = 4;
        let leaves: Vec<_> = (0..11u8).map(leaf).collect();
        let tree = MerkleTree::create(&leaves, depth);
        let root = tree.hash();

        for (i, expected) in leaves.iter().enumerate() {
            let (found, proof) = tree.generate_proof(i, depth).unwrap();
            assert_eq!(found, *expected);
            assert!(verify_merkle_proof(found, &proof, depth, i, root));
        }
    }

    #[test]
    fn proof_for_padding_leaf_is_zero() {
        let depth = 3;
        let leaves: Vec<_> = (0..3u8).map(leaf).collect();
        let tree = MerkleTree::create(&leaves, depth);
        let (found, proof) = tree.generate_proof(5, depth).unwrap();
        assert_eq!(found, Hash256::ZERO);
        assert!(verify_merkle_proof(found, &proof, depth, 5, tree.hash()));
    }

    #[test]
    fn wrong_leaf_fails_verification() {
        let depth = 3;
        let leaves: Vec<_> = (0..8u8).map(leaf).collect();
        let tree = MerkleTree::create(&leaves, depth);
        let (_, proof) = tree.generate_proof(2, depth).unwrap();
        assert!(!verify_merkle_proof(leaf(99), &proof, depth, 2, tree.hash()));
    }

    #[test]
    fn wrong_index_fails_verification() {
        let depth = 3;
        let leaves: Vec<_> = (0..8u8).map(leaf).collect();
        let tree = MerkleTree::create(&leaves, depth);
        let (found, proof) = tree.generate_proof(2, depth).unwrap();
        assert!(!verify_merkle_proof(found, &proof, depth, 3, tree.hash()));
    }

    #[test]
    fn out_of_range_index_rejected() {
        let tree = MerkleTree::create(&[leaf(0)], 2);
        assert_eq!(tree.generate_proof(4, 2), Err(MerkleTreeError::InvalidIndex));
    }

    #[test]
    fn short_branch_fails_verification() {
        let depth = 3;
        let leaves: Vec<_> = (0..8u8).map(leaf).collect();
        let tree = MerkleTree::create(&leaves, depth);
        let (found, proof) = tree.generate_proof(0, depth).unwrap();
        assert!(!verify_merkle_proof(found, &proof[..2], depth, 0, tree.hash()));
    }
}
