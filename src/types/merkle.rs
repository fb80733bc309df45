//! Append-only incremental merkle tree accumulator.
//!
//! [`IncrementalMerkle`] maintains the root of a merkle tree over a growing sequence of digests
//! while storing only the "active" interior nodes: the left siblings that future appends will still
//! need, at most one per tree level. Appending the same sequence of digests always yields the same
//! root, regardless of which branch of a fork the accumulator was copied along.
//!
//! Interior nodes are computed over *canonical* pairs: before hashing, the high bit of the first
//! byte of the left child is cleared and the high bit of the first byte of the right child is set.
//! This makes the (left, right) role of every child part of the hashed data, so a proof cannot
//! reinterpret a left child as a right child.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest as Sha256Digest, Sha256};

use super::data_types::Digest;

/// Merkle tree accumulator over an append-only sequence of digests.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct IncrementalMerkle {
    active_nodes: Vec<Digest>,
    node_count: u64,
}

impl IncrementalMerkle {
    /// Create an empty `IncrementalMerkle`. Its [`root`](Self::root) is the all-zero digest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get how many digests have been appended to this accumulator.
    pub const fn node_count(&self) -> u64 {
        self.node_count
    }

    /// Get the current root of the accumulated tree.
    ///
    /// Leaves without a sibling are paired with a copy of themselves, as if the sequence were
    /// padded out to the next power of two.
    pub fn root(&self) -> Digest {
        if self.node_count == 0 {
            Digest::new([0u8; 32])
        } else {
            *self
                .active_nodes
                .last()
                .expect("a non-empty accumulator always retains its root node")
        }
    }

    /// Append `digest` as the next leaf and return the new root.
    pub fn append(&mut self, digest: Digest) -> Digest {
        let mut partial = false;
        let max_depth = calculate_max_depth(self.node_count + 1);
        let mut current_depth = max_depth - 1;
        let mut index = self.node_count;
        let mut top = digest;
        let mut active_iter = self.active_nodes.iter();
        let mut updated_active_nodes: Vec<Digest> = Vec::with_capacity(max_depth as usize);

        while current_depth > 0 {
            if index & 0x1 == 0 {
                // Left child with no right sibling yet: this node must stay active until the
                // sibling arrives, and the parent is computed against a clone of the node.
                if !partial {
                    updated_active_nodes.push(top);
                }
                top = hash_pair(&make_canonical_left(&top), &make_canonical_right(&top));
                partial = true;
            } else {
                let left_value = *active_iter
                    .next()
                    .expect("a right child always has a recorded left sibling");
                if partial {
                    updated_active_nodes.push(left_value);
                }
                top = hash_pair(&make_canonical_left(&left_value), &make_canonical_right(&top));
            }

            current_depth -= 1;
            index >>= 1;
        }

        updated_active_nodes.push(top);
        self.active_nodes = updated_active_nodes;
        self.node_count += 1;

        top
    }
}

// Depth of the tree implied by `node_count` leaves: 1 for the leaf level plus one level per
// power of two up to the next power of two >= node_count.
fn calculate_max_depth(node_count: u64) -> u32 {
    if node_count == 0 {
        return 0;
    }
    let implied_count = node_count.next_power_of_two();
    implied_count.trailing_zeros() + 1
}

fn make_canonical_left(digest: &Digest) -> Digest {
    let mut bytes = digest.bytes();
    bytes[0] &= 0x7F;
    Digest::new(bytes)
}

fn make_canonical_right(digest: &Digest) -> Digest {
    let mut bytes = digest.bytes();
    bytes[0] |= 0x80;
    Digest::new(bytes)
}

fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(left.bytes());
    hasher.update(right.bytes());
    Digest::new(hasher.finalize().into())
}
