//! Merkle roots and merkle links (inclusion proofs).
//!
//! Pairs are hashed as a 64-byte record `left ‖ right` with double SHA256.
//! A level with an odd number of nodes pairs its last node with itself, the
//! same convention as block merkle trees, duplicate-subtree ambiguity
//! included.

use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::hash::{hash256, Hash256};
use crate::pack::{read_list, read_u32, write_list, Decode, Encode};

/// Membership proof for one leaf: its siblings from the bottom level up and
/// its original position. Bit `i` of `index` is set when the tracked node is
/// the right operand at level `i`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MerkleLink {
    pub branch: Vec<Hash256>,
    pub index: u32,
}

impl Encode for MerkleLink {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        write_list(out, &self.branch)?;
        self.index.encode_to(out)
    }
}

impl Decode for MerkleLink {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        Ok(MerkleLink {
            branch: read_list(buf)?,
            index: read_u32(buf)?,
        })
    }
}

/// Hash two nodes into their parent.
pub fn merkle_parent(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut combined = [0u8; 64];
    combined[..32].copy_from_slice(left.as_bytes());
    combined[32..].copy_from_slice(right.as_bytes());
    hash256(&combined)
}

fn next_level(level: &[Hash256]) -> Vec<Hash256> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => merkle_parent(left, right),
            [last] => merkle_parent(last, last),
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

/// Compute the merkle root of `hashes`. An empty list has root zero.
pub fn merkle_hash(hashes: &[Hash256]) -> Hash256 {
    if hashes.is_empty() {
        return Hash256::ZERO;
    }

    let mut current_level = hashes.to_vec();
    while current_level.len() > 1 {
        current_level = next_level(&current_level);
    }
    current_level[0]
}

/// Build the link that proves `hashes[index]` is part of `merkle_hash(hashes)`.
pub fn calculate_merkle_link(hashes: &[Hash256], index: usize) -> Result<MerkleLink> {
    if index >= hashes.len() {
        return Err(DataError::InvalidProof(format!(
            "leaf index {} out of range for {} leaves",
            index,
            hashes.len()
        )));
    }
    let link_index = u32::try_from(index)
        .map_err(|_| DataError::InvalidProof(format!("leaf index {} exceeds 32 bits", index)))?;

    let mut branch = Vec::new();
    let mut sides = Vec::new();
    let mut position = index;
    let mut current_level = hashes.to_vec();

    while current_level.len() > 1 {
        let is_right = position % 2 == 1;
        let sibling = if is_right {
            position - 1
        } else {
            // The last node of an odd level is its own sibling.
            (position + 1).min(current_level.len() - 1)
        };
        branch.push(current_level[sibling]);
        sides.push(is_right);

        current_level = next_level(&current_level);
        position /= 2;
    }

    debug_assert_eq!(
        sides
            .iter()
            .enumerate()
            .fold(0usize, |acc, (i, &right)| acc | ((right as usize) << i)),
        index
    );

    Ok(MerkleLink {
        branch,
        index: link_index,
    })
}

/// Recompute the merkle root from a leaf and its link.
pub fn check_merkle_link(tip_hash: Hash256, link: &MerkleLink) -> Result<Hash256> {
    let depth = link.branch.len();
    if depth < 32 && (link.index as u64) >= (1u64 << depth) {
        return Err(DataError::InvalidProof(format!(
            "index {} too large for a branch of {}",
            link.index, depth
        )));
    }

    Ok(link
        .branch
        .iter()
        .enumerate()
        .fold(tip_hash, |current, (i, sibling)| {
            if i < 32 && (link.index >> i) & 1 == 1 {
                merkle_parent(sibling, &current)
            } else {
                merkle_parent(&current, sibling)
            }
        }))
}

/// Compute the witness commitment for a SegWit block:
/// SHA256d(witness_merkle_root || witness_reserved_value)
pub fn witness_commitment_hash(
    witness_root_hash: &Hash256,
    witness_reserved_value: &Hash256,
) -> Hash256 {
    merkle_parent(witness_root_hash, witness_reserved_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::double_sha256;

    fn leaf(byte: u8) -> Hash256 {
        Hash256::from_le_bytes([byte; 32])
    }

    fn pair(left: &Hash256, right: &Hash256) -> Hash256 {
        let mut combined = [0u8; 64];
        combined[..32].copy_from_slice(left.as_bytes());
        combined[32..].copy_from_slice(right.as_bytes());
        Hash256::from_le_bytes(double_sha256(&combined))
    }

    #[test]
    fn test_empty_merkle_root() {
        assert_eq!(merkle_hash(&[]), Hash256::ZERO);
    }

    #[test]
    fn test_single_tx_merkle_root() {
        let txid = leaf(0x42);
        assert_eq!(merkle_hash(&[txid]), txid);
    }

    #[test]
    fn test_two_tx_merkle_root() {
        let tx1 = leaf(0x11);
        let tx2 = leaf(0x22);
        assert_eq!(merkle_hash(&[tx1, tx2]), pair(&tx1, &tx2));
    }

    #[test]
    fn test_three_tx_merkle_root() {
        // With 3 transactions, the third is duplicated
        let tx1 = leaf(0x11);
        let tx2 = leaf(0x22);
        let tx3 = leaf(0x33);

        let root = merkle_hash(&[tx1, tx2, tx3]);
        let expected = pair(&pair(&tx1, &tx2), &pair(&tx3, &tx3));
        assert_eq!(root, expected);
    }

    #[test]
    fn test_five_tx_duplicates_at_each_odd_level() {
        let leaves: Vec<Hash256> = (1..=5).map(leaf).collect();
        let h12 = pair(&leaves[0], &leaves[1]);
        let h34 = pair(&leaves[2], &leaves[3]);
        let h55 = pair(&leaves[4], &leaves[4]);
        let h1234 = pair(&h12, &h34);
        let h5555 = pair(&h55, &h55);
        assert_eq!(merkle_hash(&leaves), pair(&h1234, &h5555));
    }

    #[test]
    fn test_link_for_every_leaf() {
        for count in 1..=9u8 {
            let leaves: Vec<Hash256> = (0..count).map(leaf).collect();
            let root = merkle_hash(&leaves);
            for (index, &tip) in leaves.iter().enumerate() {
                let link = calculate_merkle_link(&leaves, index).unwrap();
                assert_eq!(link.index as usize, index);
                assert_eq!(check_merkle_link(tip, &link).unwrap(), root);
            }
        }
    }

    #[test]
    fn test_link_of_last_odd_leaf_uses_itself() {
        let leaves = [leaf(1), leaf(2), leaf(3)];
        let link = calculate_merkle_link(&leaves, 2).unwrap();
        assert_eq!(link.branch[0], leaves[2]);
        assert_eq!(link.branch[1], pair(&leaves[0], &leaves[1]));
        assert_eq!(link.index, 2);
    }

    #[test]
    fn test_link_index_out_of_range() {
        assert!(matches!(
            calculate_merkle_link(&[leaf(1)], 1),
            Err(DataError::InvalidProof(_))
        ));
        assert!(calculate_merkle_link(&[], 0).is_err());
    }

    #[test]
    fn test_check_rejects_large_index() {
        let link = MerkleLink {
            branch: vec![leaf(1), leaf(2)],
            index: 4,
        };
        assert!(matches!(
            check_merkle_link(leaf(0), &link),
            Err(DataError::InvalidProof(_))
        ));

        let empty = MerkleLink::default();
        assert_eq!(check_merkle_link(leaf(7), &empty).unwrap(), leaf(7));
    }

    #[test]
    fn test_merkle_link_wire_format() {
        let link = MerkleLink {
            branch: vec![leaf(0xaa)],
            index: 1,
        };
        let bytes = link.encode().unwrap();
        assert_eq!(bytes.len(), 1 + 32 + 4);
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[33..], &[1, 0, 0, 0]);
        assert_eq!(MerkleLink::decode(&bytes).unwrap(), link);
    }

    #[test]
    fn test_witness_commitment_hash() {
        let root = Hash256::ZERO;
        let reserved = Hash256::ZERO;
        assert_eq!(
            witness_commitment_hash(&root, &reserved),
            Hash256::from_le_bytes(double_sha256(&[0u8; 64]))
        );
    }
}
