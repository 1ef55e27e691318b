//! Block headers, blocks and merged-mining (aux-pow) records.

use std::collections::BTreeMap;

use bytes::BufMut;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::difficulty::CompactTarget;
use crate::error::{DataError, Result};
use crate::hash::{hash256, Hash256};
use crate::merkle::{check_merkle_link, merkle_hash, MerkleLink};
use crate::pack::{
    read_bytes, read_list, read_possibly_none, read_u32, write_list, write_possibly_none, Decode,
    Encode,
};
use crate::transaction::{read_identity_list, write_identity_list, Transaction};

/// Serialized size of a block header.
pub const HEADER_SIZE: usize = 80;

/// A block header (80 bytes on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    /// `None` for a genesis block; written as zero.
    pub previous_block: Option<Hash256>,
    pub merkle_root: Hash256,
    /// Block timestamp (Unix time).
    pub timestamp: u32,
    pub bits: CompactTarget,
    pub nonce: u32,
}

impl BlockHeader {
    /// Double SHA256 of the serialized header.
    pub fn hash(&self) -> Result<Hash256> {
        Ok(hash256(&self.encode()?))
    }

    /// Proof-of-work hash with a chain specific function.
    pub fn pow_hash<F>(&self, pow_func: F) -> Result<Hash256>
    where
        F: Fn(&[u8]) -> Hash256,
    {
        Ok(pow_func(&self.encode()?))
    }

    pub fn target(&self) -> &BigUint {
        self.bits.target()
    }
}

impl Encode for BlockHeader {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u32_le(self.version);
        write_possibly_none(out, &self.previous_block, &Hash256::ZERO)?;
        self.merkle_root.encode_to(out)?;
        out.put_u32_le(self.timestamp);
        self.bits.encode_to(out)?;
        out.put_u32_le(self.nonce);
        Ok(())
    }
}

impl Decode for BlockHeader {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        Ok(BlockHeader {
            version: read_u32(buf)?,
            previous_block: read_possibly_none(buf, &Hash256::ZERO)?,
            merkle_root: Hash256::decode_from(buf)?,
            timestamp: read_u32(buf)?,
            bits: CompactTarget::decode_from(buf)?,
            nonce: read_u32(buf)?,
        })
    }
}

/// A block with its transactions in the full wire layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub txs: Vec<Transaction>,
}

impl Block {
    /// Transaction ids in block order.
    pub fn txids(&self) -> Result<Vec<Hash256>> {
        self.txs.iter().map(Transaction::txid).collect()
    }

    pub fn compute_merkle_root(&self) -> Result<Hash256> {
        Ok(merkle_hash(&self.txids()?))
    }

    pub fn has_valid_merkle_root(&self) -> Result<bool> {
        Ok(self.compute_merkle_root()? == self.header.merkle_root)
    }

    /// Drop all witness data.
    pub fn strip(&self) -> StrippedBlock {
        StrippedBlock {
            header: self.header.clone(),
            txs: self
                .txs
                .iter()
                .map(|tx| Transaction {
                    witness: None,
                    ..tx.clone()
                })
                .collect(),
        }
    }
}

impl Encode for Block {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        self.header.encode_to(out)?;
        write_list(out, &self.txs)
    }
}

impl Decode for Block {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        Ok(Block {
            header: BlockHeader::decode_from(buf)?,
            txs: read_list(buf)?,
        })
    }
}

/// A block whose transactions always use the identity (witness-free) layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrippedBlock {
    pub header: BlockHeader,
    pub txs: Vec<Transaction>,
}

impl Encode for StrippedBlock {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        self.header.encode_to(out)?;
        write_identity_list(out, &self.txs)
    }
}

impl Decode for StrippedBlock {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        Ok(StrippedBlock {
            header: BlockHeader::decode_from(buf)?,
            txs: read_identity_list(buf)?,
        })
    }
}

/// A transaction together with the proof that it sits in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleTx {
    /// Encoded in the identity layout.
    pub tx: Transaction,
    pub block_hash: Hash256,
    pub merkle_link: MerkleLink,
}

impl Encode for MerkleTx {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        self.tx.encode_identity_to(out)?;
        self.block_hash.encode_to(out)?;
        self.merkle_link.encode_to(out)
    }
}

impl Decode for MerkleTx {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        Ok(MerkleTx {
            tx: Transaction::read_identity(buf)?,
            block_hash: Hash256::decode_from(buf)?,
            merkle_link: MerkleLink::decode_from(buf)?,
        })
    }
}

/// Merged-mining proof: the parent chain's coinbase, its position in the
/// parent block, and the position of this chain in the aux merkle tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxPow {
    pub merkle_tx: MerkleTx,
    pub merkle_link: MerkleLink,
    pub parent_block_header: BlockHeader,
}

impl AuxPow {
    /// Whether the embedded coinbase and its link reproduce the parent
    /// header's merkle root.
    pub fn check_parent_merkle_root(&self) -> Result<bool> {
        let txid = self.merkle_tx.tx.txid()?;
        let root = check_merkle_link(txid, &self.merkle_tx.merkle_link)?;
        Ok(root == self.parent_block_header.merkle_root)
    }

    /// Root of the aux chain tree for a block hash of this chain.
    pub fn aux_merkle_root(&self, block_hash: Hash256) -> Result<Hash256> {
        check_merkle_link(block_hash, &self.merkle_link)
    }
}

impl Encode for AuxPow {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        self.merkle_tx.encode_to(out)?;
        self.merkle_link.encode_to(out)?;
        self.parent_block_header.encode_to(out)
    }
}

impl Decode for AuxPow {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        Ok(AuxPow {
            merkle_tx: MerkleTx::decode_from(buf)?,
            merkle_link: MerkleLink::decode_from(buf)?,
            parent_block_header: BlockHeader::decode_from(buf)?,
        })
    }
}

/// Aux merkle commitment placed in the parent coinbase script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxPowCoinbase {
    /// Written most significant byte first.
    pub merkle_root: Hash256,
    pub size: u32,
    pub nonce: u32,
}

impl Encode for AuxPowCoinbase {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_slice(&self.merkle_root.to_be_bytes());
        out.put_u32_le(self.size);
        out.put_u32_le(self.nonce);
        Ok(())
    }
}

impl Decode for AuxPowCoinbase {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        Ok(AuxPowCoinbase {
            merkle_root: Hash256::from_be_bytes(read_bytes(buf)?),
            size: read_u32(buf)?,
            nonce: read_u32(buf)?,
        })
    }
}

const AUXPOW_MULTIPLIER: u128 = 1_103_515_245;
const AUXPOW_INCREMENT: u128 = 12_345;

fn auxpow_slot(chain_id: u32, size: u32) -> u32 {
    let value = AUXPOW_MULTIPLIER * chain_id as u128
        + AUXPOW_MULTIPLIER * AUXPOW_INCREMENT
        + AUXPOW_INCREMENT;
    // size is at most 2^30
    (value % size as u128) as u32
}

/// Place chain ids in the smallest power-of-two aux merkle tree with no slot
/// collisions. Returns the slot → chain id map and the tree size.
pub fn make_auxpow_tree(chain_ids: &[u32]) -> Result<(BTreeMap<u32, u32>, u32)> {
    'sizes: for size in (0..31).map(|i| 1u32 << i) {
        if (size as usize) < chain_ids.len() {
            continue;
        }

        let mut slots = BTreeMap::new();
        for &chain_id in chain_ids {
            let slot = auxpow_slot(chain_id, size);
            if slots.insert(slot, chain_id).is_some() {
                continue 'sizes;
            }
        }

        debug!(size, chains = chain_ids.len(), "aux-pow tree sized");
        return Ok((slots, size));
    }

    Err(DataError::Domain(format!(
        "no aux-pow tree size up to 2^30 fits {} chain ids without collisions",
        chain_ids.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::calculate_merkle_link;
    use crate::transaction::{OutPoint, TxIn, TxOut, WitnessData};

    fn genesis_header() -> BlockHeader {
        BlockHeader {
            version: 1,
            previous_block: None,
            merkle_root: "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
                .parse()
                .unwrap(),
            timestamp: 1231006505,
            bits: CompactTarget::new(0x1d00ffff),
            nonce: 2083236893,
        }
    }

    fn coinbase_tx(tag: u8) -> Transaction {
        Transaction {
            version: 1,
            tx_ins: vec![TxIn::coinbase(vec![0x01, tag])],
            tx_outs: vec![TxOut {
                value: 50_0000_0000,
                script: vec![0x51],
            }],
            lock_time: 0,
            witness: None,
        }
    }

    fn spend_tx() -> Transaction {
        Transaction {
            version: 2,
            tx_ins: vec![TxIn {
                previous_output: Some(OutPoint {
                    hash: Hash256::from_le_bytes([0x07; 32]),
                    index: 0,
                }),
                script: vec![],
                sequence: None,
            }],
            tx_outs: vec![TxOut {
                value: 1_000,
                script: vec![0x00, 0x14],
            }],
            lock_time: 0,
            witness: Some(WitnessData {
                flag: 1,
                stacks: vec![vec![vec![0x30; 71], vec![0x02; 33]]],
            }),
        }
    }

    #[test]
    fn test_block_header_serialization() {
        let header = genesis_header();
        let serialized = header.encode().unwrap();

        assert_eq!(serialized.len(), HEADER_SIZE);
        assert_eq!(&serialized[0..4], &[0x01, 0x00, 0x00, 0x00]);
        // Missing previous block is written as zero
        assert_eq!(&serialized[4..36], &[0u8; 32]);
        assert_eq!(&serialized[36..68], header.merkle_root.as_bytes());
        assert_eq!(&serialized[72..76], &[0xff, 0xff, 0x00, 0x1d]);

        assert_eq!(BlockHeader::decode(&serialized).unwrap(), header);
    }

    #[test]
    fn test_genesis_header_hash() {
        let hash = genesis_header().hash().unwrap();
        assert_eq!(
            hash.to_string(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
        assert!(hash.to_biguint() <= *genesis_header().target());
    }

    #[test]
    fn test_pow_hash_uses_supplied_function() {
        let header = genesis_header();
        let pow = header.pow_hash(|data| {
            assert_eq!(data.len(), HEADER_SIZE);
            Hash256::ZERO
        });
        assert_eq!(pow.unwrap(), Hash256::ZERO);
        assert_eq!(header.pow_hash(hash256).unwrap(), header.hash().unwrap());
    }

    #[test]
    fn test_previous_block_sentinel() {
        let mut header = genesis_header();
        header.previous_block = Some(Hash256::ZERO);
        assert!(matches!(header.encode(), Err(DataError::Encoding(_))));

        header.previous_block = Some(Hash256::from_le_bytes([0x12; 32]));
        let bytes = header.encode().unwrap();
        assert_eq!(&bytes[4..36], &[0x12; 32]);
        assert_eq!(BlockHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_header_truncated() {
        let bytes = genesis_header().encode().unwrap();
        assert!(BlockHeader::decode(&bytes[..79]).is_err());
    }

    #[test]
    fn test_block_merkle_root() {
        let mut block = Block {
            header: genesis_header(),
            txs: vec![coinbase_tx(1), spend_tx()],
        };
        let txids = block.txids().unwrap();
        block.header.merkle_root = merkle_hash(&txids);
        assert!(block.has_valid_merkle_root().unwrap());

        block.txs.swap(0, 1);
        assert!(!block.has_valid_merkle_root().unwrap());
    }

    #[test]
    fn test_stripped_block_roundtrip() {
        let block = Block {
            header: genesis_header(),
            txs: vec![coinbase_tx(1), spend_tx()],
        };
        let stripped = block.strip();
        assert!(stripped.txs.iter().all(|tx| tx.witness.is_none()));
        assert_eq!(
            block.compute_merkle_root().unwrap(),
            merkle_hash(&[stripped.txs[0].txid().unwrap(), stripped.txs[1].txid().unwrap()])
        );

        let bytes = stripped.encode().unwrap();
        assert_eq!(StrippedBlock::decode(&bytes).unwrap(), stripped);
    }

    #[test]
    fn test_block_encodes_full_transactions() {
        let block = Block {
            header: genesis_header(),
            txs: vec![spend_tx()],
        };
        let bytes = block.encode().unwrap();
        let mut expected = genesis_header().encode().unwrap();
        expected.push(1);
        expected.extend(spend_tx().encode().unwrap());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_auxpow_roundtrip_and_parent_root() {
        let parent_coinbase = coinbase_tx(9);
        let leaves = vec![
            parent_coinbase.txid().unwrap(),
            Hash256::from_le_bytes([0x55; 32]),
            Hash256::from_le_bytes([0x66; 32]),
        ];
        let mut parent_header = genesis_header();
        parent_header.merkle_root = merkle_hash(&leaves);

        let aux_pow = AuxPow {
            merkle_tx: MerkleTx {
                tx: parent_coinbase,
                block_hash: parent_header.hash().unwrap(),
                merkle_link: calculate_merkle_link(&leaves, 0).unwrap(),
            },
            merkle_link: MerkleLink::default(),
            parent_block_header: parent_header,
        };
        assert!(aux_pow.check_parent_merkle_root().unwrap());

        let own_hash = Hash256::from_le_bytes([0x77; 32]);
        assert_eq!(aux_pow.aux_merkle_root(own_hash).unwrap(), own_hash);

        let bytes = aux_pow.encode().unwrap();
        assert_eq!(AuxPow::decode(&bytes).unwrap(), aux_pow);

        let mut tampered = aux_pow.clone();
        tampered.merkle_tx.tx.lock_time = 1;
        assert!(!tampered.check_parent_merkle_root().unwrap());
    }

    #[test]
    fn test_auxpow_coinbase_big_endian_root() {
        let mut root = [0u8; 32];
        root[0] = 0xab; // most significant byte
        let record = AuxPowCoinbase {
            merkle_root: Hash256::from_be_bytes(root),
            size: 4,
            nonce: 0,
        };
        let bytes = record.encode().unwrap();
        assert_eq!(bytes.len(), 40);
        assert_eq!(bytes[0], 0xab);
        assert_eq!(&bytes[32..36], &[4, 0, 0, 0]);
        assert_eq!(AuxPowCoinbase::decode(&bytes).unwrap(), record);
    }

    #[test]
    fn test_make_auxpow_tree_small() {
        let (slots, size) = make_auxpow_tree(&[]).unwrap();
        assert_eq!(size, 1);
        assert!(slots.is_empty());

        let (slots, size) = make_auxpow_tree(&[1]).unwrap();
        assert_eq!(size, 1);
        assert_eq!(slots, BTreeMap::from([(0, 1)]));

        // Odd multiplier and even offset: slot parity follows the id.
        let (slots, size) = make_auxpow_tree(&[1, 2]).unwrap();
        assert_eq!(size, 2);
        assert_eq!(slots, BTreeMap::from([(0, 2), (1, 1)]));
    }

    #[test]
    fn test_make_auxpow_tree_places_every_chain() {
        let ids = [1u32, 2, 3, 7, 98, 0x1_0000, u32::MAX];
        let (slots, size) = make_auxpow_tree(&ids).unwrap();
        assert!(size.is_power_of_two());
        assert!(size as usize >= ids.len());
        assert_eq!(slots.len(), ids.len());
        for (&slot, &id) in &slots {
            assert!(slot < size);
            assert_eq!(auxpow_slot(id, size), slot);
        }
    }

    #[test]
    fn test_make_auxpow_tree_duplicate_ids() {
        assert!(matches!(
            make_auxpow_tree(&[5, 5]),
            Err(DataError::Domain(_))
        ));
    }
}
