//! Transaction records, their wire codec and identifiers.
//!
//! Read layout: version (u16) ‖ marker (varint) ‖ lock_time (u32) ‖ body,
//! where the body depends on the marker:
//! - marker == 0: flag (u8) ‖ inputs ‖ outputs ‖ one witness stack per input
//! - marker != 0: the marker is the input count; that many inputs with no
//!   length prefix ‖ outputs
//!
//! Write layouts:
//! - segwit: version (u16) ‖ 0x00 ‖ flag ‖ inputs ‖ outputs ‖ stacks ‖ lock_time
//! - otherwise the identity layout: version (u32) ‖ inputs ‖ outputs ‖ lock_time
//!
//! The read and write layouts differ in version width and lock_time
//! position. Both are the network's wire contract and are kept as is.

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::hash::{hash256, Hash256};
use crate::pack::{
    read_items, read_list, read_list_with, read_possibly_none, read_u16, read_u32, read_u64,
    read_u8, read_varint, read_varstr, read_varstr_list, write_list, write_possibly_none,
    write_varstr, write_varstr_list, Decode, Encode,
};

/// Sequence value that stands for "no sequence".
pub const SEQUENCE_NONE: u32 = u32::MAX;

/// Reference to an output of an earlier transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Hash256,
    pub index: u32,
}

impl OutPoint {
    /// Wire sentinel for "no previous output" (coinbase inputs).
    pub const NONE: OutPoint = OutPoint {
        hash: Hash256::ZERO,
        index: u32::MAX,
    };
}

impl Encode for OutPoint {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        self.hash.encode_to(out)?;
        out.put_u32_le(self.index);
        Ok(())
    }
}

impl Decode for OutPoint {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        Ok(OutPoint {
            hash: Hash256::decode_from(buf)?,
            index: read_u32(buf)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub previous_output: Option<OutPoint>,
    pub script: Vec<u8>,
    pub sequence: Option<u32>,
}

impl TxIn {
    /// A coinbase input: no previous output, default sequence.
    pub fn coinbase(script: Vec<u8>) -> Self {
        TxIn {
            previous_output: None,
            script,
            sequence: None,
        }
    }
}

impl Encode for TxIn {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        write_possibly_none(out, &self.previous_output, &OutPoint::NONE)?;
        write_varstr(out, &self.script);
        write_possibly_none(out, &self.sequence, &SEQUENCE_NONE)
    }
}

impl Decode for TxIn {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        Ok(TxIn {
            previous_output: read_possibly_none(buf, &OutPoint::NONE)?,
            script: read_varstr(buf)?,
            sequence: read_possibly_none(buf, &SEQUENCE_NONE)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: u64,
    pub script: Vec<u8>,
}

impl Encode for TxOut {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u64_le(self.value);
        write_varstr(out, &self.script);
        Ok(())
    }
}

impl Decode for TxOut {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        Ok(TxOut {
            value: read_u64(buf)?,
            script: read_varstr(buf)?,
        })
    }
}

/// Witness part of a marker == 0 transaction. The marker itself is always 0.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WitnessData {
    pub flag: u8,
    /// One stack per input.
    pub stacks: Vec<Vec<Vec<u8>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub tx_ins: Vec<TxIn>,
    pub tx_outs: Vec<TxOut>,
    pub lock_time: u32,
    pub witness: Option<WitnessData>,
}

/// Body of a transaction as selected by the marker read after the version.
enum TxBody {
    /// marker == 0
    MarkerZero {
        flag: u8,
        tx_ins: Vec<TxIn>,
        tx_outs: Vec<TxOut>,
        stacks: Vec<Vec<Vec<u8>>>,
    },
    /// marker != 0, where the marker counted the inputs
    MarkerNonZero {
        tx_ins: Vec<TxIn>,
        tx_outs: Vec<TxOut>,
    },
}

impl TxBody {
    fn read(buf: &mut &[u8], marker: u64) -> Result<Self> {
        if marker == 0 {
            let flag = read_u8(buf)?;
            let tx_ins: Vec<TxIn> = read_list(buf)?;
            let tx_outs = read_list(buf)?;
            let stacks = read_items(buf, tx_ins.len(), read_varstr_list)?;
            Ok(TxBody::MarkerZero {
                flag,
                tx_ins,
                tx_outs,
                stacks,
            })
        } else {
            let count = usize::try_from(marker).map_err(|_| {
                DataError::Encoding(format!("input count {} does not fit in memory", marker))
            })?;
            let tx_ins = read_items(buf, count, TxIn::decode_from)?;
            let tx_outs = read_list(buf)?;
            Ok(TxBody::MarkerNonZero { tx_ins, tx_outs })
        }
    }

    fn into_transaction(self, version: u32, lock_time: u32) -> Transaction {
        match self {
            TxBody::MarkerZero {
                flag,
                tx_ins,
                tx_outs,
                stacks,
            } => {
                // A zero flag with no stack items carries nothing beyond the identity fields.
                let witness = if flag == 0 && stacks.iter().all(Vec::is_empty) {
                    None
                } else {
                    Some(WitnessData { flag, stacks })
                };
                Transaction {
                    version,
                    tx_ins,
                    tx_outs,
                    lock_time,
                    witness,
                }
            }
            TxBody::MarkerNonZero { tx_ins, tx_outs } => Transaction {
                version,
                tx_ins,
                tx_outs,
                lock_time,
                witness: None,
            },
        }
    }
}

/// True when the record carries a zero marker and a flag of at least 1.
pub fn is_segwit_tx(tx: &Transaction) -> bool {
    tx.witness.as_ref().is_some_and(|w| w.flag >= 1)
}

/// Hash of the identity layout. Witness data never affects it.
pub fn get_txid(tx: &Transaction) -> Result<Hash256> {
    Ok(hash256(&tx.encode_identity()?))
}

/// Hash of the full encoding when any witness stack has items, otherwise
/// the txid. Precomputed values are returned instead of hashing again.
pub fn get_wtxid(
    tx: &Transaction,
    txid: Option<Hash256>,
    wtxid: Option<Hash256>,
) -> Result<Hash256> {
    let mut has_witness = false;
    if let Some(witness) = tx.witness.as_ref().filter(|w| w.flag >= 1) {
        check_stack_count(tx, witness)?;
        has_witness = witness.stacks.iter().any(|stack| !stack.is_empty());
    }

    if has_witness {
        match wtxid {
            Some(hash) => Ok(hash),
            None => Ok(hash256(&tx.encode()?)),
        }
    } else {
        match txid {
            Some(hash) => Ok(hash),
            None => get_txid(tx),
        }
    }
}

fn check_stack_count(tx: &Transaction, witness: &WitnessData) -> Result<()> {
    if witness.stacks.len() != tx.tx_ins.len() {
        return Err(DataError::Encoding(format!(
            "{} witness stacks for {} inputs",
            witness.stacks.len(),
            tx.tx_ins.len()
        )));
    }
    Ok(())
}

impl Transaction {
    pub fn is_segwit(&self) -> bool {
        is_segwit_tx(self)
    }

    /// A transaction whose only input spends no previous output.
    pub fn is_coinbase(&self) -> bool {
        self.tx_ins.len() == 1 && self.tx_ins[0].previous_output.is_none()
    }

    pub fn txid(&self) -> Result<Hash256> {
        get_txid(self)
    }

    pub fn wtxid(&self) -> Result<Hash256> {
        get_wtxid(self, None, None)
    }

    /// Write the witness-free layout used for txids, stripped blocks and
    /// merkle transactions.
    pub fn encode_identity_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u32_le(self.version);
        write_list(out, &self.tx_ins)?;
        write_list(out, &self.tx_outs)?;
        out.put_u32_le(self.lock_time);
        Ok(())
    }

    pub fn encode_identity(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_identity_to(&mut out)?;
        Ok(out)
    }

    pub fn read_identity(buf: &mut &[u8]) -> Result<Self> {
        Ok(Transaction {
            version: read_u32(buf)?,
            tx_ins: read_list(buf)?,
            tx_outs: read_list(buf)?,
            lock_time: read_u32(buf)?,
            witness: None,
        })
    }

    /// Decode an identity-layout transaction spanning all of `data`.
    pub fn decode_identity(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        let tx = Transaction::read_identity(&mut buf)?;
        if !buf.is_empty() {
            return Err(DataError::Encoding(format!(
                "{} bytes of extra data after transaction",
                buf.len()
            )));
        }
        Ok(tx)
    }

    fn encode_segwit_to(&self, witness: &WitnessData, out: &mut Vec<u8>) -> Result<()> {
        check_stack_count(self, witness)?;
        let version = u16::try_from(self.version).map_err(|_| {
            DataError::Encoding(format!(
                "version {} does not fit the 16-bit segwit field",
                self.version
            ))
        })?;

        out.put_u16_le(version);
        out.put_u8(0); // marker
        out.put_u8(witness.flag);
        write_list(out, &self.tx_ins)?;
        write_list(out, &self.tx_outs)?;
        for stack in &witness.stacks {
            write_varstr_list(out, stack);
        }
        out.put_u32_le(self.lock_time);
        Ok(())
    }
}

impl Encode for Transaction {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        match &self.witness {
            Some(witness) if witness.flag >= 1 => self.encode_segwit_to(witness, out),
            _ => self.encode_identity_to(out),
        }
    }
}

impl Decode for Transaction {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        let version = read_u16(buf)? as u32;
        let marker = read_varint(buf)?;
        let lock_time = read_u32(buf)?;
        Ok(TxBody::read(buf, marker)?.into_transaction(version, lock_time))
    }
}

/// Read a length-prefixed list of transactions in the identity layout.
pub fn read_identity_list(buf: &mut &[u8]) -> Result<Vec<Transaction>> {
    read_list_with(buf, Transaction::read_identity)
}

/// Write a length-prefixed list of transactions in the identity layout.
pub fn write_identity_list(out: &mut Vec<u8>, txs: &[Transaction]) -> Result<()> {
    crate::pack::write_varint(out, txs.len() as u64);
    for tx in txs {
        tx.encode_identity_to(out)?;
    }
    Ok(())
}
