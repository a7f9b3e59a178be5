//! A minimal transaction model: just enough shape for token validation to
//! walk inputs and outputs.

use crate::store::BlockHash;

/// Reference to a transaction output.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct OutPoint {
    pub txid: BlockHash,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: BlockHash, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl std::fmt::Display for OutPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", hex::encode(self.txid), self.vout)
    }
}

/// A transaction output: a value in base currency units and the raw script.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TxOut {
    pub value: i64,
    pub script: Vec<u8>,
}

/// An unspent output as seen by input validation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Coin {
    pub out: TxOut,
    pub height: i32,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Transaction {
    pub txid: BlockHash,
    pub inputs: Vec<OutPoint>,
    pub outputs: Vec<TxOut>,
}

impl Transaction {
    /// Coinbase transactions spend nothing.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }
}
