// Value transfers in the unspent-output model: every transaction consumes
// earlier outputs through its inputs and creates new outputs. Ownership is a
// plain string match; the input's unlock token stands in for a signature.

use crate::error::{LedgerError, Result};
use crate::storage::UTXOSet;
use crate::utils::{deserialize, serialize, sha256_digest};
use data_encoding::HEXLOWER;
use log::debug;

/// Block reward minted by every coinbase transaction
pub const SUBSIDY: u64 = 50;

const COINBASE_OUTPUT_INDEX: i64 = -1;

/// Reference to an output of an earlier transaction
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct TXInput {
    txid: Vec<u8>,
    vout: i64,
    unlock_token: String,
}

impl TXInput {
    pub fn new(txid: &[u8], vout: i64, unlock_token: &str) -> TXInput {
        TXInput {
            txid: txid.to_vec(),
            vout,
            unlock_token: unlock_token.to_string(),
        }
    }

    pub fn get_txid(&self) -> &[u8] {
        self.txid.as_slice()
    }

    pub fn get_vout(&self) -> i64 {
        self.vout
    }

    pub fn get_unlock_token(&self) -> &str {
        self.unlock_token.as_str()
    }

    pub fn can_unlock_output_with(&self, data: &str) -> bool {
        self.unlock_token == data
    }
}

#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct TXOutput {
    value: u64,
    unlock_key: String,
}

impl TXOutput {
    pub fn new(value: u64, unlock_key: &str) -> TXOutput {
        TXOutput {
            value,
            unlock_key: unlock_key.to_string(),
        }
    }

    pub fn get_value(&self) -> u64 {
        self.value
    }

    pub fn get_unlock_key(&self) -> &str {
        self.unlock_key.as_str()
    }

    pub fn is_locked_with_key(&self, unlock_key: &str) -> bool {
        self.unlock_key == unlock_key
    }
}

/// A transfer of value. The id is fixed at construction and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Transaction {
    id: Vec<u8>,
    vin: Vec<TXInput>,
    vout: Vec<TXOutput>,
}

impl Transaction {
    /// Build a transaction from its parts and seal its id.
    pub fn new(vin: Vec<TXInput>, vout: Vec<TXOutput>) -> Result<Transaction> {
        let mut tx = Transaction {
            id: vec![],
            vin,
            vout,
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    /// Reward transaction paying [`SUBSIDY`] to `to`. An empty `data` defaults
    /// to `"Coins to <to>"`; callers minting more than one reward for the same
    /// address must pass distinct data or the ids collide.
    pub fn new_coinbase_tx(to: &str, data: &str) -> Result<Transaction> {
        let data = if data.is_empty() {
            format!("Coins to {to}")
        } else {
            data.to_string()
        };

        let tx_input = TXInput::new(&[], COINBASE_OUTPUT_INDEX, &data);
        let txout = TXOutput::new(SUBSIDY, to);
        Transaction::new(vec![tx_input], vec![txout])
    }

    /// Pay `amount` from `from` to `to`, spending a first-fit selection of
    /// `from`'s unspent outputs and returning any excess as change.
    pub fn new_utxo_transaction(
        from: &str,
        to: &str,
        amount: u64,
        utxo_set: &UTXOSet,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(LedgerError::Transaction(
                "Amount must be positive".to_string(),
            ));
        }

        let (accumulated, valid_outputs) = utxo_set.find_spendable_outputs(from, amount)?;
        if accumulated < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let mut inputs = vec![];
        for (txid_hex, outs) in valid_outputs {
            let txid = HEXLOWER.decode(txid_hex.as_bytes()).map_err(|e| {
                LedgerError::Serialization(format!("Invalid transaction ID {txid_hex}: {e}"))
            })?;
            for out in outs {
                inputs.push(TXInput::new(&txid, out, from));
            }
        }

        let mut outputs = vec![TXOutput::new(amount, to)];
        if accumulated > amount {
            outputs.push(TXOutput::new(accumulated - amount, from));
        }

        let tx = Transaction::new(inputs, outputs)?;
        debug!(
            "Built transaction {} spending {} input(s) for {amount}",
            HEXLOWER.encode(tx.get_id()),
            tx.vin.len()
        );
        Ok(tx)
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1
            && self.vin[0].txid.is_empty()
            && self.vin[0].vout == COINBASE_OUTPUT_INDEX
    }

    /// SHA-256 of the encoding of this transaction with its id cleared.
    pub fn hash(&self) -> Result<Vec<u8>> {
        let tx_copy = Transaction {
            id: vec![],
            vin: self.vin.clone(),
            vout: self.vout.clone(),
        };
        Ok(sha256_digest(tx_copy.serialize()?.as_slice()))
    }

    pub fn get_id(&self) -> &[u8] {
        self.id.as_slice()
    }

    pub fn get_vin(&self) -> &[TXInput] {
        self.vin.as_slice()
    }

    pub fn get_vout(&self) -> &[TXOutput] {
        self.vout.as_slice()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        deserialize(bytes)
    }
}

pub fn serialize_transactions(txs: &[Transaction]) -> Result<Vec<u8>> {
    serialize(&txs.to_vec())
}

pub fn deserialize_transactions(bytes: &[u8]) -> Result<Vec<Transaction>> {
    deserialize(bytes)
}
