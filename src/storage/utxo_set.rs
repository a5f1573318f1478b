use crate::core::{Blockchain, TXOutput, Transaction};
use crate::error::Result;
use data_encoding::HEXLOWER;
use std::collections::HashMap;

/// Unspent outputs derived on demand by walking the whole chain; nothing is
/// indexed, so every query costs a full tip-to-genesis scan.
pub struct UTXOSet {
    blockchain: Blockchain,
}

struct UnspentTransaction {
    transaction: Transaction,
    outputs: Vec<usize>, // Unspent output indices locked to the queried address
}

impl UTXOSet {
    pub fn new(blockchain: Blockchain) -> UTXOSet {
        UTXOSet { blockchain }
    }

    pub fn get_blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    /// Transactions holding at least one unspent output for `address`, in
    /// walk order (newest block first).
    pub fn find_unspent_transactions(&self, address: &str) -> Result<Vec<Transaction>> {
        Ok(self
            .scan(address)?
            .into_iter()
            .map(|unspent| unspent.transaction)
            .collect())
    }

    pub fn find_utxo(&self, address: &str) -> Result<Vec<TXOutput>> {
        let mut utxos = vec![];
        for unspent in self.scan(address)? {
            for idx in unspent.outputs {
                utxos.push(unspent.transaction.get_vout()[idx].clone());
            }
        }
        Ok(utxos)
    }

    pub fn get_balance(&self, address: &str) -> Result<u64> {
        Ok(self.find_utxo(address)?.iter().map(TXOutput::get_value).sum())
    }

    /// First-fit selection: collect `address`'s outputs in walk order until
    /// their total reaches `amount`. Returns the total and, per hex txid, the
    /// chosen output indices. The total falls short when funds are lacking.
    pub fn find_spendable_outputs(
        &self,
        address: &str,
        amount: u64,
    ) -> Result<(u64, HashMap<String, Vec<i64>>)> {
        let mut unspent_outputs: HashMap<String, Vec<i64>> = HashMap::new();
        let mut accumulated = 0;

        'work: for unspent in self.scan(address)? {
            let txid_hex = HEXLOWER.encode(unspent.transaction.get_id());
            for idx in unspent.outputs {
                accumulated += unspent.transaction.get_vout()[idx].get_value();
                unspent_outputs
                    .entry(txid_hex.clone())
                    .or_default()
                    .push(idx as i64);

                if accumulated >= amount {
                    break 'work;
                }
            }
        }
        Ok((accumulated, unspent_outputs))
    }

    // Walking newest to oldest means every spend is seen before the output it
    // consumes. Within a block the transactions are visited in reverse for the
    // same reason, and a transaction's outputs are checked before its own
    // inputs are recorded.
    fn scan(&self, address: &str) -> Result<Vec<UnspentTransaction>> {
        let mut unspent_txs = vec![];
        let mut spent_txos: HashMap<String, Vec<i64>> = HashMap::new();

        for block in self.blockchain.iterator() {
            let block = block?;
            for tx in block.get_transactions().iter().rev() {
                let txid_hex = HEXLOWER.encode(tx.get_id());
                let spent = spent_txos.get(txid_hex.as_str());

                let outputs: Vec<usize> = tx
                    .get_vout()
                    .iter()
                    .enumerate()
                    .filter(|(idx, out)| {
                        out.is_locked_with_key(address)
                            && !spent.is_some_and(|s| s.contains(&(*idx as i64)))
                    })
                    .map(|(idx, _)| idx)
                    .collect();

                if !outputs.is_empty() {
                    unspent_txs.push(UnspentTransaction {
                        transaction: tx.clone(),
                        outputs,
                    });
                }

                if tx.is_coinbase() {
                    continue;
                }
                for txin in tx.get_vin() {
                    if txin.can_unlock_output_with(address) {
                        spent_txos
                            .entry(HEXLOWER.encode(txin.get_txid()))
                            .or_default()
                            .push(txin.get_vout());
                    }
                }
            }
        }
        Ok(unspent_txs)
    }
}
