use crate::core::{ProofOfWork, Transaction};
use crate::error::Result;
use crate::utils::{deserialize, serialize, sha256_digest};
use data_encoding::HEXLOWER;
use log::info;

#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Block {
    hash: Vec<u8>,
    transactions: Vec<Transaction>,
    prev_hash: Vec<u8>,
    nonce: i64,
    difficulty: u32, // Difficulty the nonce was searched under
}

impl Block {
    /// Seal a block over `transactions`; blocks the calling thread until the
    /// proof-of-work search finds a nonce.
    pub fn new_block(
        transactions: &[Transaction],
        prev_hash: &[u8],
        pow: &ProofOfWork,
    ) -> Result<Block> {
        let mut block = Block {
            hash: vec![],
            transactions: transactions.to_vec(),
            prev_hash: prev_hash.to_vec(),
            nonce: 0,
            difficulty: 0,
        };

        info!(
            "Starting proof-of-work for block with {} transaction(s)",
            block.transactions.len()
        );
        let (nonce, hash, difficulty) = pow.run(&block)?;
        block.nonce = nonce;
        block.hash = hash;
        block.difficulty = difficulty;
        info!(
            "Proof-of-work completed for block: {} (difficulty: {difficulty})",
            HEXLOWER.encode(&block.hash)
        );

        Ok(block)
    }

    pub fn generate_genesis_block(transaction: &Transaction, pow: &ProofOfWork) -> Result<Block> {
        Block::new_block(&[transaction.clone()], &[], pow)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_prev_hash(&self) -> &[u8] {
        self.prev_hash.as_slice()
    }

    pub fn get_hash(&self) -> &[u8] {
        self.hash.as_slice()
    }

    pub fn get_nonce(&self) -> i64 {
        self.nonce
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_empty()
    }

    /// SHA-256 over the concatenated transaction ids, in block order.
    pub fn hash_transactions(&self) -> Vec<u8> {
        let mut txhashs = vec![];
        for transaction in &self.transactions {
            txhashs.extend(transaction.get_id());
        }

        sha256_digest(txhashs.as_slice())
    }

    #[cfg(test)]
    pub(crate) fn with_nonce(&self, nonce: i64) -> Block {
        Block {
            nonce,
            ..self.clone()
        }
    }
}
