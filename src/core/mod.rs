//! Core ledger functionality
//!
//! Blocks, transactions, the persisted chain and proof-of-work mining.

pub mod block;
pub mod blockchain;
pub mod proof_of_work;
pub mod transaction;

pub use block::Block;
pub use blockchain::{Blockchain, BlockchainIterator};
pub use proof_of_work::ProofOfWork;
pub use transaction::{
    deserialize_transactions, serialize_transactions, TXInput, TXOutput, Transaction, SUBSIDY,
};
