//! # goblock-ledger
//!
//! A minimal proof-of-work ledger: hash-linked blocks of value transfers in
//! the unspent-output model, persisted in an embedded sled database, with a
//! durable pool of transactions waiting to be mined.
//!
//! ## Layout
//! - `core/`: blocks, transactions, proof-of-work and the persisted chain
//! - `storage/`: the pending pool and the derived unspent-output view
//! - `config/`: database location, difficulty and open-retry settings
//! - `utils/`: hashing and the bincode codec
//! - `cli/`: command-line argument definitions
//!
//! ## Flow
//! `Transaction::new_utxo_transaction` selects outputs through [`UTXOSet`],
//! the result goes into the [`PendingPool`], and [`Blockchain::mine`] seals
//! the pool into a block with [`ProofOfWork`], commits it and advances the
//! tip in a single storage transaction.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;

pub use cli::{Command, Opt};
pub use config::Config;
pub use core::{
    deserialize_transactions, serialize_transactions, Block, Blockchain, BlockchainIterator,
    ProofOfWork, TXInput, TXOutput, Transaction, SUBSIDY,
};
pub use error::{LedgerError, Result};
pub use storage::{PendingPool, UTXOSet};
pub use utils::{deserialize, serialize, sha256_digest};
