//! Data storage and persistence
//!
//! The durable pending-transaction pool and the unspent-output view that is
//! derived from the stored chain.

pub mod pending_pool;
pub mod utxo_set;

pub use pending_pool::PendingPool;
pub use utxo_set::UTXOSet;
