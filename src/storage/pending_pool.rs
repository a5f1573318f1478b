use crate::core::{deserialize_transactions, serialize_transactions, Transaction};
use crate::error::{LedgerError, Result};
use data_encoding::HEXLOWER;
use log::{info, warn};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};
use sled::{Db, IVec};

pub(crate) const PENDING_KEY: &str = "pending";

/// Submitted but unmined transactions, persisted as one serialized sequence
/// under [`PENDING_KEY`]. Every read-modify-write runs inside a single sled
/// transaction, so concurrent submissions cannot overwrite each other.
#[derive(Clone)]
pub struct PendingPool {
    db: Db,
}

impl PendingPool {
    pub fn new(db: Db) -> PendingPool {
        PendingPool { db }
    }

    /// Append `tx` and return the resulting pool size. Rejects a transaction
    /// already in the pool or one spending an output a pending transaction
    /// already spends.
    pub fn add(&self, tx: &Transaction) -> Result<usize> {
        let size = self.db.transaction(|tx_db| {
            let mut pending = decode_pool(tx_db.get(PENDING_KEY)?.as_ref())
                .map_err(ConflictableTransactionError::Abort)?;

            if let Some(reason) = find_conflict(&pending, tx) {
                return Err(ConflictableTransactionError::Abort(
                    LedgerError::Transaction(reason),
                ));
            }

            pending.push(tx.clone());
            let serialized =
                serialize_transactions(&pending).map_err(ConflictableTransactionError::Abort)?;
            if serialized.is_empty() {
                warn!("Pending serialization produced empty output, nothing persisted");
                return Ok(pending.len() - 1);
            }
            tx_db.insert(PENDING_KEY, serialized)?;
            Ok(pending.len())
        })?;
        self.db.flush()?;

        info!(
            "Added transaction {} to pending pool, {size} pending",
            HEXLOWER.encode(tx.get_id())
        );
        Ok(size)
    }

    pub fn get(&self) -> Result<Vec<Transaction>> {
        let pending = decode_pool(self.db.get(PENDING_KEY)?.as_ref())?;
        if pending.is_empty() {
            info!("No pending transactions found");
        }
        Ok(pending)
    }

    pub fn clear(&self) -> Result<()> {
        self.db.remove(PENDING_KEY)?;
        self.db.flush()?;
        info!("Pending pool cleared");
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.get()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop the transactions with the given ids from the pool as part of an
    /// enclosing transaction; an emptied pool loses its key entirely.
    pub(crate) fn prune(
        tx_db: &TransactionalTree,
        included: &[Vec<u8>],
    ) -> ConflictableTransactionResult<(), LedgerError> {
        let pending = decode_pool(tx_db.get(PENDING_KEY)?.as_ref())
            .map_err(ConflictableTransactionError::Abort)?;
        if pending.is_empty() {
            return Ok(());
        }

        let remaining: Vec<Transaction> = pending
            .into_iter()
            .filter(|tx| !included.iter().any(|id| id.as_slice() == tx.get_id()))
            .collect();

        if remaining.is_empty() {
            tx_db.remove(PENDING_KEY)?;
        } else {
            let serialized =
                serialize_transactions(&remaining).map_err(ConflictableTransactionError::Abort)?;
            tx_db.insert(PENDING_KEY, serialized)?;
        }
        Ok(())
    }
}

fn decode_pool(bytes: Option<&IVec>) -> Result<Vec<Transaction>> {
    match bytes {
        Some(bytes) if !bytes.is_empty() => deserialize_transactions(bytes),
        _ => Ok(vec![]),
    }
}

fn find_conflict(pending: &[Transaction], tx: &Transaction) -> Option<String> {
    if pending.iter().any(|p| p.get_id() == tx.get_id()) {
        return Some(format!(
            "Transaction {} is already pending",
            HEXLOWER.encode(tx.get_id())
        ));
    }
    if tx.is_coinbase() {
        return None;
    }

    for input in tx.get_vin() {
        let spent_by_pending = pending
            .iter()
            .filter(|p| !p.is_coinbase())
            .flat_map(|p| p.get_vin())
            .any(|p| p.get_txid() == input.get_txid() && p.get_vout() == input.get_vout());
        if spent_by_pending {
            return Some(format!(
                "Output {}:{} is already spent by a pending transaction",
                HEXLOWER.encode(input.get_txid()),
                input.get_vout()
            ));
        }
    }
    None
}
