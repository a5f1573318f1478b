// The persisted chain. Blocks live in sled's default tree keyed by their raw
// hash, next to the "lh" tip pointer and the "pending" pool blob. A block is
// written once and never edited; extending the chain only moves "lh".

use crate::config::Config;
use crate::core::{Block, ProofOfWork, Transaction};
use crate::error::{LedgerError, Result};
use crate::storage::PendingPool;
use data_encoding::HEXLOWER;
use log::{info, warn};
use sled::transaction::ConflictableTransactionError;
use sled::Db;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;

const TIP_BLOCK_HASH_KEY: &str = "lh";
const SETTINGS_TREE: &str = "settings";
const DIFFICULTY_KEY: &str = "difficulty";
const GENESIS_DATA: &str = "First transaction from Genesis";

#[derive(Clone)]
pub struct Blockchain {
    tip_hash: Arc<RwLock<Vec<u8>>>, // Mirrors "lh" after every successful commit
    db: Db,
    db_path: PathBuf,
    pow: Arc<ProofOfWork>,
    pool: PendingPool,
    commit_lock: Arc<Mutex<()>>,
}

impl Blockchain {
    /// Create a new chain at `config.db_path` whose genesis block pays the
    /// block reward to `genesis_address`. Fails with `AlreadyExists` if the
    /// path already holds a chain.
    pub fn create_blockchain(genesis_address: &str, config: &Config) -> Result<Blockchain> {
        let path = config.db_path.clone();
        fs::create_dir_all(&path)?;
        let db = sled::open(&path)
            .map_err(|e| LedgerError::Database(format!("Failed to open database: {e}")))?;

        if db.get(TIP_BLOCK_HASH_KEY)?.is_some() {
            info!("Blockchain already exists at {}", path.display());
            return Err(LedgerError::AlreadyExists(path.display().to_string()));
        }

        let pow = Arc::new(ProofOfWork::new(config.difficulty)?);
        info!("Creating genesis block for address: {genesis_address}");
        let coinbase_tx = Transaction::new_coinbase_tx(genesis_address, GENESIS_DATA)?;
        let genesis = Block::generate_genesis_block(&coinbase_tx, &pow)?;
        let genesis_data = genesis.serialize()?;
        let display_path = path.display().to_string();

        db.transaction(|tx_db| {
            if tx_db.get(TIP_BLOCK_HASH_KEY)?.is_some() {
                return Err(ConflictableTransactionError::Abort(
                    LedgerError::AlreadyExists(display_path.clone()),
                ));
            }
            tx_db.insert(genesis.get_hash(), genesis_data.as_slice())?;
            tx_db.insert(TIP_BLOCK_HASH_KEY, genesis.get_hash())?;
            Ok(())
        })?;
        Self::store_difficulty(&db, config.difficulty)?;
        db.flush()?;

        info!("Genesis created: {}", HEXLOWER.encode(genesis.get_hash()));
        Ok(Blockchain::from_parts(db, path, genesis.get_hash().to_vec(), pow))
    }

    /// Open the chain at `config.db_path`, retrying a locked or unreadable
    /// store. An absent chain is reported as `ChainNotFound`.
    pub fn new_blockchain(config: &Config) -> Result<Blockchain> {
        let path = config.db_path.clone();
        if !path.exists() {
            return Err(LedgerError::ChainNotFound(format!(
                "{} does not exist, create one first",
                path.display()
            )));
        }

        let db = Self::open_with_retry(&path, config)?;
        let tip_hash = db
            .get(TIP_BLOCK_HASH_KEY)
            .map_err(|e| LedgerError::ChainNotFound(format!("Failed to read tip hash: {e}")))?
            .ok_or_else(|| {
                LedgerError::ChainNotFound(format!("{} holds no chain", path.display()))
            })?
            .to_vec();

        let difficulty = match Self::load_difficulty(&db)? {
            Some(difficulty) => difficulty,
            None => config.difficulty,
        };
        let pow = Arc::new(ProofOfWork::new(difficulty)?);

        Ok(Blockchain::from_parts(db, path, tip_hash, pow))
    }

    fn open_with_retry(path: &Path, config: &Config) -> Result<Db> {
        let attempts = config.open_retries;
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match sled::open(path) {
                Ok(db) => return Ok(db),
                Err(e) => {
                    warn!("Failed to open database (attempt {attempt}/{attempts}): {e}");
                    last_error = e.to_string();
                    if attempt < attempts {
                        thread::sleep(config.retry_backoff());
                    }
                }
            }
        }
        Err(LedgerError::ChainNotFound(format!(
            "Unable to open {} after {attempts} attempts: {last_error}",
            path.display()
        )))
    }

    fn from_parts(
        db: Db,
        db_path: PathBuf,
        tip_hash: Vec<u8>,
        pow: Arc<ProofOfWork>,
    ) -> Blockchain {
        Blockchain {
            tip_hash: Arc::new(RwLock::new(tip_hash)),
            pool: PendingPool::new(db.clone()),
            db,
            db_path,
            pow,
            commit_lock: Arc::new(Mutex::new(())),
        }
    }

    fn load_difficulty(db: &Db) -> Result<Option<u32>> {
        let settings = db.open_tree(SETTINGS_TREE)?;
        match settings.get(DIFFICULTY_KEY)? {
            Some(bytes) => {
                let raw: [u8; 4] = bytes.as_ref().try_into().map_err(|_| {
                    LedgerError::Serialization(format!(
                        "Stored difficulty has {} bytes, expected 4",
                        bytes.len()
                    ))
                })?;
                Ok(Some(u32::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    fn store_difficulty(db: &Db, difficulty: u32) -> Result<()> {
        let settings = db.open_tree(SETTINGS_TREE)?;
        settings.insert(DIFFICULTY_KEY, &difficulty.to_be_bytes()[..])?;
        Ok(())
    }

    pub fn get_db(&self) -> &Db {
        &self.db
    }

    pub fn get_db_path(&self) -> &PathBuf {
        &self.db_path
    }

    pub fn get_pow(&self) -> &ProofOfWork {
        &self.pow
    }

    pub fn get_pool(&self) -> &PendingPool {
        &self.pool
    }

    pub fn get_tip_hash(&self) -> Vec<u8> {
        self.tip_hash
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_tip_hash(&self, new_tip_hash: &[u8]) {
        let mut tip_hash = self
            .tip_hash
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *tip_hash = new_tip_hash.to_vec();
    }

    pub fn get_difficulty(&self) -> u32 {
        self.pow.get_difficulty()
    }

    /// Change the difficulty for blocks mined from now on and persist it with
    /// the chain.
    pub fn set_difficulty(&self, difficulty: u32) -> Result<()> {
        self.pow.set_difficulty(difficulty)?;
        Self::store_difficulty(&self.db, difficulty)?;
        self.db.flush()?;
        info!("Difficulty set to {difficulty}");
        Ok(())
    }

    /// Mine `transactions` into a new block on top of the current tip, or the
    /// pending pool's contents when `transactions` is empty.
    pub fn add_block(&self, transactions: &[Transaction]) -> Result<Block> {
        let _guard = self
            .commit_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let transactions = if transactions.is_empty() {
            self.pool.get()?
        } else {
            transactions.to_vec()
        };
        self.mine_and_commit(transactions)
    }

    /// Mine the pending pool into a new block. With a miner address, a
    /// coinbase reward to it leads the block.
    pub fn mine(&self, miner_address: Option<&str>) -> Result<Block> {
        let _guard = self
            .commit_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut transactions = vec![];
        if let Some(miner) = miner_address {
            let data = format!(
                "Reward to {miner} on {}",
                HEXLOWER.encode(&self.read_tip()?)
            );
            transactions.push(Transaction::new_coinbase_tx(miner, &data)?);
        }
        transactions.extend(self.pool.get()?);
        self.mine_and_commit(transactions)
    }

    fn read_tip(&self) -> Result<Vec<u8>> {
        Ok(self
            .db
            .get(TIP_BLOCK_HASH_KEY)?
            .ok_or_else(|| LedgerError::Database("Tip hash not found".to_string()))?
            .to_vec())
    }

    // Callers hold `commit_lock`. Mining runs outside any storage transaction;
    // the commit then refuses to land if "lh" moved in the meantime.
    fn mine_and_commit(&self, transactions: Vec<Transaction>) -> Result<Block> {
        Self::check_for_double_spending(&transactions)?;

        let tip = self.read_tip()?;
        let block = Block::new_block(&transactions, &tip, &self.pow)?;
        self.commit_block(&block, &tip)?;

        info!(
            "Successfully mined block: {} ({} transactions)",
            HEXLOWER.encode(block.get_hash()),
            block.get_transactions().len()
        );
        Ok(block)
    }

    // Persist the block, advance "lh" and prune the pool in one transaction
    fn commit_block(&self, block: &Block, expected_tip: &[u8]) -> Result<()> {
        let block_data = block.serialize()?;
        let included: Vec<Vec<u8>> = block
            .get_transactions()
            .iter()
            .map(|tx| tx.get_id().to_vec())
            .collect();

        self.db.transaction(|tx_db| {
            let current = tx_db.get(TIP_BLOCK_HASH_KEY)?;
            if current.as_deref() != Some(expected_tip) {
                return Err(ConflictableTransactionError::Abort(LedgerError::Conflict(
                    format!("Tip moved away from {}", HEXLOWER.encode(expected_tip)),
                )));
            }
            tx_db.insert(block.get_hash(), block_data.as_slice())?;
            tx_db.insert(TIP_BLOCK_HASH_KEY, block.get_hash())?;
            PendingPool::prune(tx_db, &included)?;
            Ok(())
        })?;
        self.db.flush()?;
        self.set_tip_hash(block.get_hash());
        Ok(())
    }

    // The same output referenced twice within one block is a double spend
    fn check_for_double_spending(transactions: &[Transaction]) -> Result<()> {
        let mut spent_outputs: HashSet<(Vec<u8>, i64)> = HashSet::new();

        for (tx_index, transaction) in transactions.iter().enumerate() {
            if transaction.is_coinbase() {
                continue;
            }

            for input in transaction.get_vin() {
                let output_reference = (input.get_txid().to_vec(), input.get_vout());
                if !spent_outputs.insert(output_reference) {
                    return Err(LedgerError::Transaction(format!(
                        "Double-spending detected in transaction {}: output {}:{} already spent in this block",
                        tx_index,
                        HEXLOWER.encode(input.get_txid()),
                        input.get_vout()
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn add_to_pool(&self, transaction: &Transaction) -> Result<usize> {
        self.pool.add(transaction)
    }

    pub fn get_pending_transactions(&self) -> Result<Vec<Transaction>> {
        self.pool.get()
    }

    pub fn clear_pool(&self) -> Result<()> {
        self.pool.clear()
    }

    /// Walk from the tip back to genesis. Each step reads storage on its own,
    /// so a walk racing a commit may observe a mix of old and new state.
    pub fn iterator(&self) -> BlockchainIterator {
        BlockchainIterator::new(self.get_tip_hash(), self.db.clone())
    }

    pub fn get_block(&self, block_hash: &[u8]) -> Result<Option<Block>> {
        match self.db.get(block_hash)? {
            Some(block_bytes) => Ok(Some(Block::deserialize(block_bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    /// Number of blocks above genesis.
    pub fn get_best_height(&self) -> Result<usize> {
        let mut count: usize = 0;
        for block in self.iterator() {
            block?;
            count += 1;
        }
        Ok(count.saturating_sub(1))
    }

    /// Check every block from tip to genesis: proof-of-work, hash linkage and
    /// transaction ids. Returns the number of blocks verified.
    pub fn verify_chain(&self) -> Result<usize> {
        let mut expected_hash = self.get_tip_hash();
        let mut verified = 0;

        for block in self.iterator() {
            let block = block?;
            let hash_hex = HEXLOWER.encode(block.get_hash());

            if block.get_hash() != expected_hash.as_slice() {
                return Err(LedgerError::InvalidBlock(format!(
                    "Block {hash_hex} stored under {}",
                    HEXLOWER.encode(&expected_hash)
                )));
            }
            if !ProofOfWork::validate(&block) {
                return Err(LedgerError::InvalidBlock(format!(
                    "Block {hash_hex} fails proof-of-work"
                )));
            }
            for tx in block.get_transactions() {
                if tx.hash()? != tx.get_id() {
                    return Err(LedgerError::InvalidBlock(format!(
                        "Transaction {} in block {hash_hex} has a mismatched id",
                        HEXLOWER.encode(tx.get_id())
                    )));
                }
            }

            expected_hash = block.get_prev_hash().to_vec();
            verified += 1;
        }

        Ok(verified)
    }

    /// Every key in the main keyspace with the size of its value.
    pub fn dump_entries(&self) -> Result<Vec<(Vec<u8>, usize)>> {
        let mut entries = vec![];
        for item in self.db.iter() {
            let (key, value) = item?;
            entries.push((key.to_vec(), value.len()));
        }
        Ok(entries)
    }
}

/// Single-pass cursor from the tip to genesis. Yields an error and stops if
/// a block is missing or fails to decode.
pub struct BlockchainIterator {
    db: Db,
    current_hash: Option<Vec<u8>>,
}

impl BlockchainIterator {
    fn new(tip_hash: Vec<u8>, db: Db) -> BlockchainIterator {
        BlockchainIterator {
            current_hash: Some(tip_hash),
            db,
        }
    }
}

impl Iterator for BlockchainIterator {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.current_hash.take()?;
        let block = match self.db.get(&hash) {
            Ok(Some(data)) => Block::deserialize(data.as_ref()),
            Ok(None) => Err(LedgerError::InvalidBlock(format!(
                "Block {} missing from store",
                HEXLOWER.encode(&hash)
            ))),
            Err(e) => Err(e.into()),
        };

        if let Ok(block) = &block {
            if !block.is_genesis() {
                self.current_hash = Some(block.get_prev_hash().to_vec());
            }
        }
        Some(block)
    }
}
