use crate::config::{validate_difficulty, DEFAULT_DIFFICULTY};
use crate::core::Block;
use crate::error::{LedgerError, Result};
use crate::utils::{hash_int, sha256_digest};
use data_encoding::HEXLOWER;
use log::{debug, info};
use num_bigint::BigUint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

const MAX_NONCE: i64 = i64::MAX;

/// Nonce search and validation. Owns the difficulty used for new blocks;
/// reads share the lock, `set_difficulty` takes it exclusively.
pub struct ProofOfWork {
    difficulty: RwLock<u32>,
    cancelled: AtomicBool,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        ProofOfWork {
            difficulty: RwLock::new(DEFAULT_DIFFICULTY),
            cancelled: AtomicBool::new(false),
        }
    }
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> Result<ProofOfWork> {
        validate_difficulty(difficulty)?;
        Ok(ProofOfWork {
            difficulty: RwLock::new(difficulty),
            cancelled: AtomicBool::new(false),
        })
    }

    pub fn get_difficulty(&self) -> u32 {
        *self
            .difficulty
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_difficulty(&self, difficulty: u32) -> Result<()> {
        validate_difficulty(difficulty)?;
        let mut current = self
            .difficulty
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = difficulty;
        Ok(())
    }

    /// `2^(256 - difficulty)`: a hash is accepted when it is strictly below.
    pub fn target(difficulty: u32) -> BigUint {
        BigUint::from(1u8) << (256 - difficulty.min(256)) as usize
    }

    /// `prev_hash ‖ transactions_hash ‖ be(nonce) ‖ be(difficulty)`
    pub fn prepare_data(block: &Block, nonce: i64, difficulty: u32) -> Vec<u8> {
        let mut data_bytes = vec![];
        data_bytes.extend(block.get_prev_hash());
        data_bytes.extend(block.hash_transactions());
        data_bytes.extend(nonce.to_be_bytes());
        data_bytes.extend(i64::from(difficulty).to_be_bytes());
        data_bytes
    }

    /// Search nonces from zero upward under the current difficulty. Returns
    /// the winning nonce, its hash, and the difficulty that was applied.
    pub fn run(&self, block: &Block) -> Result<(i64, Vec<u8>, u32)> {
        let difficulty = self.get_difficulty();
        let target = Self::target(difficulty);
        // A cancel only applies to the search in progress
        self.cancelled.store(false, Ordering::Release);
        debug!("Mining with difficulty {difficulty}");

        let mut nonce = 0;
        while nonce < MAX_NONCE {
            if self.cancelled.swap(false, Ordering::AcqRel) {
                return Err(LedgerError::Mining(format!(
                    "Mining cancelled at nonce {nonce}"
                )));
            }

            let data = Self::prepare_data(block, nonce, difficulty);
            let hash = sha256_digest(data.as_slice());
            if hash_int(&hash) < target {
                info!("Found nonce {nonce}: {}", HEXLOWER.encode(&hash));
                return Ok((nonce, hash, difficulty));
            }
            nonce += 1;
        }

        Err(LedgerError::Mining(format!(
            "Nonce space exhausted at difficulty {difficulty}"
        )))
    }

    /// Stop the search currently in progress. Has no effect when idle.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check a block against the difficulty it was mined with.
    pub fn validate(block: &Block) -> bool {
        Self::validate_at(block, block.get_difficulty())
    }

    /// Check a block against this engine's current difficulty, which only
    /// agrees with [`ProofOfWork::validate`] while the difficulty is unchanged.
    pub fn validate_with_current(&self, block: &Block) -> bool {
        Self::validate_at(block, self.get_difficulty())
    }

    fn validate_at(block: &Block, difficulty: u32) -> bool {
        if validate_difficulty(difficulty).is_err() {
            return false;
        }
        let data = Self::prepare_data(block, block.get_nonce(), difficulty);
        let hash = sha256_digest(data.as_slice());
        hash == block.get_hash() && hash_int(&hash) < Self::target(difficulty)
    }
}
