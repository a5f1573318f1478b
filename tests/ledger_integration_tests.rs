//! Ledger integration tests
//!
//! End-to-end flows over a real sled store: creating a chain, paying between
//! addresses through the pending pool, mining, and reopening.

use goblock_ledger::{
    Blockchain, Config, LedgerError, ProofOfWork, TXInput, TXOutput, Transaction, UTXOSet,
    SUBSIDY,
};
use std::path::Path;
use tempfile::tempdir;

fn test_config(dir: &Path) -> Config {
    Config::default()
        .with_db_path(dir.join("chain"))
        .with_difficulty(1)
}

fn balance(blockchain: &Blockchain, address: &str) -> u64 {
    UTXOSet::new(blockchain.clone())
        .get_balance(address)
        .unwrap()
}

fn send(
    blockchain: &Blockchain,
    from: &str,
    to: &str,
    amount: u64,
) -> Result<Transaction, LedgerError> {
    let utxo_set = UTXOSet::new(blockchain.clone());
    let tx = Transaction::new_utxo_transaction(from, to, amount, &utxo_set)?;
    blockchain.add_to_pool(&tx)?;
    Ok(tx)
}

#[test]
fn test_init_credits_genesis_reward() {
    let temp_dir = tempdir().unwrap();
    let blockchain = Blockchain::create_blockchain("alice", &test_config(temp_dir.path())).unwrap();

    assert_eq!(balance(&blockchain, "alice"), SUBSIDY);
    assert_eq!(balance(&blockchain, "bob"), 0);
    assert_eq!(blockchain.get_best_height().unwrap(), 0);

    let genesis = blockchain
        .get_block(&blockchain.get_tip_hash())
        .unwrap()
        .unwrap();
    assert!(genesis.get_prev_hash().is_empty());
    assert!(genesis.get_transactions()[0].is_coinbase());
    assert!(ProofOfWork::validate(&genesis));
}

#[test]
fn test_send_then_mine_moves_funds() {
    let temp_dir = tempdir().unwrap();
    let blockchain = Blockchain::create_blockchain("alice", &test_config(temp_dir.path())).unwrap();

    let tx = send(&blockchain, "alice", "bob", 20).unwrap();
    assert_eq!(blockchain.get_pending_transactions().unwrap(), vec![tx.clone()]);
    // Pending transactions do not count until mined
    assert_eq!(balance(&blockchain, "bob"), 0);

    let block = blockchain.mine(None).unwrap();
    assert_eq!(block.get_transactions(), &[tx]);

    assert_eq!(balance(&blockchain, "alice"), 30);
    assert_eq!(balance(&blockchain, "bob"), 20);
    assert!(blockchain.get_pending_transactions().unwrap().is_empty());
}

#[test]
fn test_insufficient_funds_leaves_pool_untouched() {
    let temp_dir = tempdir().unwrap();
    let blockchain = Blockchain::create_blockchain("alice", &test_config(temp_dir.path())).unwrap();
    send(&blockchain, "alice", "bob", 5).unwrap();
    let before = blockchain.get_pending_transactions().unwrap();

    let result = send(&blockchain, "alice", "bob", 1000);
    match result {
        Err(e @ LedgerError::InsufficientFunds { .. }) => {
            assert!(e.is_fatal());
            assert_eq!(
                e,
                LedgerError::InsufficientFunds {
                    required: 1000,
                    available: 50
                }
            );
        }
        other => panic!("expected insufficient funds, got {other:?}"),
    }
    assert_eq!(blockchain.get_pending_transactions().unwrap(), before);
}

#[test]
fn test_lowered_difficulty_mines_quickly() {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path()).with_difficulty(4);
    let blockchain = Blockchain::create_blockchain("alice", &config).unwrap();

    blockchain.set_difficulty(1).unwrap();
    let block = blockchain.mine(None).unwrap();

    assert_eq!(blockchain.get_difficulty(), 1);
    assert_eq!(block.get_difficulty(), 1);
    assert!(block.get_transactions().is_empty());
    assert!(ProofOfWork::validate(&block));
    assert!(matches!(
        blockchain.set_difficulty(0),
        Err(LedgerError::Config(_))
    ));
}

#[test]
fn test_two_pool_submissions_mined_together() {
    let temp_dir = tempdir().unwrap();
    let blockchain = Blockchain::create_blockchain("alice", &test_config(temp_dir.path())).unwrap();
    blockchain.mine(Some("bob")).unwrap();
    assert_eq!(balance(&blockchain, "bob"), SUBSIDY);

    let first = send(&blockchain, "alice", "carol", 10).unwrap();
    let second = send(&blockchain, "bob", "carol", 5).unwrap();
    assert_eq!(blockchain.get_pending_transactions().unwrap().len(), 2);

    let block = blockchain.mine(None).unwrap();
    assert_eq!(block.get_transactions(), &[first, second]);
    assert!(blockchain.get_pending_transactions().unwrap().is_empty());

    assert_eq!(balance(&blockchain, "alice"), 40);
    assert_eq!(balance(&blockchain, "bob"), 45);
    assert_eq!(balance(&blockchain, "carol"), 15);
}

#[test]
fn test_add_block_with_empty_input_uses_pool() {
    let temp_dir = tempdir().unwrap();
    let blockchain = Blockchain::create_blockchain("alice", &test_config(temp_dir.path())).unwrap();
    let tx = send(&blockchain, "alice", "bob", 7).unwrap();

    let block = blockchain.add_block(&[]).unwrap();
    assert_eq!(block.get_transactions(), &[tx]);
    assert!(blockchain.get_pending_transactions().unwrap().is_empty());
}

#[test]
fn test_explicit_block_keeps_unrelated_pending() {
    let temp_dir = tempdir().unwrap();
    let blockchain = Blockchain::create_blockchain("alice", &test_config(temp_dir.path())).unwrap();
    let pending = send(&blockchain, "alice", "bob", 7).unwrap();

    let reward = Transaction::new_coinbase_tx("miner", "explicit block").unwrap();
    blockchain.add_block(&[reward]).unwrap();

    assert_eq!(blockchain.get_pending_transactions().unwrap(), vec![pending]);
    assert_eq!(balance(&blockchain, "miner"), SUBSIDY);
}

#[test]
fn test_mining_reward_goes_to_miner() {
    let temp_dir = tempdir().unwrap();
    let blockchain = Blockchain::create_blockchain("alice", &test_config(temp_dir.path())).unwrap();

    let first = blockchain.mine(Some("alice")).unwrap();
    let second = blockchain.mine(Some("alice")).unwrap();
    assert!(first.get_transactions()[0].is_coinbase());
    // Rewards on different parents never share an id
    assert_ne!(
        first.get_transactions()[0].get_id(),
        second.get_transactions()[0].get_id()
    );
    assert_eq!(balance(&blockchain, "alice"), 3 * SUBSIDY);
}

#[test]
fn test_first_fit_selection_and_change() {
    let temp_dir = tempdir().unwrap();
    let blockchain = Blockchain::create_blockchain("alice", &test_config(temp_dir.path())).unwrap();
    blockchain.mine(Some("alice")).unwrap();

    let utxo_set = UTXOSet::new(blockchain.clone());
    let (accumulated, outputs) = utxo_set.find_spendable_outputs("alice", 30).unwrap();
    assert_eq!(accumulated, SUBSIDY);
    assert_eq!(outputs.values().map(Vec::len).sum::<usize>(), 1);

    let (accumulated, _) = utxo_set.find_spendable_outputs("alice", 80).unwrap();
    assert_eq!(accumulated, 2 * SUBSIDY);

    let change_tx = Transaction::new_utxo_transaction("alice", "bob", 30, &utxo_set).unwrap();
    assert_eq!(change_tx.get_vin().len(), 1);
    assert_eq!(
        change_tx.get_vout(),
        &[TXOutput::new(30, "bob"), TXOutput::new(20, "alice")]
    );

    let exact_tx = Transaction::new_utxo_transaction("alice", "bob", 50, &utxo_set).unwrap();
    assert_eq!(exact_tx.get_vout(), &[TXOutput::new(50, "bob")]);
}

#[test]
fn test_pending_double_spend_rejected() {
    let temp_dir = tempdir().unwrap();
    let blockchain = Blockchain::create_blockchain("alice", &test_config(temp_dir.path())).unwrap();

    send(&blockchain, "alice", "bob", 10).unwrap();
    // The builder only sees mined outputs, so it picks the same coin again
    let result = send(&blockchain, "alice", "carol", 10);
    assert!(matches!(result, Err(LedgerError::Transaction(_))));
    assert_eq!(blockchain.get_pending_transactions().unwrap().len(), 1);
}

#[test]
fn test_spend_within_same_block() {
    let temp_dir = tempdir().unwrap();
    let blockchain = Blockchain::create_blockchain("alice", &test_config(temp_dir.path())).unwrap();

    let reward = Transaction::new_coinbase_tx("dave", "").unwrap();
    let spend = Transaction::new(
        vec![TXInput::new(reward.get_id(), 0, "dave")],
        vec![TXOutput::new(SUBSIDY, "erin")],
    )
    .unwrap();
    blockchain.add_block(&[reward, spend]).unwrap();

    assert_eq!(balance(&blockchain, "dave"), 0);
    assert_eq!(balance(&blockchain, "erin"), SUBSIDY);
}

#[test]
fn test_balance_reads_are_idempotent() {
    let temp_dir = tempdir().unwrap();
    let blockchain = Blockchain::create_blockchain("alice", &test_config(temp_dir.path())).unwrap();
    send(&blockchain, "alice", "bob", 12).unwrap();
    blockchain.mine(None).unwrap();

    let utxo_set = UTXOSet::new(blockchain.clone());
    assert_eq!(
        utxo_set.get_balance("alice").unwrap(),
        utxo_set.get_balance("alice").unwrap()
    );
    assert_eq!(
        utxo_set.find_unspent_transactions("bob").unwrap(),
        utxo_set.find_unspent_transactions("bob").unwrap()
    );
    assert_eq!(utxo_set.find_utxo("bob").unwrap(), vec![TXOutput::new(12, "bob")]);
}

#[test]
fn test_iteration_ends_at_genesis() {
    let temp_dir = tempdir().unwrap();
    let blockchain = Blockchain::create_blockchain("alice", &test_config(temp_dir.path())).unwrap();
    for _ in 0..3 {
        blockchain.mine(Some("miner")).unwrap();
    }

    let blocks: Vec<_> = blockchain
        .iterator()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(blocks.len(), blockchain.get_best_height().unwrap() + 1);
    assert_eq!(blocks.len(), 4);
    assert_eq!(blocks[0].get_hash(), blockchain.get_tip_hash().as_slice());
    assert!(blocks[3].get_prev_hash().is_empty());
    for pair in blocks.windows(2) {
        assert_eq!(pair[0].get_prev_hash(), pair[1].get_hash());
    }

    assert_eq!(blockchain.verify_chain().unwrap(), 4);
}

#[test]
fn test_reopen_existing_chain() {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let tip = {
        let blockchain = Blockchain::create_blockchain("alice", &config).unwrap();
        send(&blockchain, "alice", "bob", 20).unwrap();
        blockchain.mine(None).unwrap();
        send(&blockchain, "alice", "carol", 5).unwrap();
        blockchain.get_tip_hash()
    };

    let blockchain = Blockchain::new_blockchain(&config).unwrap();
    assert_eq!(blockchain.get_tip_hash(), tip);
    assert_eq!(balance(&blockchain, "alice"), 30);
    assert_eq!(balance(&blockchain, "bob"), 20);
    assert_eq!(blockchain.get_pending_transactions().unwrap().len(), 1);
}

#[test]
fn test_init_on_existing_chain_is_benign() {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    drop(Blockchain::create_blockchain("alice", &config).unwrap());

    match Blockchain::create_blockchain("mallory", &config) {
        Err(e @ LedgerError::AlreadyExists(_)) => assert!(!e.is_fatal()),
        Err(other) => panic!("expected AlreadyExists, got {other:?}"),
        Ok(_) => panic!("expected AlreadyExists, got a new chain"),
    }

    let blockchain = Blockchain::new_blockchain(&config).unwrap();
    assert_eq!(balance(&blockchain, "alice"), SUBSIDY);
    assert_eq!(balance(&blockchain, "mallory"), 0);
}

#[test]
fn test_continue_without_chain_is_recoverable() {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());

    match Blockchain::new_blockchain(&config) {
        Err(e @ LedgerError::ChainNotFound(_)) => assert!(!e.is_fatal()),
        Err(other) => panic!("expected ChainNotFound, got {other:?}"),
        Ok(_) => panic!("expected ChainNotFound, got a chain"),
    }
    assert!(!config.db_path.exists());
}

#[test]
fn test_dump_entries_lists_layout() {
    let temp_dir = tempdir().unwrap();
    let blockchain = Blockchain::create_blockchain("alice", &test_config(temp_dir.path())).unwrap();
    send(&blockchain, "alice", "bob", 1).unwrap();

    let keys: Vec<Vec<u8>> = blockchain
        .dump_entries()
        .unwrap()
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    assert!(keys.contains(&b"lh".to_vec()));
    assert!(keys.contains(&b"pending".to_vec()));
    assert!(keys.contains(&blockchain.get_tip_hash()));
}
