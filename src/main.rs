// Entry point for the goblock CLI: every subcommand opens the ledger, runs one
// operation and exits.
use clap::Parser;
use data_encoding::HEXLOWER;
use goblock_ledger::{Block, Blockchain, Command, Config, LedgerError, Opt, Transaction, UTXOSet};
use log::{error, LevelFilter};
use serde_json::{json, Value};
use std::process;

fn main() {
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    match run_command(opt) {
        Ok(()) => {}
        // Nothing happened, the existing chain is left as it was
        Err(e @ LedgerError::AlreadyExists(_)) => println!("{e}"),
        Err(e) if e.is_fatal() => {
            error!("Error: {e}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}

fn run_command(opt: Opt) -> Result<(), LedgerError> {
    let mut config = Config::load()?;
    if let Some(data_dir) = opt.data_dir {
        config = config.with_db_path(data_dir);
    }

    match opt.command {
        Command::Init { address } => {
            let blockchain = Blockchain::create_blockchain(&address, &config)?;
            println!(
                "Created blockchain with genesis {}",
                HEXLOWER.encode(&blockchain.get_tip_hash())
            );
        }
        Command::Balance { address } => {
            let utxo_set = UTXOSet::new(Blockchain::new_blockchain(&config)?);
            let balance = utxo_set.get_balance(&address)?;
            println!("Balance of {address}: {balance}");
        }
        Command::Send { from, to, amount } => {
            let blockchain = Blockchain::new_blockchain(&config)?;
            let utxo_set = UTXOSet::new(blockchain.clone());
            let transaction = Transaction::new_utxo_transaction(&from, &to, amount, &utxo_set)?;
            let pending = blockchain.add_to_pool(&transaction)?;
            println!(
                "Transaction {} added to pending pool ({pending} pending)",
                HEXLOWER.encode(transaction.get_id())
            );
        }
        Command::GetChain => {
            let blockchain = Blockchain::new_blockchain(&config)?;
            let mut blocks = vec![];
            for block in blockchain.iterator() {
                blocks.push(block_json(&block?));
            }
            print_json(&Value::Array(blocks))?;
        }
        Command::Mine { miner } => {
            let blockchain = Blockchain::new_blockchain(&config)?;
            let block = blockchain.mine(miner.as_deref())?;
            println!(
                "Mined block {} with {} transaction(s)",
                HEXLOWER.encode(block.get_hash()),
                block.get_transactions().len()
            );
        }
        Command::GetPending => {
            let blockchain = Blockchain::new_blockchain(&config)?;
            let pending: Vec<Value> = blockchain
                .get_pending_transactions()?
                .iter()
                .map(transaction_json)
                .collect();
            print_json(&Value::Array(pending))?;
        }
        Command::Difficulty => {
            let blockchain = Blockchain::new_blockchain(&config)?;
            println!("{}", blockchain.get_difficulty());
        }
        Command::SetDifficulty { value } => {
            let blockchain = Blockchain::new_blockchain(&config)?;
            blockchain.set_difficulty(value)?;
            println!("Difficulty set to {value}");
        }
        Command::VerifyChain => {
            let blockchain = Blockchain::new_blockchain(&config)?;
            let verified = blockchain.verify_chain()?;
            println!("Chain is valid: {verified} block(s) verified");
        }
        Command::DbCheck => {
            let blockchain = Blockchain::new_blockchain(&config)?;
            for (key, size) in blockchain.dump_entries()? {
                let key = match std::str::from_utf8(&key) {
                    Ok(text) if key.len() < 32 => text.to_string(),
                    _ => HEXLOWER.encode(&key),
                };
                println!("key={key}, value={size} bytes");
            }
        }
    }
    Ok(())
}

fn print_json(value: &Value) -> Result<(), LedgerError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| LedgerError::Serialization(format!("JSON rendering failed: {e}")))?;
    println!("{text}");
    Ok(())
}

fn block_json(block: &Block) -> Value {
    json!({
        "hash": HEXLOWER.encode(block.get_hash()),
        "prev_hash": HEXLOWER.encode(block.get_prev_hash()),
        "nonce": block.get_nonce(),
        "difficulty": block.get_difficulty(),
        "transactions": block.get_transactions().iter().map(transaction_json).collect::<Vec<_>>(),
    })
}

fn transaction_json(tx: &Transaction) -> Value {
    let inputs: Vec<Value> = tx
        .get_vin()
        .iter()
        .map(|input| {
            json!({
                "txid": HEXLOWER.encode(input.get_txid()),
                "vout": input.get_vout(),
                "unlock_token": input.get_unlock_token(),
            })
        })
        .collect();
    let outputs: Vec<Value> = tx
        .get_vout()
        .iter()
        .map(|output| {
            json!({
                "value": output.get_value(),
                "unlock_key": output.get_unlock_key(),
            })
        })
        .collect();

    json!({
        "id": HEXLOWER.encode(tx.get_id()),
        "coinbase": tx.is_coinbase(),
        "inputs": inputs,
        "outputs": outputs,
    })
}
