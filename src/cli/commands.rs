use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "goblock", about = "A minimal proof-of-work ledger")]
pub struct Opt {
    #[arg(
        long = "data-dir",
        global = true,
        help = "Database directory (overrides LEDGER_DB_PATH and the config file)"
    )]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    #[command(name = "init", about = "Create a new blockchain")]
    Init {
        #[arg(short, long, help = "The address to send the genesis block reward to")]
        address: String,
    },
    #[command(name = "balance", about = "Get the balance of an address")]
    Balance {
        #[arg(short, long, help = "The address to query")]
        address: String,
    },
    #[command(name = "send", about = "Submit a transfer to the pending pool")]
    Send {
        #[arg(short, long, help = "Source address")]
        from: String,
        #[arg(short, long, help = "Destination address")]
        to: String,
        #[arg(
            short,
            long,
            value_parser = clap::value_parser!(u64).range(1..),
            help = "Amount to send"
        )]
        amount: u64,
    },
    #[command(name = "getchain", about = "Print all blocks as JSON, newest first")]
    GetChain,
    #[command(name = "mine", about = "Mine the pending pool into a new block")]
    Mine {
        #[arg(long, help = "Address that receives the block reward")]
        miner: Option<String>,
    },
    #[command(name = "getpending", about = "Print pending transactions as JSON")]
    GetPending,
    #[command(name = "difficulty", about = "Print the current mining difficulty")]
    Difficulty,
    #[command(name = "setdifficulty", about = "Set the mining difficulty")]
    SetDifficulty {
        #[arg(
            short,
            long,
            value_parser = clap::value_parser!(u32).range(1..=256),
            help = "Required leading zero bits (1-256)"
        )]
        value: u32,
    },
    #[command(name = "verifychain", about = "Check proof-of-work and links of every block")]
    VerifyChain,
    #[command(name = "dbcheck", about = "List every stored key with its value size")]
    DbCheck,
}
