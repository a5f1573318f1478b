//! Error handling for the ledger
//!
//! Every fallible operation in the crate returns [`LedgerError`]. The variants
//! split into two classes: fatal ones that abort the whole operation (corrupt
//! data, storage failures, insufficient funds) and benign ones where nothing
//! happened and the caller can carry on (see [`LedgerError::is_fatal`]).

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Storage engine errors
    Database(String),
    /// Encode/decode failures; persisted bytes that fail to decode are corrupt
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Invalid or unreadable configuration
    Config(String),
    /// Malformed or conflicting transaction
    Transaction(String),
    /// Not enough unspent value to cover a payment
    InsufficientFunds { required: u64, available: u64 },
    /// Block validation errors
    InvalidBlock(String),
    /// Nonce space exhausted or mining cancelled
    Mining(String),
    /// `init` on a path that already holds a chain
    AlreadyExists(String),
    /// No chain could be opened at the configured path
    ChainNotFound(String),
    /// The tip moved while a block was being mined
    Conflict(String),
}

impl LedgerError {
    /// Whether the error aborts the operation, as opposed to reporting that
    /// nothing happened.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            LedgerError::AlreadyExists(_) | LedgerError::ChainNotFound(_) | LedgerError::Conflict(_)
        )
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Database(msg) => write!(f, "Database error: {msg}"),
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
            LedgerError::Config(msg) => write!(f, "Configuration error: {msg}"),
            LedgerError::Transaction(msg) => write!(f, "Transaction error: {msg}"),
            LedgerError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            LedgerError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            LedgerError::Mining(msg) => write!(f, "Mining error: {msg}"),
            LedgerError::AlreadyExists(path) => write!(f, "Blockchain already exists at {path}"),
            LedgerError::ChainNotFound(msg) => write!(f, "No blockchain available: {msg}"),
            LedgerError::Conflict(msg) => write!(f, "Commit conflict: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl From<sled::transaction::TransactionError<LedgerError>> for LedgerError {
    fn from(err: sled::transaction::TransactionError<LedgerError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(e) => e,
            sled::transaction::TransactionError::Storage(e) => LedgerError::Database(e.to_string()),
        }
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}
