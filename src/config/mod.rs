//! Configuration management
//!
//! Settings for where the chain lives on disk, the starting mining
//! difficulty, and how hard to try when reopening a locked store.

pub mod settings;

pub use settings::{validate_difficulty, Config, DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
