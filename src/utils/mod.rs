//! Utility functions and helpers
//!
//! Hashing and the binary codec shared by blocks, transactions and the
//! pending pool.

pub mod crypto;
pub mod serialization;

pub use crypto::{hash_int, sha256_digest};
pub use serialization::{deserialize, serialize};
