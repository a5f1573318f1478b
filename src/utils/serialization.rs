// Every persisted value (blocks, the pending blob) goes through these two
// functions so the on-disk encoding has exactly one configuration.
use crate::error::{LedgerError, Result};
use bincode::config::{self, Configuration};

fn codec() -> Configuration {
    config::standard()
}

pub fn serialize<T: bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    bincode::encode_to_vec(data, codec())
        .map_err(|e| LedgerError::Serialization(format!("Encoding failed: {e}")))
}

/// Decode a value that must span all of `bytes`. Leftover bytes mean the
/// stored record is corrupt.
pub fn deserialize<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T> {
    let (data, read) = bincode::decode_from_slice(bytes, codec())
        .map_err(|e| LedgerError::Serialization(format!("Decoding failed: {e}")))?;
    if read != bytes.len() {
        return Err(LedgerError::Serialization(format!(
            "Decoding left {} trailing byte(s)",
            bytes.len() - read
        )));
    }
    Ok(data)
}
