use num_bigint::BigUint;
use ring::digest::{Context, SHA256};

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

/// Reads a digest as a big-endian unsigned integer.
pub fn hash_int(hash: &[u8]) -> BigUint {
    BigUint::from_bytes_be(hash)
}
