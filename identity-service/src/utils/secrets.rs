//! Random identifiers and secret digests.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// URL-safe random token carrying `bytes * 8` bits of entropy.
pub fn generate_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Hex SHA-256 of a client secret, as stored.
pub fn digest_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Constant-time comparison of a presented secret against a stored digest.
/// Both sides are fixed-length digests, so timing does not depend on the
/// presented secret's length or on where it first differs.
pub fn secrets_match(presented: &str, stored_digest: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let Ok(stored) = hex::decode(stored_digest) else {
        return false;
    };
    presented.as_slice().ct_eq(stored.as_slice()).into()
}
