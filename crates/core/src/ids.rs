//! Random identifier and secret generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand_core::{OsRng, RngCore};

/// Number of random bytes behind every identifier and token secret.
pub const ID_ENTROPY_BYTES: usize = 16;

fn random_bytes() -> [u8; ID_ENTROPY_BYTES] {
    let mut buf = [0u8; ID_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// 128 random bits rendered as 32 lowercase hex characters.
#[must_use]
pub fn random_hex_id() -> String {
    hex::encode(random_bytes())
}

/// 128 random bits rendered as unpadded URL-safe base64 (22 characters).
#[must_use]
pub fn random_secret() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes())
}
