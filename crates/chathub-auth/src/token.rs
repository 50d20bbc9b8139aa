//! Opaque refresh tokens.
//!
//! A refresh token is 32 random bytes, URL-safe base64 encoded. Only the
//! hex SHA-256 of the token is ever stored or compared.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Generates a fresh high-entropy refresh token.
pub fn generate_refresh_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// One-way hash used as the credential store key.
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
