use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// PINs are exactly four ASCII digits.
pub fn is_valid_pin_format(pin: &str) -> bool {
    pin.len() == 4 && pin.bytes().all(|b| b.is_ascii_digit())
}

pub fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Iterated salted SHA-256 over salt || pepper || pin. The pepper comes from
/// config and never sits next to the stored hashes.
pub fn hash_pin(pin: &str, salt: &str, pepper: &SecretString, iterations: u32) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(pepper.expose_secret().as_bytes())
        .chain_update(pin.as_bytes())
        .finalize();

    for _ in 1..iterations {
        digest = Sha256::digest(digest);
    }

    hex::encode(digest)
}

pub fn hashes_match(expected: &str, candidate: &str) -> bool {
    expected.as_bytes().ct_eq(candidate.as_bytes()).unwrap_u8() == 1
}
