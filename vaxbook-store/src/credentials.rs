//! Salted, iterated SHA-256 password digests.

use constant_time_eq::constant_time_eq;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const DEFAULT_HASH_ITERATIONS: u32 = 10_000;
pub const SALT_LEN: usize = 16;

/// What gets persisted for an account. The password itself never is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub salt: Vec<u8>,
    pub hash: Vec<u8>,
}

impl Credential {
    pub fn new(password: &str, iterations: u32) -> Self {
        let salt = generate_salt();
        let hash = hash_password(password, &salt, iterations);
        Self { salt, hash }
    }

    pub fn verify(&self, password: &str, iterations: u32) -> bool {
        constant_time_eq(&hash_password(password, &self.salt, iterations), &self.hash)
    }
}

pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

pub fn hash_password(password: &str, salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut digest = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize();

    for _ in 1..iterations.max(1) {
        digest = Sha256::new().chain_update(salt).chain_update(digest).finalize();
    }

    digest.to_vec()
}
