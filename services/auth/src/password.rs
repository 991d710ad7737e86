//! Password hashing with Argon2
//!
//! Hashing is CPU-bound, so both operations run on the blocking pool.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use tokio::task;
use tracing::warn;

use crate::error::{AuthError, AuthResult};

/// Hash a plaintext password into a PHC string
pub async fn hash_password(password: &str) -> AuthResult<String> {
    let password = password.to_owned();

    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut rand::thread_rng());
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hash(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::Hash(e.to_string()))?
}

/// Check a plaintext password against a stored hash
///
/// A stored hash that cannot be parsed never verifies.
pub async fn verify_password(password_hash: &str, password: &str) -> AuthResult<bool> {
    let password_hash = password_hash.to_owned();
    let password = password.to_owned();

    task::spawn_blocking(move || match PasswordHash::new(&password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is malformed: {}", e);
            false
        }
    })
    .await
    .map_err(|e| AuthError::Hash(e.to_string()))
}
