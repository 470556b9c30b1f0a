//! Password hashing module
//!
//! This module provides secure password hashing and verification using Argon2id.
//!
//! # Security
//!
//! - Uses the Argon2id variant (hybrid of Argon2i and Argon2d)
//! - Cost parameters come from `HashingConfig`
//! - Generates a random salt for each password hash
//! - Verification reads the parameters embedded in the stored PHC string and
//!   compares digests in constant time

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::config::HashingConfig;

/// Errors raised by the hashing primitive.
///
/// None of these describe a wrong password; a mismatch is `Ok(false)` from
/// [`CredentialHasher::verify`].
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// The configured cost parameters are rejected by argon2
    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),

    /// Hash computation failed
    #[error("Failed to hash password: {0}")]
    Hash(String),

    /// A stored hash is not a valid PHC string
    #[error("Invalid password hash format: {0}")]
    MalformedHash(String),
}

/// Argon2id hasher configured with fixed cost parameters.
///
/// Cheap to clone; holds no mutable state.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    /// Hash of a fixed string, verified against when no account exists so
    /// that unknown emails cost the same as wrong passwords.
    dummy_hash: String,
}

impl CredentialHasher {
    /// Build a hasher from configuration.
    ///
    /// Computes one hash eagerly for the dummy verification target.
    pub fn new(config: &HashingConfig) -> Result<Self, PasswordError> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let dummy_hash = hash_with(&argon2, "crowdfund-dummy-credential")?;

        Ok(Self { argon2, dummy_hash })
    }

    /// Hash a password.
    ///
    /// Returns the PHC string (algorithm, parameters, salt and digest).
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        hash_with(&self.argon2, password)
    }

    /// Verify a password against a stored hash.
    ///
    /// `Ok(false)` means the password does not match; `Err` means the stored
    /// hash itself is unusable.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::Hash(e.to_string())),
        }
    }

    /// Spend one verification's worth of work without a stored hash.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;

    Ok(password_hash.to_string())
}

#[cfg(test)]
pub(crate) fn test_hasher() -> CredentialHasher {
    CredentialHasher::new(&HashingConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    })
    .expect("Failed to build test hasher")
}
