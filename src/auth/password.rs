use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::{debug, error};

use crate::errors::ServiceError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hashes a password with a fresh salt and the default Argon2id parameters.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    if password.is_empty() {
        return Err(ServiceError::ValidationError(
            "Password cannot be empty".to_string(),
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("password hashing failed: {}", e);
            ServiceError::HashError(e.to_string())
        })
}

/// `Ok(false)` on a wrong password; `Err` only when the stored hash is unusable.
pub fn verify_password(stored_hash: &str, candidate: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        error!("stored password hash is malformed: {}", e);
        ServiceError::HashError(e.to_string())
    })?;

    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => {
            debug!("password mismatch");
            Ok(false)
        }
        Err(e) => Err(ServiceError::HashError(e.to_string())),
    }
}
