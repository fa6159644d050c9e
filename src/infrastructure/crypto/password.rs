//! Password hashing
//!
//! Thin wrapper over bcrypt. Digests are opaque to the rest of the crate
//! and are only ever compared through [`verify_password`].

use bcrypt::{hash, verify, DEFAULT_COST};

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, DEFAULT_COST)
}

pub fn verify_password(password: &str, digest: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_matching_password_only() {
        let digest = hash_password("Secret1!").unwrap();

        assert!(verify_password("Secret1!", &digest).unwrap());
        assert!(!verify_password("secret1!", &digest).unwrap());
        assert!(!verify_password("", &digest).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password("Secret1!").unwrap();
        let b = hash_password("Secret1!").unwrap();
        // Salted digests never repeat.
        assert_ne!(a, b);
    }
}
