//! Password hashing and verification using bcrypt.

use bcrypt::{DEFAULT_COST, hash, verify};

/// Hash a plaintext password with a random salt.
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, DEFAULT_COST)
}

/// Check a plaintext password against a stored bcrypt hash.
/// Returns Ok(false) on mismatch; Err only if the stored hash is malformed.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, password_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_correct_password() {
        let password_hash = hash_password("password").unwrap();
        assert!(verify_password("password", &password_hash).unwrap());
    }

    #[test]
    fn test_verify_wrong_password() {
        let password_hash = hash_password("password").unwrap();
        assert!(!verify_password("ppaassword", &password_hash).unwrap());
    }

    #[test]
    fn test_same_password_different_hash() {
        // Salted: two hashes of the same password differ but both verify
        let hash1 = hash_password("password").unwrap();
        let hash2 = hash_password("password").unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_password("password", &hash1).unwrap());
        assert!(verify_password("password", &hash2).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(verify_password("password", "not-a-bcrypt-hash").is_err());
    }
}
