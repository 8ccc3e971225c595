use tracing::warn;

use crate::error::{AppError, AppResult};

pub const DEFAULT_HASH_COST: u32 = 10;
pub const MIN_HASH_COST: u32 = 4;
pub const MAX_HASH_COST: u32 = 31;

/// Opaque credential capability: only hashes are ever stored
pub trait CredentialVerifier: Send + Sync {
    /// Hash a secret for storage
    fn hash(&self, secret: &str) -> AppResult<String>;

    /// Check a supplied secret against a stored hash
    fn verify(&self, stored_hash: &str, secret: &str) -> AppResult<bool>;
}

/// bcrypt with a per-hash salt, stored in modular crypt form (`$2b$<cost>$...`)
#[derive(Debug, Clone, Copy)]
pub struct BcryptCredentialVerifier {
    cost: u32,
}

impl BcryptCredentialVerifier {
    pub fn new(cost: u32) -> AppResult<Self> {
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&cost) {
            return Err(AppError::Config(format!(
                "bcrypt cost must be between {} and {}, got {}",
                MIN_HASH_COST, MAX_HASH_COST, cost
            )));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptCredentialVerifier {
    fn default() -> Self {
        Self {
            cost: DEFAULT_HASH_COST,
        }
    }
}

impl CredentialVerifier for BcryptCredentialVerifier {
    fn hash(&self, secret: &str) -> AppResult<String> {
        if secret.is_empty() {
            return Err(AppError::InvalidInput("Secret cannot be empty".to_string()));
        }
        bcrypt::hash(secret, self.cost)
            .map_err(|e| AppError::Internal(format!("Failed to hash credential: {}", e)))
    }

    fn verify(&self, stored_hash: &str, secret: &str) -> AppResult<bool> {
        bcrypt::verify(secret, stored_hash).map_err(|e| {
            warn!("Stored credential hash could not be checked: {}", e);
            AppError::Internal("Malformed credential hash".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> BcryptCredentialVerifier {
        BcryptCredentialVerifier::new(MIN_HASH_COST).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let verifier = fast();
        let stored = verifier.hash("hunter2").unwrap();

        assert!(!stored.contains("hunter2"));
        assert!(verifier.verify(&stored, "hunter2").unwrap());
        assert!(!verifier.verify(&stored, "hunter3").unwrap());
    }

    #[test]
    fn test_default_hash_is_bcrypt_cost_ten() {
        let verifier = BcryptCredentialVerifier::default();
        let stored = verifier.hash("secret1").unwrap();

        assert!(stored.starts_with("$2b$10$"), "{}", stored);
        assert_eq!(stored.len(), 60);
        assert!(verifier.verify(&stored, "secret1").unwrap());
        assert!(!verifier.verify(&stored, "secret2").unwrap());
    }

    #[test]
    fn test_hashes_made_at_another_cost_still_verify() {
        let stored = fast().hash("same").unwrap();
        assert!(stored.starts_with("$2b$04$"));
        assert!(BcryptCredentialVerifier::default().verify(&stored, "same").unwrap());
    }

    #[test]
    fn test_salts_differ_per_hash() {
        let verifier = fast();
        let a = verifier.hash("same").unwrap();
        let b = verifier.hash("same").unwrap();
        assert_ne!(a, b);
        assert!(verifier.verify(&a, "same").unwrap());
        assert!(verifier.verify(&b, "same").unwrap());
    }

    #[test]
    fn test_malformed_hash_empty_secret_and_bad_cost() {
        let verifier = fast();
        assert!(verifier.verify("salt$deadbeef", "x").is_err());
        assert!(verifier.hash("").is_err());
        assert!(BcryptCredentialVerifier::new(3).is_err());
        assert!(BcryptCredentialVerifier::new(32).is_err());
    }
}
