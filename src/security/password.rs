use crate::core::config::HashingConfig;
use anyhow::{anyhow, Result};
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

const PHC_PREFIX: &str = "$argon2";

/// Argon2id hashing of account secrets
///
/// Stored secrets that are not PHC strings are legacy plaintext. They are
/// compared in constant time, a mismatch still pays for one Argon2 check,
/// and callers re-hash them after a successful match.
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    /// Verified against when the email is unknown, so both failure paths
    /// do the same amount of work
    dummy_hash: String,
}

impl CredentialHasher {
    pub fn new(config: &HashingConfig) -> Result<Self> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| anyhow!("Invalid hashing parameters: {}", e))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut hasher = Self {
            argon2,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash("dummy-password-for-timing")?;
        Ok(hasher)
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
            .map_err(|e| anyhow!("Failed to encode salt: {}", e))?;

        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Failed to hash password: {}", e))?;

        Ok(hash.to_string())
    }

    /// Check a plaintext password against a stored secret
    ///
    /// A stored PHC string that fails to parse never matches.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        if Self::is_legacy(stored) {
            if legacy_matches(password, stored) {
                return true;
            }
            return self.verify_dummy(password);
        }

        match PasswordHash::new(stored) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Burn the same work as a real verification; always false
    pub fn verify_dummy(&self, password: &str) -> bool {
        let _ = self.verify(password, &self.dummy_hash);
        false
    }

    pub fn is_legacy(stored: &str) -> bool {
        !stored.starts_with(PHC_PREFIX)
    }
}

/// Equality of a typed secret and a stored plaintext one
///
/// Walks the longer input in full and folds the length difference into the
/// result, so neither a matching prefix nor the stored length shows in timing.
fn legacy_matches(password: &str, stored: &str) -> bool {
    let (typed, kept) = (password.as_bytes(), stored.as_bytes());
    let mut diff = typed.len() ^ kept.len();
    for i in 0..typed.len().max(kept.len()) {
        let a = typed.get(i).copied().unwrap_or(0);
        let b = kept.get(i).copied().unwrap_or(0);
        diff |= usize::from(a ^ b);
    }
    diff == 0
}

#[cfg(test)]
pub(crate) fn test_hashing_config() -> HashingConfig {
    HashingConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn hasher() -> CredentialHasher {
        CredentialHasher::new(&test_hashing_config()).unwrap()
    }

    #[test]
    fn test_hash_is_argon2id_phc_string() {
        let hash = hasher().hash("secret1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("secret1"));
        assert!(!CredentialHasher::is_legacy(&hash));
    }

    #[test]
    fn test_verify_correct_and_wrong_password() {
        let hasher = hasher();
        let hash = hasher.hash("secret1").unwrap();
        assert!(hasher.verify("secret1", &hash));
        assert!(!hasher.verify("secret2", &hash));
        assert!(!hasher.verify("", &hash));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let hasher = hasher();
        let first = hasher.hash("secret1").unwrap();
        let second = hasher.hash("secret1").unwrap();
        assert_ne!(first, second);
        assert!(hasher.verify("secret1", &second));
    }

    #[test]
    fn test_verify_uses_parameters_embedded_in_hash() {
        let strong = CredentialHasher::new(&HashingConfig {
            memory_kib: 2048,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let hash = strong.hash("secret1").unwrap();

        assert!(hasher().verify("secret1", &hash));
    }

    #[test]
    fn test_legacy_plaintext_secret() {
        let hasher = hasher();
        assert!(CredentialHasher::is_legacy("admin123"));
        assert!(hasher.verify("admin123", "admin123"));
        assert!(!hasher.verify("admin124", "admin123"));
    }

    #[test]
    fn test_legacy_matches() {
        assert!(legacy_matches("secret1", "secret1"));
        assert!(legacy_matches("", ""));
        assert!(!legacy_matches("secret2", "secret1"));
        assert!(!legacy_matches("Secret1", "secret1"));
        assert!(!legacy_matches("secret", "secret1"));
        assert!(!legacy_matches("secret1\0", "secret1"));
        assert!(legacy_matches("pässwörd", "pässwörd"));
        assert!(!legacy_matches("pässwörd", "passwörd"));
    }

    fn fastest<F: FnMut()>(mut run: F) -> Duration {
        (0..3)
            .map(|_| {
                let started = Instant::now();
                run();
                started.elapsed()
            })
            .min()
            .unwrap()
    }

    #[test]
    fn test_legacy_mismatch_costs_a_hash_check() {
        let hasher = CredentialHasher::new(&HashingConfig {
            memory_kib: 16 * 1024,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let hash = hasher.hash("secret1").unwrap();

        let hashed_miss = fastest(|| assert!(!hasher.verify("wrong", &hash)));
        let legacy_miss = fastest(|| assert!(!hasher.verify("wrong", "admin123")));

        assert!(
            legacy_miss * 4 >= hashed_miss,
            "legacy mismatch took {legacy_miss:?}, hashed mismatch {hashed_miss:?}"
        );
    }

    #[test]
    fn test_corrupt_phc_string_never_matches() {
        assert!(!hasher().verify("secret1", "$argon2id$garbage"));
    }

    #[test]
    fn test_dummy_verification_fails() {
        assert!(!hasher().verify_dummy("dummy-password-for-timing"));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let result = CredentialHasher::new(&HashingConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(result.is_err());
    }
}
