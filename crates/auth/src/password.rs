//! bcrypt credential hashing.

use anyhow::Context;

/// Hashes and verifies password credentials with bcrypt.
///
/// The cost defaults to the library default; tests lower it to keep the
/// suite fast.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, plaintext: &str) -> anyhow::Result<String> {
        bcrypt::hash(plaintext, self.cost).context("hashing password")
    }

    /// `false` for a mismatch; `Err` only when the stored hash is malformed.
    pub fn verify(&self, plaintext: &str, hash: &str) -> anyhow::Result<bool> {
        bcrypt::verify(plaintext, hash).context("verifying password")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_verifies() {
        let hasher = PasswordHasher::with_cost(4);
        let hash = hasher.hash("s3cret-pass").unwrap();
        assert_ne!(hash, "s3cret-pass");
        assert!(hasher.verify("s3cret-pass", &hash).unwrap());
    }

    #[test]
    fn wrong_password_does_not_verify() {
        let hasher = PasswordHasher::with_cost(4);
        let hash = hasher.hash("s3cret-pass").unwrap();
        assert!(!hasher.verify("wrong", &hash).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        let hasher = PasswordHasher::with_cost(4);
        let a = hasher.hash("s3cret-pass").unwrap();
        let b = hasher.hash("s3cret-pass").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_is_an_error() {
        let hasher = PasswordHasher::with_cost(4);
        assert!(hasher.verify("anything", "not-a-bcrypt-hash").is_err());
    }
}
