//! Password hashing with bcrypt.

/// Lowest cost bcrypt accepts. Only sensible in tests.
pub const MIN_COST: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Salted one-way hashing of credentials.
///
/// bcrypt is CPU bound, so both operations run on the blocking thread pool.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, 31),
        }
    }

    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let password = password.to_owned();
        let cost = self.cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
        Ok(hash)
    }

    /// Checks `password` against a stored hash.
    ///
    /// A malformed stored hash counts as a mismatch rather than an error, so
    /// that corrupt rows fail the same way a wrong password does.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        if hash.is_empty() {
            return Ok(false);
        }
        let password = password.to_owned();
        let hash = hash.to_owned();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await?
            .unwrap_or(false);
        Ok(matches)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_and_verify() {
        let hasher = PasswordHasher::new(MIN_COST);
        let hash = hasher.hash("admin123").await.unwrap();

        assert!(hash.starts_with("$2"));
        assert_ne!(hash, "admin123");
        assert!(hasher.verify("admin123", &hash).await.unwrap());
        assert!(!hasher.verify("admin124", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn hashes_are_salted() {
        let hasher = PasswordHasher::new(MIN_COST);
        let a = hasher.hash("student123").await.unwrap();
        let b = hasher.hash("student123").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn garbage_hash_is_a_mismatch() {
        let hasher = PasswordHasher::new(MIN_COST);
        assert!(!hasher.verify("x", "").await.unwrap());
        assert!(!hasher.verify("x", "not-a-bcrypt-hash").await.unwrap());
    }

    #[test]
    fn cost_is_clamped_to_bcrypt_range() {
        assert_eq!(PasswordHasher::new(1).cost, MIN_COST);
        assert_eq!(PasswordHasher::new(99).cost, 31);
    }
}
