//! Fixed registry of known principals.
//!
//! Passwords are held as SHA-256 digests; lookups compare digests.

use sha2::{Digest, Sha256};

use crate::models::auth::User;

#[derive(Debug, Clone)]
struct RegistryEntry {
    user: User,
    password_digest: String,
}

/// In-memory set of principals an authenticator can resolve credentials to.
#[derive(Debug, Clone, Default)]
pub struct CredentialRegistry {
    entries: Vec<RegistryEntry>,
}

/// SHA-256 hex digest of a password.
fn digest_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl CredentialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the two demo principals.
    pub fn with_demo_users() -> Self {
        Self::new()
            .with_user(
                User {
                    id: "1".into(),
                    email: "test@test.com".into(),
                    name: "Usuario Test".into(),
                },
                "123456",
            )
            .with_user(
                User {
                    id: "2".into(),
                    email: "admin@test.com".into(),
                    name: "Admin Test".into(),
                },
                "admin123",
            )
    }

    /// Add a principal. A later entry with the same email replaces the earlier one.
    pub fn with_user(mut self, user: User, password: &str) -> Self {
        self.entries.retain(|e| e.user.email != user.email);
        self.entries.push(RegistryEntry {
            user,
            password_digest: digest_password(password),
        });
        self
    }

    /// Resolve an email/password pair to a copy of the matching user.
    pub fn lookup(&self, email: &str, password: &str) -> Option<User> {
        let digest = digest_password(password);
        self.entries
            .iter()
            .find(|e| e.user.email == email && e.password_digest == digest)
            .map(|e| e.user.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
