//! Credential authenticator: verifies credentials against a registry and
//! mints opaque session tokens.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{debug, info};

use super::registry::CredentialRegistry;
use super::{AuthError, require_non_empty};
use crate::models::auth::{AuthResult, Authenticated, Credentials, Token};

/// Default simulated lookup latency.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(500);

/// Length of the random token suffix.
const TOKEN_SUFFIX_LEN: usize = 16;

/// Verifies credentials and tracks the set of currently valid tokens.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Verify credentials. Never panics on bad input; failures are `Err` values.
    async fn authenticate(&self, credentials: &Credentials) -> AuthResult;

    /// True iff the token is currently in the valid set.
    fn validate_token(&self, token: &Token) -> bool;

    /// Swap `old` for a newly minted token. `UnknownToken` if `old` is not valid.
    fn refresh_token(&self, old: &Token) -> Result<Token, AuthError>;

    /// Drop a token from the valid set. Returns whether it was present.
    fn revoke_token(&self, token: &Token) -> bool;
}

/// Registry-backed authenticator with a simulated lookup delay.
pub struct CredentialAuthenticator {
    registry: CredentialRegistry,
    /// Valid tokens, mapped to the id of the principal they were issued to.
    valid_tokens: DashMap<Token, String>,
    latency: Duration,
}

impl CredentialAuthenticator {
    pub fn new(registry: CredentialRegistry) -> Self {
        Self {
            registry,
            valid_tokens: DashMap::new(),
            latency: DEFAULT_LATENCY,
        }
    }

    /// Set the simulated lookup latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of tokens currently considered valid.
    pub fn active_tokens(&self) -> usize {
        self.valid_tokens.len()
    }

    fn issue_token(&self, user_id: &str) -> Token {
        let suffix: String = rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_SUFFIX_LEN)
            .map(char::from)
            .collect();
        let token = Token::new(format!(
            "tok_{user_id}_{}_{suffix}",
            Utc::now().timestamp_millis()
        ));
        self.valid_tokens.insert(token.clone(), user_id.to_string());
        token
    }
}

impl Default for CredentialAuthenticator {
    fn default() -> Self {
        Self::new(CredentialRegistry::with_demo_users())
    }
}

#[async_trait]
impl Authenticator for CredentialAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> AuthResult {
        require_non_empty(credentials)?;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let Some(user) = self
            .registry
            .lookup(&credentials.email, &credentials.password)
        else {
            debug!(email = %credentials.email, "credentials rejected");
            return Err(AuthError::InvalidCredentials);
        };

        let token = self.issue_token(&user.id);
        info!(user_id = %user.id, token = token.fingerprint(), "authenticated");
        Ok(Authenticated { user, token })
    }

    fn validate_token(&self, token: &Token) -> bool {
        self.valid_tokens.contains_key(token)
    }

    fn refresh_token(&self, old: &Token) -> Result<Token, AuthError> {
        let (_, user_id) = self
            .valid_tokens
            .remove(old)
            .ok_or(AuthError::UnknownToken)?;
        let token = self.issue_token(&user_id);
        debug!(user_id = %user_id, token = token.fingerprint(), "token refreshed");
        Ok(token)
    }

    fn revoke_token(&self, token: &Token) -> bool {
        let removed = self.valid_tokens.remove(token).is_some();
        if removed {
            debug!(token = token.fingerprint(), "token revoked");
        }
        removed
    }
}
