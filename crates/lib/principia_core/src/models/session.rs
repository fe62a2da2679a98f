//! Session and login boundary models.
//!
//! `SessionState` is the persisted record. The remaining types are what the
//! login use case hands to its caller; they serialize with camelCase keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::auth::{Token, User};

/// Persisted session snapshot.
///
/// Stored as `{user, token, createdAt, expiresAt}` with epoch-millisecond
/// timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub user: User,
    pub token: Token,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl SessionState {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Caller-owned copy of the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveSession {
    pub user: User,
    pub token: Token,
}

/// Result of `LoginUseCase::execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoginResult {
    pub fn succeeded(user: User) -> Self {
        Self {
            success: true,
            user: Some(user),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            user: None,
            error: Some(error.into()),
        }
    }
}

/// Result of `LoginUseCase::logout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogoutResult {
    pub success: bool,
}

/// Snapshot of authentication state for a UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub is_loading: bool,
}
