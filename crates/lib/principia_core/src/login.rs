//! Login use case: the one entry point a UI layer talks to.
//!
//! Wraps an [`Authenticator`] and a [`SessionManager`] behind `execute`,
//! `logout`, `refresh` and `get_auth_state`. Nothing raised by a collaborator
//! escapes: failures, including panics, come back as result values.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::auth::authenticator::{Authenticator, CredentialAuthenticator};
use crate::auth::registry::CredentialRegistry;
use crate::auth::{AuthError, validate_credentials};
use crate::config::LoginConfig;
use crate::models::auth::{Authenticated, Credentials, User};
use crate::models::session::{AuthState, LoginResult, LogoutResult};
use crate::session::SessionManager;
use crate::storage::{SessionStore, StorageBackend};

/// Clears the in-progress flag when a login attempt finishes, however it finishes.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Turn a caught panic payload into an `Unexpected` error.
fn panic_to_error(payload: Box<dyn Any + Send>) -> AuthError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected error".to_string()
    };
    error!(error = %message, "collaborator panicked");
    AuthError::Unexpected(message)
}

/// Run a synchronous collaborator call, converting a panic into an error.
fn guarded<T>(f: impl FnOnce() -> Result<T, AuthError>) -> Result<T, AuthError> {
    catch_unwind(AssertUnwindSafe(f)).map_err(panic_to_error)?
}

pub struct LoginUseCase {
    authenticator: Arc<dyn Authenticator>,
    sessions: Arc<SessionManager>,
    in_progress: AtomicBool,
}

impl LoginUseCase {
    pub fn new(authenticator: Arc<dyn Authenticator>, sessions: Arc<SessionManager>) -> Self {
        Self {
            authenticator,
            sessions,
            in_progress: AtomicBool::new(false),
        }
    }

    /// Wire the demo registry, the configured TTL and latency, and a session
    /// store over `backend`.
    pub fn from_config(config: &LoginConfig, backend: Arc<dyn StorageBackend>) -> Self {
        let authenticator = CredentialAuthenticator::new(CredentialRegistry::with_demo_users())
            .with_latency(config.auth_latency);
        let store = SessionStore::new(backend, config.store_namespace.clone());
        let sessions = SessionManager::new(store, config.session_ttl);
        Self::new(Arc::new(authenticator), Arc::new(sessions))
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }

    fn begin(&self) -> Option<InFlight<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.in_progress))
    }

    /// Log in with email + password. A call made while another login is in
    /// flight is rejected without reaching the authenticator.
    pub async fn execute(&self, email: &str, password: &str) -> LoginResult {
        let Some(_in_flight) = self.begin() else {
            debug!("login rejected: another attempt is in flight");
            return LoginResult::failed(AuthError::LoginInProgress.to_string());
        };

        match self.login(Credentials::new(email, password)).await {
            Ok(user) => LoginResult::succeeded(user),
            Err(e) => {
                debug!(error = %e, "login failed");
                LoginResult::failed(e.to_string())
            }
        }
    }

    async fn login(&self, credentials: Credentials) -> Result<User, AuthError> {
        validate_credentials(&credentials)?;

        let Authenticated { user, token } =
            AssertUnwindSafe(self.authenticator.authenticate(&credentials))
                .catch_unwind()
                .await
                .map_err(panic_to_error)??;

        let active = guarded(|| {
            if let Some(previous) = self.sessions.get_session() {
                self.authenticator.revoke_token(&previous.token);
            }
            Ok(self.sessions.start_session(user, token))
        })?;
        info!(user_id = %active.user.id, "login succeeded");
        Ok(active.user)
    }

    /// End the current session and revoke its token at the authenticator.
    pub fn logout(&self) -> LogoutResult {
        let outcome = guarded(|| {
            let token = self.sessions.get_session().map(|s| s.token);
            self.sessions.end_session();
            if let Some(token) = token {
                self.authenticator.revoke_token(&token);
            }
            Ok(())
        });
        match outcome {
            Ok(()) => LogoutResult { success: true },
            Err(e) => {
                warn!(error = %e, "logout failed");
                LogoutResult { success: false }
            }
        }
    }

    /// Rotate the current session's token and restart its TTL.
    pub fn refresh(&self) -> LoginResult {
        let Some(_in_flight) = self.begin() else {
            return LoginResult::failed(AuthError::LoginInProgress.to_string());
        };

        let refreshed = guarded(|| {
            let current = self
                .sessions
                .get_session()
                .ok_or_else(|| AuthError::InvalidInput("no active session".into()))?;
            let token = self.authenticator.refresh_token(&current.token)?;
            Ok(self.sessions.start_session(current.user, token))
        });
        match refreshed {
            Ok(active) => {
                debug!(user_id = %active.user.id, "session refreshed");
                LoginResult::succeeded(active.user)
            }
            Err(e) => LoginResult::failed(e.to_string()),
        }
    }

    /// Current authentication state plus whether a login is in flight.
    pub fn get_auth_state(&self) -> AuthState {
        let user = self.sessions.get_session().map(|s| s.user);
        AuthState {
            is_authenticated: user.is_some(),
            user,
            is_loading: self.in_progress.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::models::auth::{AuthResult, Token};

    const HOUR: Duration = Duration::from_secs(3600);

    fn fast_authenticator() -> CredentialAuthenticator {
        CredentialAuthenticator::default().with_latency(Duration::ZERO)
    }

    fn sessions() -> Arc<SessionManager> {
        Arc::new(SessionManager::new(SessionStore::in_memory("test_"), HOUR))
    }

    /// Holds each authenticate call until released, counting calls.
    struct GatedAuthenticator {
        inner: CredentialAuthenticator,
        calls: AtomicU32,
        entered: Notify,
        release: Notify,
    }

    impl GatedAuthenticator {
        fn new() -> Self {
            Self {
                inner: fast_authenticator(),
                calls: AtomicU32::new(0),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl Authenticator for GatedAuthenticator {
        async fn authenticate(&self, credentials: &Credentials) -> AuthResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.authenticate(credentials).await
        }

        fn validate_token(&self, token: &Token) -> bool {
            self.inner.validate_token(token)
        }

        fn refresh_token(&self, old: &Token) -> Result<Token, AuthError> {
            self.inner.refresh_token(old)
        }

        fn revoke_token(&self, token: &Token) -> bool {
            self.inner.revoke_token(token)
        }
    }

    /// Panics from every operation.
    struct PanickingAuthenticator;

    #[async_trait]
    impl Authenticator for PanickingAuthenticator {
        async fn authenticate(&self, _credentials: &Credentials) -> AuthResult {
            panic!("directory offline");
        }

        fn validate_token(&self, _token: &Token) -> bool {
            panic!("directory offline");
        }

        fn refresh_token(&self, _old: &Token) -> Result<Token, AuthError> {
            panic!("directory offline");
        }

        fn revoke_token(&self, _token: &Token) -> bool {
            panic!("directory offline");
        }
    }

    #[tokio::test]
    async fn successful_login_starts_session() {
        let uc = LoginUseCase::new(Arc::new(fast_authenticator()), sessions());
        let result = uc.execute("test@test.com", "123456").await;
        assert!(result.success);
        assert_eq!(result.user.as_ref().unwrap().name, "Usuario Test");
        assert!(uc.sessions().is_active());
        let state = uc.get_auth_state();
        assert!(state.is_authenticated);
        assert!(!state.is_loading);
        assert_eq!(state.user, result.user);
    }

    #[tokio::test]
    async fn bad_credentials_pass_error_through() {
        let uc = LoginUseCase::new(Arc::new(fast_authenticator()), sessions());
        let result = uc.execute("bad@test.com", "wrong").await;
        assert_eq!(result, LoginResult::failed("Credenciales inválidas"));
        assert!(!uc.sessions().is_active());
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_authenticator() {
        let auth = Arc::new(GatedAuthenticator::new());
        let uc = LoginUseCase::new(auth.clone(), sessions());

        let result = uc.execute("not-an-email", "123456").await;
        assert_eq!(result.error.as_deref(), Some("invalid email format"));
        let result = uc.execute("test@test.com", "").await;
        assert_eq!(
            result.error.as_deref(),
            Some("email and password are required")
        );
        assert_eq!(auth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn overlapping_login_is_rejected() {
        let auth = Arc::new(GatedAuthenticator::new());
        let uc = Arc::new(LoginUseCase::new(auth.clone(), sessions()));

        let first = tokio::spawn({
            let uc = uc.clone();
            async move { uc.execute("test@test.com", "123456").await }
        });
        auth.entered.notified().await;

        assert!(uc.get_auth_state().is_loading);
        let second = uc.execute("test@test.com", "123456").await;
        assert_eq!(second, LoginResult::failed("login in progress"));
        assert_eq!(uc.refresh(), LoginResult::failed("login in progress"));
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);

        auth.release.notify_one();
        let first = first.await.unwrap();
        assert!(first.success);
        assert!(!uc.get_auth_state().is_loading);
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_authenticator_becomes_failure() {
        let uc = LoginUseCase::new(Arc::new(PanickingAuthenticator), sessions());
        let result = uc.execute("test@test.com", "123456").await;
        assert_eq!(result, LoginResult::failed("directory offline"));
        assert!(!uc.get_auth_state().is_loading);

        // The guard was released, so a retry reaches the authenticator again.
        let retry = uc.execute("test@test.com", "123456").await;
        assert_eq!(retry.error.as_deref(), Some("directory offline"));
    }

    #[tokio::test]
    async fn logout_ends_session_and_revokes_token() {
        let auth = Arc::new(fast_authenticator());
        let uc = LoginUseCase::new(auth.clone(), sessions());
        uc.execute("test@test.com", "123456").await;
        let token = uc.sessions().get_session().unwrap().token;
        assert!(auth.validate_token(&token));

        assert_eq!(uc.logout(), LogoutResult { success: true });
        assert!(!uc.sessions().is_active());
        assert!(!auth.validate_token(&token));
        assert_eq!(uc.logout(), LogoutResult { success: true });
    }

    #[tokio::test]
    async fn relogin_revokes_replaced_session_token() {
        let auth = Arc::new(fast_authenticator());
        let uc = LoginUseCase::new(auth.clone(), sessions());
        assert!(uc.execute("test@test.com", "123456").await.success);
        let first = uc.sessions().get_session().unwrap().token;

        assert!(uc.execute("admin@test.com", "admin123").await.success);
        assert!(!auth.validate_token(&first));
        assert_eq!(auth.active_tokens(), 1);

        assert!(uc.logout().success);
        assert_eq!(auth.active_tokens(), 0);
    }

    #[tokio::test]
    async fn login_flow_survives_failing_storage() {
        let store = SessionStore::new(Arc::new(crate::storage::BrokenBackend), "test_");
        let sessions = Arc::new(SessionManager::new(store, HOUR));
        let uc = LoginUseCase::new(Arc::new(fast_authenticator()), sessions);

        assert!(uc.execute("test@test.com", "123456").await.success);
        assert!(uc.get_auth_state().is_authenticated);
        assert!(uc.refresh().success);
        assert!(uc.logout().success);
        assert!(!uc.get_auth_state().is_authenticated);
    }

    #[test]
    fn logout_reports_failure_when_collaborator_panics() {
        let sessions = sessions();
        let uc = LoginUseCase::new(Arc::new(PanickingAuthenticator), sessions.clone());
        sessions.start_session(
            User {
                id: "1".into(),
                email: "test@test.com".into(),
                name: "Usuario Test".into(),
            },
            Token::new("t1"),
        );
        assert_eq!(uc.logout(), LogoutResult { success: false });
        assert!(!sessions.is_active());
    }

    #[tokio::test]
    async fn refresh_rotates_session_token() {
        let auth = Arc::new(fast_authenticator());
        let uc = LoginUseCase::new(auth.clone(), sessions());
        uc.execute("admin@test.com", "admin123").await;
        let old = uc.sessions().get_session().unwrap().token;

        let result = uc.refresh();
        assert!(result.success);
        let new = uc.sessions().get_session().unwrap().token;
        assert_ne!(old, new);
        assert!(!auth.validate_token(&old));
        assert!(auth.validate_token(&new));
    }

    #[test]
    fn refresh_without_session_fails() {
        let uc = LoginUseCase::new(Arc::new(fast_authenticator()), sessions());
        assert_eq!(uc.refresh(), LoginResult::failed("no active session"));
    }

    #[test]
    fn refresh_of_token_unknown_to_authenticator_fails() {
        let sessions = sessions();
        let uc = LoginUseCase::new(Arc::new(fast_authenticator()), sessions.clone());
        let user = User {
            id: "1".into(),
            email: "test@test.com".into(),
            name: "Usuario Test".into(),
        };
        sessions.start_session(user, Token::new("restored-elsewhere"));
        assert_eq!(uc.refresh(), LoginResult::failed("unknown token"));
        assert!(sessions.is_active());
    }

    #[test]
    fn from_config_wires_configured_namespace() {
        let backend = Arc::new(crate::storage::MemoryBackend::new());
        let config = LoginConfig {
            store_namespace: "cfg_".into(),
            auth_latency: Duration::ZERO,
            ..LoginConfig::default()
        };
        let uc = LoginUseCase::from_config(&config, backend.clone());
        uc.sessions().start_session(
            User {
                id: "1".into(),
                email: "test@test.com".into(),
                name: "Usuario Test".into(),
            },
            Token::new("t1"),
        );
        assert_eq!(backend.keys().unwrap(), vec!["cfg_session".to_string()]);
    }
}
