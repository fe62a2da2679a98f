//! Session manager: the single source of truth for "who is logged in".
//!
//! Holds at most one [`SessionState`], persists every mutation through a
//! [`SessionStore`] and expires lazily: reads check `expires_at` against the
//! clock instead of running a timer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::models::auth::{Token, User};
use crate::models::session::{ActiveSession, SessionState};
use crate::storage::SessionStore;

/// Default session lifetime: 24 hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Store key the session snapshot lives under.
pub const SESSION_KEY: &str = "session";

pub struct SessionManager {
    store: SessionStore,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    state: Mutex<Option<SessionState>>,
}

/// Convert a TTL, falling back to [`DEFAULT_TTL`] for zero or out-of-range values.
fn ttl_delta(ttl: Duration) -> TimeDelta {
    match TimeDelta::from_std(ttl) {
        Ok(delta) if delta > TimeDelta::zero() => delta,
        _ => {
            warn!(?ttl, "invalid session ttl, using default");
            TimeDelta::from_std(DEFAULT_TTL).unwrap_or_else(|_| TimeDelta::hours(24))
        }
    }
}

impl SessionManager {
    /// Create a manager on the wall clock and restore any persisted session.
    pub fn new(store: SessionStore, ttl: Duration) -> Self {
        Self::with_clock(store, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(store: SessionStore, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let manager = Self {
            store,
            ttl: ttl_delta(ttl),
            clock,
            state: Mutex::new(None),
        };
        manager.restore();
        manager
    }

    /// `now + ttl`, saturating at the latest representable instant.
    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn lock(&self) -> MutexGuard<'_, Option<SessionState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn restore(&self) {
        let Some(saved) = self.store.get::<SessionState>(SESSION_KEY) else {
            return;
        };
        if saved.is_expired_at(self.clock.now()) {
            info!(user_id = %saved.user.id, "discarding expired persisted session");
            self.store.remove(SESSION_KEY);
            return;
        }
        debug!(user_id = %saved.user.id, "session restored");
        *self.lock() = Some(saved);
    }

    /// Lock the state, dropping it (and its persisted copy) if expired.
    fn live_state(&self) -> MutexGuard<'_, Option<SessionState>> {
        let mut state = self.lock();
        if state
            .as_ref()
            .is_some_and(|s| s.is_expired_at(self.clock.now()))
        {
            if let Some(expired) = state.take() {
                info!(user_id = %expired.user.id, "session expired");
            }
            self.store.remove(SESSION_KEY);
        }
        state
    }

    pub fn ttl(&self) -> Duration {
        self.ttl.to_std().unwrap_or(DEFAULT_TTL)
    }

    /// Start a new session, replacing any current one.
    pub fn start_session(&self, user: User, token: Token) -> ActiveSession {
        let now = self.clock.now();
        let session = SessionState {
            user,
            token,
            created_at: now,
            expires_at: self.expiry_from(now),
        };
        self.store.set(SESSION_KEY, &session);
        info!(user_id = %session.user.id, expires_at = %session.expires_at, "session started");
        let active = ActiveSession {
            user: session.user.clone(),
            token: session.token.clone(),
        };
        *self.lock() = Some(session);
        active
    }

    /// Copy of the current session, or `None` when absent or expired.
    pub fn get_session(&self) -> Option<ActiveSession> {
        self.live_state().as_ref().map(|s| ActiveSession {
            user: s.user.clone(),
            token: s.token.clone(),
        })
    }

    /// Full snapshot including timestamps.
    pub fn snapshot(&self) -> Option<SessionState> {
        self.live_state().clone()
    }

    /// Drop the session from memory and storage. Safe to call repeatedly.
    pub fn end_session(&self) {
        if let Some(ended) = self.lock().take() {
            info!(user_id = %ended.user.id, "session ended");
        }
        self.store.remove(SESSION_KEY);
    }

    pub fn is_active(&self) -> bool {
        self.live_state().is_some()
    }

    /// Push expiry to a full TTL from now. Returns false when no session is active.
    pub fn extend_session(&self) -> bool {
        let mut state = self.live_state();
        let Some(session) = state.as_mut() else {
            return false;
        };
        session.expires_at = self.expiry_from(self.clock.now());
        self.store.set(SESSION_KEY, &*session);
        debug!(user_id = %session.user.id, expires_at = %session.expires_at, "session extended");
        true
    }

    /// Time until expiry; zero when absent or expired.
    pub fn time_remaining(&self) -> Duration {
        let now = self.clock.now();
        self.live_state()
            .as_ref()
            .and_then(|s| (s.expires_at - now).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }
}
