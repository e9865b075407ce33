//! The authoritative auth context.
//!
//! DESIGN
//! ======
//! One `AuthContext` is built at the application root and handed to every
//! consumer by cloning the handle. State lives in a `watch` channel so
//! consumers can either read a snapshot or subscribe to changes.
//!
//! CONSISTENCY
//! ===========
//! Every voluntary identity write (sign-in, sign-up, sign-out) bumps a
//! monotonic epoch. A session check, including the one that confirms a
//! sign-in, remembers the epoch it started under and its answer is discarded
//! if the epoch moved while it was in flight. A slow check can never
//! resurrect a user who just signed out. Writes take the control lock for
//! the compare-and-write only, never across an `.await`. Between separate
//! processes the rule is last-write-wins.
//!
//! ERROR HANDLING
//! ==============
//! Sign-in and sign-up rejections return to the caller and leave state
//! alone. A confirmation that finds no session resolves to anonymous.
//! Session-check errors are absorbed: 401 evicts, transient failures keep a
//! known user. Logout errors are logged and never block the local sign-out.

#[cfg(test)]
#[path = "context_test.rs"]
mod context_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::SignInConfirmation;
use crate::error::AuthError;
use crate::net::api::SessionApi;
use crate::net::types::{SignInRequest, SignUpRequest, User};
use crate::state::auth::AuthState;
use crate::state::cache::SessionCache;

#[derive(Debug, Default)]
struct Control {
    epoch: u64,
    in_flight: usize,
}

struct Inner {
    api: Arc<dyn SessionApi>,
    state: watch::Sender<AuthState>,
    control: Mutex<Control>,
    cache: SessionCache,
    confirmation: SignInConfirmation,
}

/// What a finished session check did to the state.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CheckOutcome {
    /// A voluntary write happened while the check was in flight.
    Stale,
    Confirmed { user_id: i64, identity_changed: bool },
    Anonymous { evicted: Option<i64> },
    /// Transient failure; the previous user (if any) was kept.
    Kept(AuthError),
}

/// What a finished sign-in confirmation did to the state.
#[derive(Debug)]
enum Confirmation {
    Superseded,
    Confirmed { user: User, identity_changed: bool },
    /// The server accepted the credentials but reports no session.
    Missing { evicted: Option<i64> },
    Failed(AuthError),
}

/// Shared handle to the current user and the operations that change it.
#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<Inner>,
}

/// Non-owning handle used by background tasks so they never keep a
/// dropped context alive.
#[derive(Clone)]
pub struct WeakAuthContext {
    inner: Weak<Inner>,
}

impl WeakAuthContext {
    #[must_use]
    pub fn upgrade(&self) -> Option<AuthContext> {
        self.inner.upgrade().map(|inner| AuthContext { inner })
    }
}

impl AuthContext {
    /// Build a context that awaits session confirmation after sign-in.
    #[must_use]
    pub fn new(api: Arc<dyn SessionApi>) -> Self {
        Self::with_confirmation(api, SignInConfirmation::Await)
    }

    #[must_use]
    pub fn with_confirmation(api: Arc<dyn SessionApi>, confirmation: SignInConfirmation) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            inner: Arc::new(Inner {
                api,
                state,
                control: Mutex::new(Control::default()),
                cache: SessionCache::default(),
                confirmation,
            }),
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user().cloned()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    #[must_use]
    pub fn is_initializing(&self) -> bool {
        self.inner.state.borrow().is_initializing()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Derived data scoped to the current session.
    #[must_use]
    pub fn cache(&self) -> &SessionCache {
        &self.inner.cache
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakAuthContext {
        WeakAuthContext { inner: Arc::downgrade(&self.inner) }
    }

    /// Wait until the first session check has resolved.
    pub async fn ready(&self) -> AuthState {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| !state.is_initializing()).await {
            Ok(state) => state.clone(),
            Err(_) => self.snapshot(),
        }
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// First session check, run once at startup.
    pub async fn initialize(&self) -> AuthState {
        self.refresh_auth().await
    }

    /// Re-validate the session against the server.
    ///
    /// A user answer sets the user; 401 clears it; transient failures keep
    /// whatever was known. Always resolves the initializing flag.
    pub async fn refresh_auth(&self) -> AuthState {
        let started = self.begin_request();
        let result = self.inner.api.session().await;

        match self.end_check(started, result) {
            CheckOutcome::Stale => debug!(started, "discarding stale session check"),
            CheckOutcome::Confirmed { user_id, identity_changed: true } => info!(user_id, "session established"),
            CheckOutcome::Confirmed { .. } => debug!("session confirmed"),
            CheckOutcome::Anonymous { evicted: Some(user_id) } => info!(user_id, "session expired"),
            CheckOutcome::Anonymous { evicted: None } => debug!("no session"),
            CheckOutcome::Kept(e) => warn!(error = %e, "session check failed; keeping current state"),
        }

        self.snapshot()
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns the server's rejection (e.g. [`AuthError::Validation`]) or a
    /// network error without touching state, or
    /// [`AuthError::SessionNotEstablished`] if the server accepted the
    /// credentials but the follow-up check saw no session, or
    /// [`AuthError::Superseded`] if a sign-out landed while confirming.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let request = SignInRequest::new(email, password);
        let payload = self
            .inner
            .api
            .sign_in(&request)
            .await
            .inspect_err(|e| debug!(status = ?e.status(), error = %e, "sign-in rejected"))?;
        self.establish(payload).await
    }

    /// Create an account and sign in as it.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::sign_in`].
    pub async fn sign_up(&self, name: &str, email: &str, password: &str, zip: &str) -> Result<User, AuthError> {
        let request = SignUpRequest::new(name, email, password, zip);
        let payload = self
            .inner
            .api
            .sign_up(&request)
            .await
            .inspect_err(|e| debug!(status = ?e.status(), error = %e, "sign-up rejected"))?;
        self.establish(payload).await
    }

    /// Invalidate the session server-side (best effort) and clear local state.
    pub async fn sign_out(&self) {
        if let Err(e) = self.inner.api.logout().await {
            warn!(error = %e, "logout request failed; clearing local session anyway");
        }
        self.inner.api.forget_session();

        let previous = self.locked(false, |control, state| {
            control.epoch += 1;
            let previous = state.user().map(|u| u.id);
            state.set_user(None);
            previous
        });
        self.inner.cache.clear();

        if let Some(user_id) = previous {
            info!(user_id, "signed out");
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    async fn establish(&self, payload: User) -> Result<User, AuthError> {
        match self.inner.confirmation {
            SignInConfirmation::Await => self.confirm(payload).await,
            SignInConfirmation::Deferred(delay) => {
                self.commit(payload.clone());
                let weak = self.downgrade();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(ctx) = weak.upgrade() {
                        ctx.refresh_auth().await;
                    }
                });
                Ok(payload)
            }
        }
    }

    /// Await the authoritative session check before resolving a sign-in.
    ///
    /// The check is epoch-guarded like any other: if a sign-out or another
    /// sign-in lands while it is in flight, nothing is written.
    async fn confirm(&self, payload: User) -> Result<User, AuthError> {
        let started = self.begin_request();
        let answer = match self.inner.api.session().await {
            Ok(user) => Ok(user),
            Err(AuthError::Unauthorized) => Err(AuthError::SessionNotEstablished),
            Err(e) if e.is_transient() => {
                warn!(error = %e, user_id = payload.id, "session confirmation failed; using sign-in response");
                Ok(payload)
            }
            Err(e) => Err(e),
        };

        let outcome = self.locked(true, |control, state| {
            if control.epoch != started {
                return Confirmation::Superseded;
            }
            match answer {
                Ok(user) => {
                    control.epoch += 1;
                    let identity_changed = state.set_user(Some(user.clone()));
                    Confirmation::Confirmed { user, identity_changed }
                }
                Err(AuthError::SessionNotEstablished) => {
                    let evicted = state.user().map(|u| u.id);
                    state.set_user(None);
                    Confirmation::Missing { evicted }
                }
                Err(e) => {
                    state.finish_initializing();
                    Confirmation::Failed(e)
                }
            }
        });

        match outcome {
            Confirmation::Superseded => {
                debug!(started, "sign-in superseded while confirming");
                Err(AuthError::Superseded)
            }
            Confirmation::Confirmed { user, identity_changed } => {
                if identity_changed {
                    self.inner.cache.clear();
                    info!(user_id = user.id, "signed in");
                }
                Ok(user)
            }
            Confirmation::Missing { evicted } => {
                if evicted.is_some() {
                    self.inner.cache.clear();
                }
                warn!(previous = ?evicted, "sign-in accepted but no session cookie was stored");
                Err(AuthError::SessionNotEstablished)
            }
            Confirmation::Failed(e) => {
                warn!(status = ?e.status(), error = %e, "session confirmation rejected");
                Err(e)
            }
        }
    }

    /// Voluntary identity write: bumps the epoch so in-flight checks go stale.
    fn commit(&self, user: User) {
        let user_id = user.id;
        let identity_changed = self.locked(false, |control, state| {
            control.epoch += 1;
            state.set_user(Some(user))
        });
        if identity_changed {
            self.inner.cache.clear();
            info!(user_id, "signed in");
        }
    }

    fn begin_request(&self) -> u64 {
        let mut control = self.control();
        control.in_flight += 1;
        self.inner.state.send_if_modified(|state| {
            let was_loading = state.is_loading();
            state.set_loading(true);
            !was_loading
        });
        control.epoch
    }

    fn end_check(&self, started: u64, result: Result<User, AuthError>) -> CheckOutcome {
        let outcome = self.locked(true, |control, state| {
            if control.epoch != started {
                return CheckOutcome::Stale;
            }
            match result {
                Ok(user) => {
                    let user_id = user.id;
                    let identity_changed = state.set_user(Some(user));
                    CheckOutcome::Confirmed { user_id, identity_changed }
                }
                Err(AuthError::Unauthorized) => {
                    let evicted = state.user().map(|u| u.id);
                    state.set_user(None);
                    CheckOutcome::Anonymous { evicted }
                }
                Err(e) => {
                    state.finish_initializing();
                    CheckOutcome::Kept(e)
                }
            }
        });

        if matches!(
            outcome,
            CheckOutcome::Confirmed { identity_changed: true, .. } | CheckOutcome::Anonymous { evicted: Some(_) }
        ) {
            self.inner.cache.clear();
        }
        outcome
    }

    /// Run a state write under the control lock and publish it if it changed.
    ///
    /// `release` ends one in-flight request before the write.
    fn locked<R>(&self, release: bool, write: impl FnOnce(&mut Control, &mut AuthState) -> R) -> R {
        let mut control = self.control();
        if release {
            control.in_flight = control.in_flight.saturating_sub(1);
        }

        let mut next = self.inner.state.borrow().clone();
        next.set_loading(control.in_flight > 0);
        let out = write(&mut control, &mut next);

        self.inner.state.send_if_modified(move |current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        out
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.inner.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
