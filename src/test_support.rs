//! Test doubles shared by unit tests.
//!
//! - [`FakeSessionStore`]: in-process axum server speaking the session
//!   endpoints with real cookies, for API-client and end-to-end tests.
//! - [`ScriptedApi`]: in-memory [`SessionApi`] whose answers are set per test.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::{AuthConfig, DEFAULT_SESSION_COOKIE};
use crate::error::AuthError;
use crate::net::api::{ApiClient, LOGOUT_PATH, SESSION_PATH, SIGN_IN_PATH, SIGN_UP_PATH, SessionApi};
use crate::net::types::{ErrorBody, SessionEnvelope, SignInRequest, SignUpRequest, User};

/// Build a user with only id, name and email set.
pub fn user(id: i64, name: &str, email: &str) -> User {
    User {
        id,
        name: Some(name.to_owned()),
        email: email.to_owned(),
        image_url: None,
        zip_code: None,
        bio: None,
        auth_method: Some("password".to_owned()),
        auth_id: None,
    }
}

// =============================================================================
// FAKE SESSION STORE
// =============================================================================

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
struct StoreInner {
    accounts: Vec<Account>,
    sessions: HashMap<String, i64>,
    next_token: u64,
    skip_cookie: bool,
    session_failure: Option<u16>,
    session_calls: usize,
}

/// Cookie-session server with in-memory accounts.
#[derive(Clone, Default)]
pub struct FakeSessionStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl FakeSessionStore {
    /// Register an account; ids are assigned from 1 in insertion order.
    #[must_use]
    pub fn with_account(self, name: &str, email: &str, password: &str) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            let id = i64::try_from(inner.accounts.len()).unwrap() + 1;
            inner.accounts.push(Account { user: user(id, name, email), password: password.to_owned() });
        }
        self
    }

    /// Invalidate every session server-side, as an expiry would.
    pub fn expire_sessions(&self) {
        self.inner.lock().unwrap().sessions.clear();
    }

    /// Answer sign-in/sign-up without setting the session cookie.
    pub fn skip_cookie(&self, skip: bool) {
        self.inner.lock().unwrap().skip_cookie = skip;
    }

    /// Make the session endpoint answer with this status instead.
    pub fn fail_session_with(&self, status: Option<u16>) {
        self.inner.lock().unwrap().session_failure = status;
    }

    pub fn session_calls(&self) -> usize {
        self.inner.lock().unwrap().session_calls
    }

    pub fn live_sessions(&self) -> usize {
        self.inner.lock().unwrap().sessions.len()
    }

    /// Bind to an ephemeral port and serve until the returned handle drops.
    pub async fn spawn(self) -> FakeServer {
        let app = Router::new()
            .route(SESSION_PATH, get(session_handler))
            .route(SIGN_IN_PATH, post(sign_in_handler))
            .route(SIGN_UP_PATH, post(sign_up_handler))
            .route(LOGOUT_PATH, post(logout_handler))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        FakeServer { base_url: format!("http://{addr}"), store: self, handle }
    }

    fn open_session(inner: &mut StoreInner, user_id: i64) -> String {
        inner.next_token += 1;
        let token = format!("tok-{}-{user_id}", inner.next_token);
        inner.sessions.insert(token.clone(), user_id);
        token
    }
}

/// Running fake server; aborts on drop.
pub struct FakeServer {
    pub base_url: String,
    pub store: FakeSessionStore,
    handle: JoinHandle<()>,
}

impl FakeServer {
    pub fn config(&self) -> AuthConfig {
        AuthConfig { base_url: self.base_url.clone(), ..AuthConfig::default() }
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.config()).unwrap()
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Base URL of a port nothing listens on.
pub async fn unreachable_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorBody { message: message.to_owned() })).into_response()
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((DEFAULT_SESSION_COOKIE, token)).path("/").http_only(true).build()
}

async fn session_handler(State(store): State<FakeSessionStore>, jar: CookieJar) -> Response {
    let mut inner = store.inner.lock().unwrap();
    inner.session_calls += 1;
    if let Some(status) = inner.session_failure {
        let status = StatusCode::from_u16(status).unwrap();
        return error_response(status, "session store unavailable");
    }

    let token = jar.get(DEFAULT_SESSION_COOKIE).map(Cookie::value).unwrap_or_default();
    let user = inner
        .sessions
        .get(token)
        .and_then(|id| inner.accounts.iter().find(|a| a.user.id == *id))
        .map(|a| a.user.clone());

    match user {
        Some(user) => Json(SessionEnvelope { user: Some(user) }).into_response(),
        None => error_response(StatusCode::UNAUTHORIZED, "Not authenticated"),
    }
}

async fn sign_in_handler(
    State(store): State<FakeSessionStore>,
    jar: CookieJar,
    Json(body): Json<SignInRequest>,
) -> Response {
    let mut inner = store.inner.lock().unwrap();
    let Some(user) = inner
        .accounts
        .iter()
        .find(|a| a.user.email == body.email && a.password == body.password)
        .map(|a| a.user.clone())
    else {
        return error_response(StatusCode::UNAUTHORIZED, "Invalid email or password");
    };

    let token = FakeSessionStore::open_session(&mut inner, user.id);
    let jar = if inner.skip_cookie { jar } else { jar.add(session_cookie(token)) };
    (jar, Json(SessionEnvelope { user: Some(user) })).into_response()
}

async fn sign_up_handler(
    State(store): State<FakeSessionStore>,
    jar: CookieJar,
    Json(body): Json<SignUpRequest>,
) -> Response {
    let mut inner = store.inner.lock().unwrap();
    if inner.accounts.iter().any(|a| a.user.email == body.email) {
        return error_response(StatusCode::BAD_REQUEST, "Email already in use");
    }
    if body.password.len() < 6 {
        return error_response(StatusCode::BAD_REQUEST, "Password must be at least 6 characters");
    }

    let id = i64::try_from(inner.accounts.len()).unwrap() + 1;
    let mut user = user(id, &body.name, &body.email);
    user.zip_code = Some(body.zip.clone());
    inner.accounts.push(Account { user: user.clone(), password: body.password.clone() });

    let token = FakeSessionStore::open_session(&mut inner, id);
    let jar = if inner.skip_cookie { jar } else { jar.add(session_cookie(token)) };
    (jar, Json(SessionEnvelope { user: Some(user) })).into_response()
}

async fn logout_handler(State(store): State<FakeSessionStore>, jar: CookieJar) -> Response {
    let mut inner = store.inner.lock().unwrap();
    if let Some(token) = jar.get(DEFAULT_SESSION_COOKIE).map(Cookie::value) {
        inner.sessions.remove(token);
    }
    let jar = jar.remove(Cookie::build(DEFAULT_SESSION_COOKIE).path("/"));
    (jar, StatusCode::OK).into_response()
}

// =============================================================================
// SCRIPTED API
// =============================================================================

/// [`SessionApi`] double with settable answers and call counters.
pub struct ScriptedApi {
    session: Mutex<Result<User, AuthError>>,
    sign_in: Mutex<Result<User, AuthError>>,
    sign_up: Mutex<Result<User, AuthError>>,
    logout: Mutex<Result<(), AuthError>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    session_calls: AtomicUsize,
    sign_in_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    forget_calls: AtomicUsize,
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self {
            session: Mutex::new(Err(AuthError::Unauthorized)),
            sign_in: Mutex::new(Err(AuthError::Validation { status: 401, message: "Invalid email or password".into() })),
            sign_up: Mutex::new(Err(AuthError::Validation { status: 400, message: "Email already in use".into() })),
            logout: Mutex::new(Ok(())),
            gate: Mutex::new(None),
            session_calls: AtomicUsize::new(0),
            sign_in_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            forget_calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_session(&self, answer: Result<User, AuthError>) {
        *self.session.lock().unwrap() = answer;
    }

    pub fn set_sign_in(&self, answer: Result<User, AuthError>) {
        *self.sign_in.lock().unwrap() = answer;
    }

    pub fn set_sign_up(&self, answer: Result<User, AuthError>) {
        *self.sign_up.lock().unwrap() = answer;
    }

    pub fn set_logout(&self, answer: Result<(), AuthError>) {
        *self.logout.lock().unwrap() = answer;
    }

    /// Block the next session call until the returned sender fires.
    ///
    /// The answer is read after the gate opens.
    pub fn hold_next_session(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn forget_calls(&self) -> usize {
        self.forget_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionApi for ScriptedApi {
    async fn session(&self) -> Result<User, AuthError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.session.lock().unwrap().clone()
    }

    async fn sign_in(&self, _request: &SignInRequest) -> Result<User, AuthError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        self.sign_in.lock().unwrap().clone()
    }

    async fn sign_up(&self, _request: &SignUpRequest) -> Result<User, AuthError> {
        self.sign_up.lock().unwrap().clone()
    }

    async fn logout(&self) -> Result<(), AuthError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.logout.lock().unwrap().clone()
    }

    fn forget_session(&self) {
        self.forget_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `cond` until it holds or a second passes.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    cond()
}
