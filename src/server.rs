//!
//! sample_app HTTP server
//! ----------------------
//! Axum router for sign-up, user pages and password login.
//!
//! Responsibilities:
//! - Session cookie plumbing via `session::session_layer` (sealed, browser-session lifetime).
//! - CSRF check on every state-changing POST (`x-csrf-token` against the session token).
//! - Per-request `AuthContext` construction; nothing about the current user is cached
//!   beyond the handler that built it.
//! - JSON responses; redirects are `303 See Other`.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Extension, Form, Json, Router};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::AuthContext;
use crate::config::{Config, UserStoreKind};
use crate::error::{AppError, AppResult};
use crate::identity::{MemoryUserDirectory, ParquetUserDirectory, UserDirectory, UserId};
use crate::login::{self, Credentials, INVALID_LOGIN};
use crate::registration::{self, CreateOutcome};
use crate::session::{
    csrf_token, session_layer, take_flash, verify_csrf, CookieSettings, SessionConfig, SessionHandle,
    SessionSealer, SessionStore, CSRF_HEADER,
};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserDirectory>,
    pub sessions: Arc<SessionConfig>,
}

impl AppState {
    pub fn new(users: Arc<dyn UserDirectory>, sealer: SessionSealer, cookie: CookieSettings) -> Self {
        Self { users, sessions: Arc::new(SessionConfig { sealer, cookie }) }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/users/new", get(new_user))
        .route("/users", post(create_user))
        .route("/users/{id}", get(show_user))
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .layer(axum::middleware::from_fn_with_state(state.sessions.clone(), session_layer))
        .with_state(state)
}

fn log_startup(config: &Config) {
    let cwd = std::env::current_dir().ok();
    info!(
        target: "startup",
        "sample_app starting: cwd={:?}, db_folder={:?}, user_store={:?}, secure_cookies={}",
        cwd, config.db_folder, config.user_store, config.secure_cookies
    );
    if !config.session_secret_configured {
        warn!(target: "startup", "SAMPLE_APP_SESSION_SECRET is unset; using a per-process secret, sessions will not survive a restart");
    }
}

/// Start the HTTP server described by `config` and serve until the listener fails.
pub async fn run(config: Config) -> anyhow::Result<()> {
    log_startup(&config);

    let users: Arc<dyn UserDirectory> = match config.user_store {
        UserStoreKind::Parquet => Arc::new(
            ParquetUserDirectory::open(&config.db_folder)
                .with_context(|| format!("While opening user directory under: {}", config.db_folder))?,
        ),
        UserStoreKind::Memory => {
            warn!(target: "startup", "in-memory user store: accounts are lost on restart");
            Arc::new(MemoryUserDirectory::new())
        }
    };
    let sealer = SessionSealer::new(&config.session_secret).context("While preparing the session sealer")?;
    let cookie = CookieSettings { secure: config.secure_cookies, ..CookieSettings::default() };
    let app = router(AppState::new(users, sealer, cookie));

    let addr = config.socket_addr();
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn require_csrf(session: &dyn SessionStore, headers: &HeaderMap) -> AppResult<()> {
    let provided = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());
    if verify_csrf(session, provided) {
        Ok(())
    } else {
        warn!(target: "session", "rejected request without a valid CSRF token");
        Err(AppError::csrf("invalid_csrf", "missing or invalid CSRF token"))
    }
}

async fn root(State(state): State<AppState>, Extension(handle): Extension<SessionHandle>) -> AppResult<Json<Value>> {
    let mut session = handle.lock();
    let flash = take_flash(&mut *session);
    let mut auth = AuthContext::new(&mut *session, &*state.users);
    let current = auth.current_user()?.cloned();
    Ok(Json(json!({
        "status": "ok",
        "logged_in": current.is_some(),
        "current_user": current,
        "flash": flash,
    })))
}

async fn new_user(Extension(handle): Extension<SessionHandle>) -> AppResult<Json<Value>> {
    let mut session = handle.lock();
    let token = csrf_token(&mut *session)?;
    Ok(Json(json!({"status": "ok", "user": registration::show_new_form(), "csrf_token": token})))
}

async fn create_user(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
    headers: HeaderMap,
    SignupSubmission(fields): SignupSubmission,
) -> AppResult<Response> {
    let mut session = handle.lock();
    require_csrf(&*session, &headers)?;
    let mut auth = AuthContext::new(&mut *session, &*state.users);
    match registration::create(&mut auth, &fields)? {
        CreateOutcome::Created { location, .. } => Ok(Redirect::to(&location).into_response()),
        CreateOutcome::Invalid { form, .. } => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"status": "invalid", "user": form})),
        ).into_response()),
    }
}

async fn show_user(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<Value>> {
    // non-numeric ids are simply ids that do not exist
    let id: UserId = raw_id
        .parse()
        .map_err(|_| AppError::not_found("user_not_found".to_string(), format!("no user with id {}", raw_id)))?;
    let user = registration::show(&*state.users, id)?;

    let mut session = handle.lock();
    let flash = take_flash(&mut *session);
    let mut auth = AuthContext::new(&mut *session, &*state.users);
    let current = auth.current_user()?.cloned();
    Ok(Json(json!({
        "status": "ok",
        "user": user,
        "flash": flash,
        "logged_in": current.is_some(),
        "current_user": current,
    })))
}

async fn login_handler(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
    headers: HeaderMap,
    Json(credentials): Json<Credentials>,
) -> AppResult<Response> {
    let mut session = handle.lock();
    require_csrf(&*session, &headers)?;
    let mut auth = AuthContext::new(&mut *session, &*state.users);
    match login::attempt(&mut auth, &credentials)? {
        Some(user) => Ok(Redirect::to(&registration::user_path(user.id)).into_response()),
        None => Err(AppError::auth("invalid_credentials", INVALID_LOGIN)),
    }
}

async fn logout_handler(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
    headers: HeaderMap,
) -> AppResult<Redirect> {
    let mut session = handle.lock();
    require_csrf(&*session, &headers)?;
    let mut auth = AuthContext::new(&mut *session, &*state.users);
    login::log_out(&mut auth);
    Ok(Redirect::to("/"))
}

/// Sign-up fields scoped under `user`: a JSON object `{"user": {...}}` or a form body
/// with `user[name]=..` style keys. Only scalar values are taken.
pub struct SignupSubmission(pub BTreeMap<String, String>);

impl<S: Send + Sync> FromRequest<S> for SignupSubmission {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);
        let fields = if is_json {
            let Json(body) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|e| AppError::user("bad_request".to_string(), e.body_text()))?;
            user_scope_from_json(&body)
        } else {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| AppError::user("bad_request".to_string(), e.body_text()))?;
            user_scope_from_pairs(pairs)
        };
        if fields.is_empty() {
            return Err(AppError::user("param_missing", "param is missing or the value is empty: user"));
        }
        Ok(SignupSubmission(fields))
    }
}

fn user_scope_from_json(body: &Value) -> BTreeMap<String, String> {
    let Some(obj) = body.get("user").and_then(|v| v.as_object()) else { return BTreeMap::new(); };
    obj.iter()
        .filter_map(|(k, v)| {
            let s = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((k.clone(), s))
        })
        .collect()
}

fn user_scope_from_pairs(pairs: Vec<(String, String)>) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .filter_map(|(k, v)| {
            let field = k.strip_prefix("user[")?.strip_suffix(']')?;
            Some((field.to_string(), v))
        })
        .collect()
}
