use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::SET_COOKIE;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use parking_lot::{Mutex, MutexGuard};

use super::cookie::{cleared_session_cookie, parse_cookie, session_cookie, CookieSettings};
use super::sealer::SessionSealer;
use super::{CookieSession, SessionError};
use crate::error::AppError;

/// Everything the session layer needs; shared read-only across requests.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub sealer: SessionSealer,
    pub cookie: CookieSettings,
}

/// The current request's session, placed in request extensions by `session_layer`.
/// Handlers lock it, work synchronously and drop the guard before any `.await`.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle(Arc<Mutex<CookieSession>>);

impl SessionHandle {
    pub fn new(session: CookieSession) -> Self { Self(Arc::new(Mutex::new(session))) }

    pub fn lock(&self) -> MutexGuard<'_, CookieSession> { self.0.lock() }
}

/// Opens the request's session cookie, hands the session to the handler and writes it
/// back as `Set-Cookie` if the handler changed it. An emptied session clears the cookie,
/// as does a cookie that failed to authenticate and was not replaced.
pub async fn session_layer(State(config): State<Arc<SessionConfig>>, mut req: Request, next: Next) -> Response {
    let token = parse_cookie(req.headers(), &config.cookie.name);
    let had_cookie = token.is_some();
    let (session, rejected) = match token.map(|t| config.sealer.verify(&t)) {
        Some(Some(session)) => (session, false),
        Some(None) => (CookieSession::new(), true),
        None => (CookieSession::new(), false),
    };
    let handle = SessionHandle::new(session);
    req.extensions_mut().insert(handle.clone());

    let mut resp = next.run(req).await;

    let header = {
        let session = handle.lock();
        if session.is_empty() {
            if !had_cookie || !(session.is_dirty() || rejected) {
                return resp;
            }
            cleared_session_cookie(&config.cookie)
        } else if session.is_dirty() {
            match config.sealer.seal(&session) {
                Ok(token) => session_cookie(&config.cookie, &token),
                Err(e) => return seal_failure(e),
            }
        } else {
            return resp;
        }
    };
    match header {
        Some(v) => { resp.headers_mut().append(SET_COOKIE, v); }
        None => tracing::error!(target: "session", "session cookie is not a valid header value"),
    }
    resp
}

/// Sent after the handler ran; the client keeps its previous cookie.
fn seal_failure(err: SessionError) -> Response {
    tracing::error!(target: "session", "failed to seal session: {}", err);
    AppError::from(err).into_response()
}
