//! Per-browser session state carried in a sealed client-side cookie.
//!
//! The request path is: cookie header -> `SessionSealer::open` -> `CookieSession` (the
//! `SessionStore` handlers and the auth context talk to) -> `SessionSealer::seal` ->
//! `Set-Cookie`, written only when something changed. The layer in `layer.rs` does the
//! plumbing; nothing else touches cookie bytes.

mod sealer;
mod cookie;
mod flash;
mod csrf;
mod layer;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use sealer::{SessionSealer, MIN_SECRET_LEN};
pub use cookie::{parse_cookie, session_cookie, cleared_session_cookie, CookieSettings};
pub use flash::{Flash, FlashKind, set_flash, take_flash};
pub use csrf::{csrf_token, verify_csrf, CSRF_HEADER, CSRF_KEY};
pub use layer::{session_layer, SessionConfig, SessionHandle};

/// Serialized payload ceiling; keeps the sealed cookie under the 4 KiB browser limit.
pub const MAX_PAYLOAD_BYTES: usize = 2800;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session payload too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },
    #[error("session serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("session secret must be at least {min} bytes, got {got}")]
    WeakSecret { min: usize, got: usize },
    #[error("entropy source failed: {0}")]
    Entropy(String),
    #[error("session cipher failed")]
    Cipher,
}

/// Scalar values a session may hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl SessionValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SessionValue::Int(i) => Some(*i),
            SessionValue::Text(s) => s.trim().parse().ok(),
            SessionValue::Bool(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SessionValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<i64> for SessionValue {
    fn from(v: i64) -> Self { SessionValue::Int(v) }
}

impl From<&str> for SessionValue {
    fn from(v: &str) -> Self { SessionValue::Text(v.to_string()) }
}

impl From<String> for SessionValue {
    fn from(v: String) -> Self { SessionValue::Text(v) }
}

impl From<bool> for SessionValue {
    fn from(v: bool) -> Self { SessionValue::Bool(v) }
}

/// Key/value contract the authentication layer relies on. Storage medium and crypto
/// are the implementor's business.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<SessionValue>;
    fn set(&mut self, key: &str, value: SessionValue) -> Result<(), SessionError>;
    fn delete(&mut self, key: &str);
}

/// In-memory view of one request's session, loaded from and written back to the cookie.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieSession {
    values: BTreeMap<String, SessionValue>,
    dirty: bool,
}

impl CookieSession {
    pub fn new() -> Self { Self::default() }

    pub(crate) fn from_values(values: BTreeMap<String, SessionValue>) -> Self {
        Self { values, dirty: false }
    }

    pub(crate) fn values(&self) -> &BTreeMap<String, SessionValue> { &self.values }

    /// True once any set/delete changed the contents during this request.
    pub fn is_dirty(&self) -> bool { self.dirty }

    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    pub fn len(&self) -> usize { self.values.len() }

    pub fn contains_key(&self, key: &str) -> bool { self.values.contains_key(key) }
}

impl SessionStore for CookieSession {
    fn get(&self, key: &str) -> Option<SessionValue> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: SessionValue) -> Result<(), SessionError> {
        let previous = self.values.insert(key.to_string(), value.clone());
        let size = serde_json::to_vec(&self.values)?.len();
        if size > MAX_PAYLOAD_BYTES {
            match previous {
                Some(p) => { self.values.insert(key.to_string(), p); }
                None => { self.values.remove(key); }
            }
            return Err(SessionError::TooLarge { size, limit: MAX_PAYLOAD_BYTES });
        }
        if previous.as_ref() != Some(&value) {
            self.dirty = true;
        }
        Ok(())
    }

    fn delete(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.dirty = true;
        }
    }
}
