use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};

use super::{CookieSession, SessionError, SessionValue};

pub const MIN_SECRET_LEN: usize = 32;

const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const KEY_CONTEXT: &str = "sample_app 2026-10 session cookie key";
/// Bound into every tag so tokens minted for another purpose never open as sessions.
const AAD: &[u8] = b"sample_app session v1";

/// XChaCha20-Poly1305 codec for session cookies.
///
/// token = base64url(nonce || ciphertext || tag) over the JSON payload. The AEAD key is
/// derived from the configured secret with BLAKE3 `derive_key`, so secrets of any length
/// (at least `MIN_SECRET_LEN`) map to a uniform 256-bit key.
#[derive(Clone)]
pub struct SessionSealer {
    key: [u8; 32],
}

impl Debug for SessionSealer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSealer").finish_non_exhaustive()
    }
}

impl SessionSealer {
    pub fn new(secret: &[u8]) -> Result<Self, SessionError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(SessionError::WeakSecret { min: MIN_SECRET_LEN, got: secret.len() });
        }
        Ok(Self { key: blake3::derive_key(KEY_CONTEXT, secret) })
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(&self.key))
    }

    pub fn seal(&self, session: &CookieSession) -> Result<String, SessionError> {
        let body = serde_json::to_vec(session.values())?;
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::getrandom(&mut nonce).map_err(|e| SessionError::Entropy(e.to_string()))?;
        let sealed = self
            .cipher()
            .encrypt(XNonce::from_slice(&nonce), Payload { msg: body.as_slice(), aad: AAD })
            .map_err(|_| SessionError::Cipher)?;

        let mut raw = Vec::with_capacity(NONCE_LEN + sealed.len());
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&sealed);
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw))
    }

    /// Opens a token. Anything that does not authenticate under this key (tampered,
    /// truncated, sealed with another secret, not base64) yields an empty session.
    pub fn open(&self, token: &str) -> CookieSession {
        self.verify(token).unwrap_or_default()
    }

    /// Like `open`, but reports a rejected token as `None` so the caller can drop the cookie.
    pub fn verify(&self, token: &str) -> Option<CookieSession> {
        match self.try_open(token) {
            Some(values) => Some(CookieSession::from_values(values)),
            None => {
                tracing::debug!(target: "session", "discarding session cookie that failed to authenticate");
                None
            }
        }
    }

    fn try_open(&self, token: &str) -> Option<BTreeMap<String, SessionValue>> {
        let raw = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(token.trim()).ok()?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return None;
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let body = self
            .cipher()
            .decrypt(XNonce::from_slice(nonce), Payload { msg: sealed, aad: AAD })
            .ok()?;
        serde_json::from_slice(&body).ok()
    }
}
