use super::{SessionError, SessionStore, SessionValue};

pub const CSRF_KEY: &str = "_csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// The session's CSRF token, minted and stored on first use.
pub fn csrf_token(session: &mut dyn SessionStore) -> Result<String, SessionError> {
    if let Some(existing) = session.get(CSRF_KEY).and_then(|v| v.as_text().map(|s| s.to_string())) {
        return Ok(existing);
    }
    let token = crate::security::random_token(32).map_err(|e| SessionError::Entropy(e.to_string()))?;
    session.set(CSRF_KEY, SessionValue::Text(token.clone()))?;
    Ok(token)
}

/// True iff `provided` matches the token stored in the session. A session without a
/// token never verifies.
pub fn verify_csrf(session: &dyn SessionStore, provided: Option<&str>) -> bool {
    let Some(provided) = provided else { return false; };
    let Some(expected) = session.get(CSRF_KEY) else { return false; };
    let Some(expected) = expected.as_text() else { return false; };
    // compare digests so the check is constant time
    blake3::hash(expected.as_bytes()) == blake3::hash(provided.as_bytes())
}
