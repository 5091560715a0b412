use axum::http::{HeaderMap, HeaderValue};

/// Attributes for the session cookie. There is no `Expires`/`Max-Age`;
/// the cookie dies with the browser session.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self { name: "_sample_app_session".to_string(), secure: true }
    }
}

pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all("cookie").iter() {
        let Ok(s) = cookie.to_str() else { continue; };
        for part in s.split(';') {
            let p = part.trim();
            if let Some(eq) = p.find('=') {
                let (k, v) = p.split_at(eq);
                if k == name { return Some(v[1..].to_string()); }
            }
        }
    }
    None
}

pub fn session_cookie(settings: &CookieSettings, token: &str) -> Option<HeaderValue> {
    let secure = if settings.secure { "; Secure" } else { "" };
    HeaderValue::from_str(&format!("{}={}; HttpOnly; SameSite=Lax; Path=/{}", settings.name, token, secure)).ok()
}

pub fn cleared_session_cookie(settings: &CookieSettings) -> Option<HeaderValue> {
    let secure = if settings.secure { "; Secure" } else { "" };
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax; Path=/{}",
        settings.name, secure
    )).ok()
}
