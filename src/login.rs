//! Password login and logout on top of the auth context.

use serde::Deserialize;
use tracing::info;

use crate::auth::AuthContext;
use crate::error::AppResult;
use crate::identity::User;

pub const INVALID_LOGIN: &str = "Invalid email/password combination";

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Logs in on a matching email/password. A mismatch is `Ok(None)` and leaves the
/// session as it was.
pub fn attempt(auth: &mut AuthContext<'_>, credentials: &Credentials) -> AppResult<Option<User>> {
    match auth.users().authenticate(&credentials.email, &credentials.password)? {
        Some(user) => {
            auth.log_in(&user)?;
            Ok(Some(user))
        }
        None => {
            info!(target: "auth", "login rejected");
            Ok(None)
        }
    }
}

pub fn log_out(auth: &mut AuthContext<'_>) {
    auth.log_out();
}
