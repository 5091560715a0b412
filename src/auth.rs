//! Request-scoped authentication context.
//!
//! Bridges a `SessionStore` and a `UserDirectory` to answer "who is logged in" and to
//! move a session between the two states:
//!
//! - anonymous: no `user_id` in the session
//! - authenticated: `user_id` present and resolvable
//!
//! A `user_id` naming a record that no longer exists reads as anonymous; `log_out` still
//! removes it. One `AuthContext` lives for exactly one request. Its cache is never shared,
//! so a directory lookup happens at most once per request.

use tracing::{debug, info};

use crate::identity::{DirectoryError, User, UserDirectory, UserId};
use crate::session::{SessionError, SessionStore, SessionValue};

pub const USER_ID_KEY: &str = "user_id";

pub struct AuthContext<'a> {
    session: &'a mut dyn SessionStore,
    users: &'a dyn UserDirectory,
    /// `None` = not resolved yet this request; `Some(None)` = resolved to nobody.
    current: Option<Option<User>>,
}

impl<'a> AuthContext<'a> {
    pub fn new(session: &'a mut dyn SessionStore, users: &'a dyn UserDirectory) -> Self {
        Self { session, users, current: None }
    }

    /// Attaches `user` to the session. The user is trusted as already persisted.
    pub fn log_in(&mut self, user: &User) -> Result<(), SessionError> {
        self.session.set(USER_ID_KEY, SessionValue::Int(user.id.0))?;
        self.current = Some(Some(user.clone()));
        info!(target: "auth", user_id = %user.id, "logged in");
        Ok(())
    }

    /// The user named by the session, if any. Only store failures are errors; a missing
    /// or dangling `user_id` is `Ok(None)`.
    pub fn current_user(&mut self) -> Result<Option<&User>, DirectoryError> {
        if self.current.is_none() {
            let Some(id) = self.session_user_id() else { return Ok(None); };
            let found = self.users.find_by_id(id)?;
            if found.is_none() {
                debug!(target: "auth", user_id = %id, "session names a missing user; treating as anonymous");
            }
            self.current = Some(found);
        }
        Ok(self.current.as_ref().and_then(|c| c.as_ref()))
    }

    pub fn logged_in(&mut self) -> Result<bool, DirectoryError> {
        Ok(self.current_user()?.is_some())
    }

    /// Detaches whatever `user_id` the session holds. Safe to call when logged out.
    pub fn log_out(&mut self) {
        if let Some(id) = self.session_user_id() {
            info!(target: "auth", user_id = %id, "logged out");
        }
        self.session.delete(USER_ID_KEY);
        self.current = Some(None);
    }

    pub fn users(&self) -> &'a dyn UserDirectory { self.users }

    pub fn session(&mut self) -> &mut dyn SessionStore { &mut *self.session }

    fn session_user_id(&self) -> Option<UserId> {
        self.session.get(USER_ID_KEY).and_then(|v| v.as_int()).map(UserId)
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod auth_tests;
