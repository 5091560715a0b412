//! Sign-up flow: empty form, create-and-log-in, and the user detail lookup.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::auth::AuthContext;
use crate::error::AppResult;
use crate::identity::{DirectoryError, FieldError, NewUser, User, UserDirectory, UserId, ValidationErrors};
use crate::session::{set_flash, FlashKind};

pub const WELCOME_NOTICE: &str = "Welcome to the Sample App!";

/// What the entry form shows. Passwords are never echoed back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserForm {
    pub name: String,
    pub email: String,
    pub errors: Vec<FieldError>,
    pub full_messages: Vec<String>,
}

impl UserForm {
    fn redisplay(candidate: &NewUser, errors: &ValidationErrors) -> Self {
        Self {
            name: candidate.name.clone(),
            email: candidate.email.clone(),
            errors: errors.iter().cloned().collect(),
            full_messages: errors.full_messages(),
        }
    }
}

#[derive(Debug)]
pub enum CreateOutcome {
    /// Stored and logged in; send the client to `location`.
    Created { user: User, location: String },
    /// Rejected by validation; the session was not touched.
    Invalid { form: UserForm, errors: ValidationErrors },
}

pub fn show_new_form() -> UserForm {
    UserForm::default()
}

pub fn user_path(id: UserId) -> String {
    format!("/users/{}", id)
}

/// Creates a user from submitted fields, keeping only the permitted ones. On success the
/// new user is logged in and a welcome notice is queued.
pub fn create(auth: &mut AuthContext<'_>, submitted: &BTreeMap<String, String>) -> AppResult<CreateOutcome> {
    let candidate = NewUser::permit(submitted);
    match auth.users().create(candidate.clone()) {
        Ok(user) => {
            auth.log_in(&user)?;
            set_flash(auth.session(), FlashKind::Success, WELCOME_NOTICE)?;
            info!(target: "users", user_id = %user.id, "user signed up");
            let location = user_path(user.id);
            Ok(CreateOutcome::Created { user, location })
        }
        Err(DirectoryError::Invalid(errors)) => {
            info!(target: "users", errors = errors.len(), "sign-up rejected");
            Ok(CreateOutcome::Invalid { form: UserForm::redisplay(&candidate, &errors), errors })
        }
        Err(e) => Err(e.into()),
    }
}

/// Direct lookup for the detail view; a missing id is a not-found failure.
pub fn show(users: &dyn UserDirectory, id: UserId) -> Result<User, DirectoryError> {
    users.find_or_fail(id)
}
