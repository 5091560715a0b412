use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directory-assigned user identifier. Positive, unique and stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(UserId)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_digest: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Candidate record handed to a directory for creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    /// `None` skips the confirmation check; `Some` must equal `password`.
    pub password_confirmation: Option<String>,
}

/// The only submitted fields a sign-up may set.
pub const PERMITTED_SIGNUP_FIELDS: [&str; 4] = ["name", "email", "password", "password_confirmation"];

impl NewUser {
    /// Builds a candidate from raw submitted fields, keeping only the permitted keys.
    /// Anything else (`admin`, `id`, ...) is dropped before it reaches the directory.
    pub fn permit(submitted: &BTreeMap<String, String>) -> NewUser {
        let dropped: Vec<&str> = submitted
            .keys()
            .map(|k| k.as_str())
            .filter(|k| !PERMITTED_SIGNUP_FIELDS.contains(k))
            .collect();
        if !dropped.is_empty() {
            tracing::debug!(target: "users", fields = ?dropped, "unpermitted sign-up fields ignored");
        }
        let field = |k: &str| submitted.get(k).cloned().unwrap_or_default();
        NewUser {
            name: field("name"),
            email: field("email"),
            password: field("password"),
            password_confirmation: submitted.get("password_confirmation").cloned(),
        }
    }
}

/// Field-level validation failures, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError { field: field.to_string(), message: message.to_string() });
    }

    pub fn is_empty(&self) -> bool { self.errors.is_empty() }

    pub fn len(&self) -> usize { self.errors.len() }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> { self.errors.iter() }

    pub fn on(&self, field: &str) -> Vec<&str> {
        self.errors.iter().filter(|e| e.field == field).map(|e| e.message.as_str()).collect()
    }

    /// Human readable messages, e.g. "Password confirmation doesn't match Password".
    pub fn full_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| format!("{} {}", humanize(&e.field), e.message)).collect()
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_messages().join(", "))
    }
}

fn humanize(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
