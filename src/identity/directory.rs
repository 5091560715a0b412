use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;

use super::user::{NewUser, User, UserId, ValidationErrors};
use super::validation::{normalize_email, validate_new_user};
use crate::security::{hash_password, verify_password};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("no user with id {0}")]
    NotFound(UserId),
    #[error("validation failed: {0}")]
    Invalid(ValidationErrors),
    #[error("user store failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// Persistence collaborator for user records.
///
/// `find_by_id` reports a missing record as `Ok(None)`; only storage failures are errors.
/// `find_or_fail` is the strict variant used for direct lookups.
pub trait UserDirectory: Send + Sync {
    fn find_by_id(&self, id: UserId) -> Result<Option<User>, DirectoryError>;

    fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;

    /// Validates, hashes the password and stores a new record with a fresh id.
    fn create(&self, candidate: NewUser) -> Result<User, DirectoryError>;

    fn find_or_fail(&self, id: UserId) -> Result<User, DirectoryError> {
        self.find_by_id(id)?.ok_or(DirectoryError::NotFound(id))
    }

    fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, DirectoryError> {
        let Some(user) = self.find_by_email(&normalize_email(email))? else { return Ok(None); };
        if verify_password(&user.password_digest, password) { Ok(Some(user)) } else { Ok(None) }
    }
}

/// Shared creation path: validation against `existing`, then a fully built record.
pub(crate) fn build_user(candidate: &NewUser, existing: &[User], next_id: UserId) -> Result<User, DirectoryError> {
    let errors = validate_new_user(candidate, |email| existing.iter().any(|u| u.email == email));
    if !errors.is_empty() {
        return Err(DirectoryError::Invalid(errors));
    }
    let password_digest = hash_password(&candidate.password)?;
    let now = Utc::now();
    Ok(User {
        id: next_id,
        name: candidate.name.clone(),
        email: normalize_email(&candidate.email),
        password_digest,
        created_at: now,
        updated_at: now,
    })
}

/// Process-local directory; ids start at 1 and are never reused.
#[derive(Default)]
pub struct MemoryUserDirectory {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    last_id: i64,
}

impl MemoryUserDirectory {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.inner.lock().users.len() }

    pub fn is_empty(&self) -> bool { self.inner.lock().users.is_empty() }

    /// Removes a record, leaving any session that still names it dangling.
    pub fn remove(&self, id: UserId) -> bool {
        let mut state = self.inner.lock();
        let before = state.users.len();
        state.users.retain(|u| u.id != id);
        state.users.len() != before
    }
}

impl UserDirectory for MemoryUserDirectory {
    fn find_by_id(&self, id: UserId) -> Result<Option<User>, DirectoryError> {
        Ok(self.inner.lock().users.iter().find(|u| u.id == id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let email = normalize_email(email);
        Ok(self.inner.lock().users.iter().find(|u| u.email == email).cloned())
    }

    fn create(&self, candidate: NewUser) -> Result<User, DirectoryError> {
        let mut state = self.inner.lock();
        let user = build_user(&candidate, &state.users, UserId(state.last_id + 1))?;
        state.last_id = user.id.0;
        state.users.push(user.clone());
        crate::tprintln!("users.create(memory) id={} email={}", user.id, user.email);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> NewUser {
        NewUser {
            name: "Alice".into(),
            email: "Alice@Example.com".into(),
            password: "secret123".into(),
            password_confirmation: Some("secret123".into()),
        }
    }

    #[test]
    fn create_assigns_ids_and_normalizes_email() {
        let dir = MemoryUserDirectory::new();
        let a = dir.create(alice()).unwrap();
        assert_eq!(a.id, UserId(1));
        assert_eq!(a.email, "alice@example.com");
        assert_ne!(a.password_digest, "secret123");

        let mut bob = alice();
        bob.name = "Bob".into();
        bob.email = "bob@example.com".into();
        assert_eq!(dir.create(bob).unwrap().id, UserId(2));
    }

    #[test]
    fn duplicate_email_is_a_validation_error() {
        let dir = MemoryUserDirectory::new();
        dir.create(alice()).unwrap();
        let mut again = alice();
        again.email = "ALICE@example.COM".into();
        match dir.create(again) {
            Err(DirectoryError::Invalid(e)) => assert_eq!(e.on("email"), vec!["has already been taken"]),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn missing_ids_resolve_to_none_or_not_found() {
        let dir = MemoryUserDirectory::new();
        assert!(dir.find_by_id(UserId(5)).unwrap().is_none());
        assert!(matches!(dir.find_or_fail(UserId(5)), Err(DirectoryError::NotFound(UserId(5)))));
    }

    #[test]
    fn authenticate_checks_digest() {
        let dir = MemoryUserDirectory::new();
        let a = dir.create(alice()).unwrap();
        assert_eq!(dir.authenticate("ALICE@example.com", "secret123").unwrap().map(|u| u.id), Some(a.id));
        assert!(dir.authenticate("alice@example.com", "wrong").unwrap().is_none());
        assert!(dir.authenticate("nobody@example.com", "secret123").unwrap().is_none());
    }

    #[test]
    fn removed_ids_are_not_reused() {
        let dir = MemoryUserDirectory::new();
        let a = dir.create(alice()).unwrap();
        assert!(dir.remove(a.id));
        assert!(!dir.remove(a.id));
        assert!(dir.is_empty());
        let again = dir.create(alice()).unwrap();
        assert_eq!(again.id, UserId(2));
    }
}
