use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::identity::{MemoryUserDirectory, NewUser};
use crate::session::CookieSession;

/// Directory wrapper that counts id lookups.
struct Counting {
    inner: MemoryUserDirectory,
    lookups: AtomicUsize,
}

impl Counting {
    fn new() -> Self { Self { inner: MemoryUserDirectory::new(), lookups: AtomicUsize::new(0) } }
    fn lookups(&self) -> usize { self.lookups.load(Ordering::SeqCst) }
}

impl UserDirectory for Counting {
    fn find_by_id(&self, id: UserId) -> Result<Option<User>, DirectoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_id(id)
    }
    fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> { self.inner.find_by_email(email) }
    fn create(&self, candidate: NewUser) -> Result<User, DirectoryError> { self.inner.create(candidate) }
}

/// Directory whose backing store is down.
struct Broken;

impl UserDirectory for Broken {
    fn find_by_id(&self, _id: UserId) -> Result<Option<User>, DirectoryError> { Err(anyhow::anyhow!("connection refused").into()) }
    fn find_by_email(&self, _email: &str) -> Result<Option<User>, DirectoryError> { Err(anyhow::anyhow!("connection refused").into()) }
    fn create(&self, _candidate: NewUser) -> Result<User, DirectoryError> { Err(anyhow::anyhow!("connection refused").into()) }
}

fn alice(dir: &dyn UserDirectory) -> User {
    dir.create(NewUser {
        name: "Alice".into(),
        email: "alice@example.com".into(),
        password: "secret123".into(),
        password_confirmation: Some("secret123".into()),
    }).unwrap()
}

#[test]
fn fresh_session_is_anonymous() {
    let dir = Counting::new();
    let mut session = CookieSession::new();
    let mut auth = AuthContext::new(&mut session, &dir);
    assert!(auth.current_user().unwrap().is_none());
    assert!(!auth.logged_in().unwrap());
    assert_eq!(dir.lookups(), 0, "no user_id means no lookup");
}

#[test]
fn log_in_makes_user_current() {
    let dir = Counting::new();
    let u = alice(&dir);
    let mut session = CookieSession::new();
    {
        let mut auth = AuthContext::new(&mut session, &dir);
        auth.log_in(&u).unwrap();
        assert_eq!(auth.current_user().unwrap().map(|c| c.id), Some(u.id));
        assert!(auth.logged_in().unwrap());
    }
    assert_eq!(session.get(USER_ID_KEY), Some(SessionValue::Int(u.id.0)));
}

#[test]
fn later_request_resolves_from_session_with_one_lookup() {
    let dir = Counting::new();
    let u = alice(&dir);
    let mut session = CookieSession::new();
    AuthContext::new(&mut session, &dir).log_in(&u).unwrap();

    // next request: new context, same session contents
    let mut auth = AuthContext::new(&mut session, &dir);
    let first = auth.current_user().unwrap().map(|c| c.id);
    let second = auth.current_user().unwrap().map(|c| c.id);
    assert!(auth.logged_in().unwrap());
    assert_eq!(first, Some(u.id));
    assert_eq!(first, second);
    assert_eq!(dir.lookups(), 1);
}

#[test]
fn cache_does_not_outlive_the_request() {
    let dir = Counting::new();
    let u = alice(&dir);
    let mut session = CookieSession::new();
    session.set(USER_ID_KEY, SessionValue::Int(u.id.0)).unwrap();
    AuthContext::new(&mut session, &dir).current_user().unwrap();
    AuthContext::new(&mut session, &dir).current_user().unwrap();
    assert_eq!(dir.lookups(), 2);
}

#[test]
fn dangling_user_id_reads_as_anonymous_and_is_cached() {
    let dir = Counting::new();
    let mut session = CookieSession::new();
    session.set(USER_ID_KEY, SessionValue::Int(42)).unwrap();
    let mut auth = AuthContext::new(&mut session, &dir);
    assert!(auth.current_user().unwrap().is_none());
    assert!(!auth.logged_in().unwrap());
    assert_eq!(dir.lookups(), 1);

    auth.log_out();
    drop(auth);
    assert_eq!(session.get(USER_ID_KEY), None, "log_out clears the stale id");
}

#[test]
fn deleted_user_turns_session_anonymous() {
    let dir = Counting::new();
    let u = alice(&dir);
    let mut session = CookieSession::new();
    AuthContext::new(&mut session, &dir).log_in(&u).unwrap();
    dir.inner.remove(u.id);
    assert!(!AuthContext::new(&mut session, &dir).logged_in().unwrap());
}

#[test]
fn log_out_twice_is_harmless() {
    let dir = Counting::new();
    let u = alice(&dir);
    let mut session = CookieSession::new();
    let mut auth = AuthContext::new(&mut session, &dir);
    auth.log_in(&u).unwrap();
    auth.log_out();
    assert!(!auth.logged_in().unwrap());
    auth.log_out();
    assert!(!auth.logged_in().unwrap());
    assert!(auth.current_user().unwrap().is_none());
    drop(auth);
    assert!(session.is_empty());
}

#[test]
fn log_in_replaces_cached_anonymous() {
    let dir = Counting::new();
    let u = alice(&dir);
    let mut session = CookieSession::new();
    session.set(USER_ID_KEY, SessionValue::Int(999)).unwrap();
    let mut auth = AuthContext::new(&mut session, &dir);
    assert!(!auth.logged_in().unwrap());
    auth.log_in(&u).unwrap();
    assert_eq!(auth.current_user().unwrap().map(|c| c.name.clone()), Some("Alice".to_string()));
    assert_eq!(dir.lookups(), 1);
}

#[test]
fn text_user_id_is_accepted() {
    let dir = Counting::new();
    let u = alice(&dir);
    let mut session = CookieSession::new();
    session.set(USER_ID_KEY, SessionValue::Text(u.id.to_string())).unwrap();
    assert!(AuthContext::new(&mut session, &dir).logged_in().unwrap());
}

#[test]
fn store_failure_propagates() {
    let mut session = CookieSession::new();
    session.set(USER_ID_KEY, SessionValue::Int(1)).unwrap();
    let mut auth = AuthContext::new(&mut session, &Broken);
    assert!(matches!(auth.current_user(), Err(DirectoryError::Store(_))));
}

#[test]
fn store_failure_is_skipped_when_anonymous() {
    let mut session = CookieSession::new();
    let mut auth = AuthContext::new(&mut session, &Broken);
    assert!(!auth.logged_in().unwrap());
}
