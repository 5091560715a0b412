use once_cell::sync::Lazy;
use regex::Regex;

use super::user::{NewUser, ValidationErrors};

pub const NAME_MAX_LEN: usize = 50;
pub const EMAIL_MAX_LEN: usize = 255;
pub const PASSWORD_MIN_LEN: usize = 6;

static VALID_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i-u)^[\w+\-.]+@[a-z\d\-]+(\.[a-z\d\-]+)*\.[a-z]+$").unwrap()
});

/// Canonical stored form of an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Checks every rule and collects all failures. `email_taken` receives the normalized
/// address and answers whether another record already uses it.
pub fn validate_new_user(candidate: &NewUser, email_taken: impl Fn(&str) -> bool) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if candidate.name.trim().is_empty() {
        errors.add("name", "can't be blank");
    } else if candidate.name.chars().count() > NAME_MAX_LEN {
        errors.add("name", &format!("is too long (maximum is {} characters)", NAME_MAX_LEN));
    }

    let email = normalize_email(&candidate.email);
    if email.is_empty() {
        errors.add("email", "can't be blank");
    } else if email.chars().count() > EMAIL_MAX_LEN {
        errors.add("email", &format!("is too long (maximum is {} characters)", EMAIL_MAX_LEN));
    } else if !VALID_EMAIL.is_match(&email) {
        errors.add("email", "is invalid");
    } else if email_taken(&email) {
        errors.add("email", "has already been taken");
    }

    if candidate.password.trim().is_empty() {
        errors.add("password", "can't be blank");
    } else if candidate.password.chars().count() < PASSWORD_MIN_LEN {
        errors.add("password", &format!("is too short (minimum is {} characters)", PASSWORD_MIN_LEN));
    }

    if let Some(confirmation) = &candidate.password_confirmation {
        if confirmation != &candidate.password {
            errors.add("password_confirmation", "doesn't match Password");
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, email: &str, pw: &str, confirm: Option<&str>) -> NewUser {
        NewUser { name: name.into(), email: email.into(), password: pw.into(), password_confirmation: confirm.map(|s| s.into()) }
    }

    #[test]
    fn valid_candidate_passes() {
        let e = validate_new_user(&candidate("Alice", "alice@example.com", "secret123", Some("secret123")), |_| false);
        assert!(e.is_empty(), "{}", e);
    }

    #[test]
    fn bad_submission_reports_every_field() {
        let e = validate_new_user(&candidate("", "bad", "a", Some("b")), |_| false);
        assert_eq!(e.on("name"), vec!["can't be blank"]);
        assert_eq!(e.on("email"), vec!["is invalid"]);
        assert_eq!(e.on("password"), vec!["is too short (minimum is 6 characters)"]);
        assert_eq!(e.on("password_confirmation"), vec!["doesn't match Password"]);
        assert_eq!(e.len(), 4);
    }

    #[test]
    fn email_format_cases() {
        for ok in ["user@example.com", "USER@foo.COM", "A_US-ER@foo.bar.org", "first.last@foo.jp", "alice+bob@baz.cn"] {
            assert!(VALID_EMAIL.is_match(&normalize_email(ok)), "should accept {}", ok);
        }
        for bad in ["user@example,com", "user_at_foo.org", "user.name@example.", "foo@bar_baz.com", "foo@bar+baz.com", "foo@bar..com"] {
            assert!(!VALID_EMAIL.is_match(&normalize_email(bad)), "should reject {}", bad);
        }
    }

    #[test]
    fn uniqueness_is_checked_on_normalized_email() {
        let e = validate_new_user(&candidate("Al", "  ALICE@Example.com ", "secret123", None), |em| em == "alice@example.com");
        assert_eq!(e.on("email"), vec!["has already been taken"]);
    }

    #[test]
    fn length_limits() {
        let long_name = "a".repeat(NAME_MAX_LEN + 1);
        let long_email = format!("{}@example.com", "a".repeat(EMAIL_MAX_LEN));
        let e = validate_new_user(&candidate(&long_name, &long_email, "secret123", None), |_| false);
        assert_eq!(e.on("name").len(), 1);
        assert_eq!(e.on("email"), vec!["is too long (maximum is 255 characters)"]);
    }

    #[test]
    fn blank_password_is_reported_once() {
        let e = validate_new_user(&candidate("Al", "al@example.com", "", None), |_| false);
        assert_eq!(e.on("password"), vec!["can't be blank"]);
        assert!(e.on("password_confirmation").is_empty());
    }

    #[test]
    fn whitespace_password_is_blank() {
        let e = validate_new_user(&candidate("Al", "al@example.com", "      ", Some("      ")), |_| false);
        assert_eq!(e.on("password"), vec!["can't be blank"]);
        assert_eq!(e.len(), 1);
    }

    #[test]
    fn email_pattern_is_ascii_only() {
        for bad in ["\u{fc}@example.com", "user@ex\u{e4}mple.com", "user@example.\u{441}om", "user@example.c\u{663}"] {
            assert!(!VALID_EMAIL.is_match(&normalize_email(bad)), "should reject {}", bad);
        }
    }
}
