//! Authentication: principal registry, token-issuing authenticator and the
//! error taxonomy shared by the login flow.

pub mod authenticator;
pub mod registry;

use thiserror::Error;

use crate::models::auth::Credentials;

/// Authentication and login errors. Always returned as values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Credenciales inválidas")]
    InvalidCredentials,

    #[error("login in progress")]
    LoginInProgress,

    #[error("unknown token")]
    UnknownToken,

    #[error("{0}")]
    Unexpected(String),
}

/// Reject empty email or password.
pub fn require_non_empty(credentials: &Credentials) -> Result<(), AuthError> {
    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
        return Err(AuthError::InvalidInput(
            "email and password are required".into(),
        ));
    }
    Ok(())
}

/// Shape check for an email address: one `@`, a non-empty local part and a
/// dotted domain without empty labels.
pub fn is_well_formed_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| !label.is_empty())
}

/// Full input validation used in front of the authenticator.
pub fn validate_credentials(credentials: &Credentials) -> Result<(), AuthError> {
    require_non_empty(credentials)?;
    if !is_well_formed_email(&credentials.email) {
        return Err(AuthError::InvalidInput("invalid email format".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_well_formed_email("test@test.com"));
        assert!(is_well_formed_email("first.last@mail.example.org"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in [
            "",
            "plain",
            "@test.com",
            "a@b",
            "a@@b.com",
            "a@b..com",
            "a@.com",
            "a b@c.com",
            "a@b.com.",
        ] {
            assert!(!is_well_formed_email(bad), "accepted {bad:?}");
        }
    }

    #[test]
    fn empty_fields_are_invalid_input() {
        let err = validate_credentials(&Credentials::new("", "x")).unwrap_err();
        assert_eq!(
            err,
            AuthError::InvalidInput("email and password are required".into())
        );
        let err = validate_credentials(&Credentials::new("a@b.com", "")).unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));
    }

    #[test]
    fn malformed_email_is_invalid_input() {
        let err = validate_credentials(&Credentials::new("nope", "secret")).unwrap_err();
        assert_eq!(err, AuthError::InvalidInput("invalid email format".into()));
    }

    #[test]
    fn error_messages_match_boundary_strings() {
        assert_eq!(AuthError::InvalidCredentials.to_string(), "Credenciales inválidas");
        assert_eq!(AuthError::LoginInProgress.to_string(), "login in progress");
    }
}
