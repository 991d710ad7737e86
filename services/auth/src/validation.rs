//! Input validation utilities
//!
//! Lengths are counted in characters, not bytes.

use crate::{error::FieldError, models::RegisterInput};

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 4;

/// Validate username
pub fn validate_username(username: &str) -> Result<(), FieldError> {
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(FieldError::new(
            "username",
            "username must be at least 3 characters long",
        ));
    }

    // "@" is how login tells emails and usernames apart
    if username.contains('@') {
        return Err(FieldError::new("username", "username cannot include an @"));
    }

    Ok(())
}

/// Validate a password submitted under `field`
pub fn validate_password(password: &str, field: &str) -> Result<(), FieldError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(FieldError::new(
            field,
            "password must be at least 4 characters long",
        ));
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), FieldError> {
    if !email.contains('@') {
        return Err(FieldError::new("email", "invalid email"));
    }

    Ok(())
}

/// Check registration options, stopping at the first failing rule
pub fn validate_register(input: &RegisterInput) -> Option<Vec<FieldError>> {
    validate_username(&input.username)
        .and_then(|()| validate_password(&input.password, "password"))
        .and_then(|()| validate_email(&input.email))
        .err()
        .map(|error| vec![error])
}
