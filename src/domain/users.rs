//! Account naming rules.

use super::error::DomainError;

pub const MAX_USERNAME_LEN: usize = 150;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Usernames are 1-150 characters of letters, digits and `@.+-_`.
pub fn validate_username(input: &str) -> Result<String, DomainError> {
    let username = input.trim();
    if username.is_empty() {
        return Err(DomainError::validation("username", "username is required"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(DomainError::validation(
            "username",
            format!("username must be at most {MAX_USERNAME_LEN} characters"),
        ));
    }
    if !username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(DomainError::validation(
            "username",
            "username may contain only letters, digits and @/./+/-/_",
        ));
    }
    Ok(username.to_string())
}

pub fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(
            "password",
            format!("password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}
