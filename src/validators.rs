/// Input validators for the authentication endpoints
///
/// Every validator trims its input and returns the cleaned value, or a
/// `ValidationError` that the boundary renders as `400 INVALID_INPUT`.

use regex::Regex;
use lazy_static::lazy_static;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 100;
const MAX_PRINCIPAL_LENGTH: usize = MAX_EMAIL_LENGTH;

/// Characters counted as "special" by the password policy
const PASSWORD_SPECIALS: &str = "@$!%*?&";

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).expect("email regex is valid");

    static ref USERNAME_REGEX: Regex =
        Regex::new(r"^[a-zA-Z0-9_]{3,20}$").expect("username regex is valid");

    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9]{11}$").expect("phone regex is valid");
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }
    Ok(trimmed)
}

/// 3-20 characters of letters, digits and underscore
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let trimmed = required(username, "username")?;

    if !USERNAME_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat(
            "username must be 3-20 characters: letters, digits and underscores only".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

/// Validates email address
/// - Checks format using RFC 5322 simplified regex
/// - Verifies length constraints
/// - Rejects oversized local parts and embedded NUL bytes
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = required(email, "email")?;

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email has invalid format".to_string()));
    }

    if has_suspicious_email_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent("email".to_string()));
    }

    Ok(trimmed.to_string())
}

/// 11 digits, optionally prefixed with `+`
pub fn is_valid_phone(phone: &str) -> Result<String, ValidationError> {
    let trimmed = required(phone, "phone")?;

    if !PHONE_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat(
            "phone must be 11 digits and may start with +".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

/// Password policy for new accounts
///
/// Requirements:
/// - 8 to 100 characters
/// - At least one lowercase letter, one uppercase letter, one digit and one
///   of `@$!%*?&`
/// - No characters outside ASCII letters, digits and `@$!%*?&`
///
/// Not trimmed; whitespace is rejected by the alphabet rule.
pub fn is_valid_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()));
    }

    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort("password".to_string(), MIN_PASSWORD_LENGTH));
    }

    // DoS prevention; bcrypt also ignores bytes past 72
    if length > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password".to_string(), MAX_PASSWORD_LENGTH));
    }

    let is_special = |c: char| PASSWORD_SPECIALS.contains(c);

    if password
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || is_special(c)))
    {
        return Err(ValidationError::InvalidFormat(format!(
            "password may only contain letters, digits and {}",
            PASSWORD_SPECIALS
        )));
    }

    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(is_special);

    if !(has_lowercase && has_uppercase && has_digit && has_special) {
        return Err(ValidationError::InvalidFormat(
            "password must contain at least one lowercase letter, one uppercase letter, one digit and one special character"
                .to_string(),
        ));
    }

    Ok(())
}

/// Email or username used to log in
pub fn is_valid_principal(principal: &str) -> Result<String, ValidationError> {
    let trimmed = required(principal, "principal")?;

    if trimmed.len() > MAX_PRINCIPAL_LENGTH {
        return Err(ValidationError::TooLong("principal".to_string(), MAX_PRINCIPAL_LENGTH));
    }

    Ok(trimmed.to_string())
}

/// Presence check for secrets that are not otherwise validated
pub fn is_present(value: &str, field: &str) -> Result<(), ValidationError> {
    required(value, field).map(|_| ())
}

/// Detects suspicious patterns in email addresses that might indicate phishing
fn has_suspicious_email_patterns(email: &str) -> bool {
    if let Some(at_pos) = email.find('@') {
        let local_part = &email[..at_pos];
        if local_part.len() > 64 {
            return true;
        }
    }

    if email.matches('@').count() != 1 {
        return true;
    }

    email.contains('\0')
}
