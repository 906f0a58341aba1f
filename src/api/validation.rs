//! Input validation for API requests.
//!
//! For collecting multiple validation errors and returning them as an ApiError,
//! use the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use super::error::ApiError;

/// Keys accepted by `PATCH /api/auth/profile`
pub const PROFILE_UPDATE_FIELDS: &[&str] = &[
    "username",
    "email",
    "password",
    "secret",
    "bio",
    "profilePicture",
];

/// Keys accepted by `PATCH /api/images/:id`
pub const IMAGE_UPDATE_FIELDS: &[&str] = &["title", "description", "isPublic", "tags"];

/// Title used when an upload does not provide one
pub const DEFAULT_TITLE: &str = "Untitled";

const MIN_PASSWORD_LENGTH: usize = 6;
const MAX_TITLE_LENGTH: usize = 200;
const MAX_DESCRIPTION_LENGTH: usize = 2000;
const MAX_BIO_LENGTH: usize = 500;

lazy_static! {
    /// Usernames: 3-30 characters of letters, digits, dot, dash, underscore
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_.-]{3,30}$").unwrap();

    /// Loose email shape check: local@domain.tld
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

/// Validate a username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(
            "Username must be 3-30 characters of letters, digits, '.', '-' or '_'".to_string(),
        );
    }

    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 || !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

/// Validate a new password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }

    Ok(())
}

/// Validate an image title (already trimmed)
pub fn validate_title(title: &str) -> Result<(), String> {
    if title.is_empty() {
        return Err("Title is required".to_string());
    }

    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(format!(
            "Title is too long (max {} characters)",
            MAX_TITLE_LENGTH
        ));
    }

    Ok(())
}

/// Validate an image description (already trimmed)
pub fn validate_description(description: &str) -> Result<(), String> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(format!(
            "Description is too long (max {} characters)",
            MAX_DESCRIPTION_LENGTH
        ));
    }

    Ok(())
}

/// Validate a profile bio
pub fn validate_bio(bio: &str) -> Result<(), String> {
    if bio.chars().count() > MAX_BIO_LENGTH {
        return Err(format!("Bio is too long (max {} characters)", MAX_BIO_LENGTH));
    }

    Ok(())
}

/// Normalize an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Interpret a form or JSON string flag. Only `"true"` (any case) is true.
pub fn parse_bool_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Read a nullable text field from a JSON update body.
///
/// Strings are trimmed and an empty string clears the field like `null` does.
/// Any other JSON type is rejected.
pub fn optional_text(value: &Value) -> Result<Option<String>, ()> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        _ => Err(()),
    }
}

/// Make sure an update body is a JSON object whose keys are all in `allowed`
pub fn check_update_fields<'a>(
    body: &'a Value,
    allowed: &[&str],
) -> Result<&'a Map<String, Value>, ApiError> {
    let fields = body
        .as_object()
        .ok_or_else(|| ApiError::invalid("Invalid updates"))?;

    if fields.keys().any(|key| !allowed.contains(&key.as_str())) {
        return Err(ApiError::invalid("Invalid updates"));
    }

    Ok(fields)
}
