use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::PortalError;
use crate::scheduling::parse_date;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Trims `value` and rejects it if nothing remains.
pub fn required(field: &str, value: &str) -> Result<String, PortalError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PortalError::invalid(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Trims an optional field, mapping blank input to `None`.
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses an optional `YYYY-MM-DD` field. Blank input counts as absent.
pub fn optional_date(value: Option<String>) -> Result<Option<NaiveDate>, PortalError> {
    Ok(optional(value).map(|d| parse_date(&d)).transpose()?)
}

/// Lower-cases and validates an email address.
pub fn normalize_email(email: &str) -> Result<String, PortalError> {
    let email = email.trim().to_lowercase();
    if !EMAIL_REGEX.is_match(&email) {
        return Err(PortalError::invalid("Invalid email address"));
    }
    Ok(email)
}

pub fn check_password(password: &str) -> Result<(), PortalError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PortalError::invalid(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Splits "First Middle Last" into ("First", "Middle Last").
pub fn split_full_name(full_name: &str) -> Result<(String, String), PortalError> {
    let full_name = required("Full name", full_name)?;
    Ok(match full_name.split_once(char::is_whitespace) {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (full_name, String::new()),
    })
}
