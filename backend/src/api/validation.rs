//! Shared input validation helpers.
//!
//! Centralizes username/email/password/attribute validation used across
//! multiple handlers and services so the rules are defined in one place.

use crate::error::{AppError, Result};
use crate::models::radius::is_valid_op;

/// Maximum length FreeRADIUS accepts for usernames and attribute names.
const MAX_NAME_LEN: usize = 64;

/// Maximum length of an attribute value (`radcheck.value` is varchar(253)).
const MAX_VALUE_LEN: usize = 253;

/// Validate a console or RADIUS username: 1-64 chars, no whitespace or
/// control characters. `label` names the field in error messages.
pub fn validate_username(name: &str, label: &str) -> Result<()> {
    if name.is_empty() {
        return Err(AppError::Validation(format!("{label} is required")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "{label} must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AppError::Validation(format!(
            "{label} must not contain whitespace or control characters"
        )));
    }
    Ok(())
}

/// Validate a group name with the same shape rules as usernames.
pub fn validate_groupname(name: &str) -> Result<()> {
    validate_username(name, "Group name")
}

/// Minimal structural email check: one `@` with non-empty local and domain
/// parts, and a dot in the domain.
pub fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() || email.len() > 254 {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AppError::Validation("Invalid email address".to_string()));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || domain.ends_with('.') {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    if email.chars().any(|c| c.is_whitespace()) {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    Ok(())
}

/// Console account password policy: 8-128 chars, at least one letter and
/// one digit.
pub fn validate_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if len < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    if len > 128 {
        return Err(AppError::Validation(
            "Password must not exceed 128 characters".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::Validation(
            "Password must contain at least one letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "Password must contain at least one digit".to_string(),
        ));
    }
    Ok(())
}

/// Validate a RADIUS attribute name: dictionary names are dash-separated
/// words, e.g. `Framed-IP-Address` or vendor forms like `Cisco-AVPair`.
pub fn validate_attribute_name(attribute: &str) -> Result<()> {
    if attribute.is_empty() {
        return Err(AppError::Validation(
            "Attribute name is required".to_string(),
        ));
    }
    if attribute.len() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Attribute name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    if !attribute
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Err(AppError::Validation(format!(
            "Attribute name '{attribute}' contains invalid characters"
        )));
    }
    Ok(())
}

/// Validate a RADIUS attribute operator against the FreeRADIUS set.
pub fn validate_op(op: &str) -> Result<()> {
    if !is_valid_op(op) {
        return Err(AppError::Validation(format!(
            "Invalid attribute operator '{op}'"
        )));
    }
    Ok(())
}

/// Validate an attribute value length against the schema column.
pub fn validate_attribute_value(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AppError::Validation(
            "Attribute value is required".to_string(),
        ));
    }
    if value.len() > MAX_VALUE_LEN {
        return Err(AppError::Validation(format!(
            "Attribute value must not exceed {MAX_VALUE_LEN} characters"
        )));
    }
    Ok(())
}

/// Escape `%`, `_` and `\` so user input can be embedded in a LIKE pattern.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Usernames
    // -----------------------------------------------------------------------

    #[test]
    fn test_valid_usernames() {
        assert!(validate_username("alice", "Username").is_ok());
        assert!(validate_username("bob.smith@corp", "Username").is_ok());
        assert!(validate_username("user-01_x", "Username").is_ok());
    }

    #[test]
    fn test_empty_username_rejected() {
        assert!(validate_username("", "Username").is_err());
    }

    #[test]
    fn test_username_with_spaces_rejected() {
        assert!(validate_username("alice smith", "Username").is_err());
        assert!(validate_username("alice\t", "Username").is_err());
        assert!(validate_username("alice\n", "Username").is_err());
    }

    #[test]
    fn test_overlong_username_rejected() {
        assert!(validate_username(&"a".repeat(65), "Username").is_err());
        assert!(validate_username(&"a".repeat(64), "Username").is_ok());
    }

    #[test]
    fn test_label_appears_in_error_message() {
        let err = validate_username("", "Group name").unwrap_err();
        assert!(format!("{err}").contains("Group name"));
    }

    // -----------------------------------------------------------------------
    // Email
    // -----------------------------------------------------------------------

    #[test]
    fn test_valid_emails() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("a.b+tag@sub.example.org").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        assert!(validate_email("").is_err());
        assert!(validate_email("alice").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("alice@").is_err());
        assert!(validate_email("alice@localhost").is_err());
        assert!(validate_email("alice@example.").is_err());
        assert!(validate_email("alice smith@example.com").is_err());
    }

    // -----------------------------------------------------------------------
    // Passwords
    // -----------------------------------------------------------------------

    #[test]
    fn test_valid_password() {
        assert!(validate_password("hunter22!").is_ok());
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(validate_password("ab1").is_err());
    }

    #[test]
    fn test_password_needs_letter_and_digit() {
        assert!(validate_password("12345678").is_err());
        assert!(validate_password("abcdefgh").is_err());
        assert!(validate_password("abcdefg1").is_ok());
    }

    #[test]
    fn test_overlong_password_rejected() {
        let long = format!("a1{}", "x".repeat(127));
        assert!(validate_password(&long).is_err());
    }

    // -----------------------------------------------------------------------
    // RADIUS attributes
    // -----------------------------------------------------------------------

    #[test]
    fn test_valid_attribute_names() {
        assert!(validate_attribute_name("Framed-IP-Address").is_ok());
        assert!(validate_attribute_name("Session-Timeout").is_ok());
        assert!(validate_attribute_name("Cisco-AVPair").is_ok());
    }

    #[test]
    fn test_invalid_attribute_names() {
        assert!(validate_attribute_name("").is_err());
        assert!(validate_attribute_name("Framed IP").is_err());
        assert!(validate_attribute_name("attr;drop").is_err());
        assert!(validate_attribute_name(&"A".repeat(65)).is_err());
    }

    #[test]
    fn test_operator_validation() {
        assert!(validate_op(":=").is_ok());
        assert!(validate_op("==").is_ok());
        assert!(validate_op("~=").is_err());
    }

    #[test]
    fn test_attribute_value_bounds() {
        assert!(validate_attribute_value("192.0.2.1").is_ok());
        assert!(validate_attribute_value("").is_err());
        assert!(validate_attribute_value(&"v".repeat(253)).is_ok());
        assert!(validate_attribute_value(&"v".repeat(254)).is_err());
    }

    // -----------------------------------------------------------------------
    // LIKE escaping
    // -----------------------------------------------------------------------

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
