//! Email address normalization.

use crate::error::AccountError;

/// Trims and lowercases `raw`, then checks it has the shape `local@domain`.
///
/// # Errors
///
/// Returns `AccountError::Validation` if the address is malformed.
pub fn normalize_email(raw: &str) -> Result<String, AccountError> {
    let email = raw.trim().to_lowercase();
    let invalid = || AccountError::Validation(format!("invalid email address: {raw:?}"));

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  Ana@Example.COM ").unwrap(), "ana@example.com");
    }

    #[test]
    fn test_normalize_email_rejects_malformed_addresses() {
        for raw in ["", "ana", "@example.com", "ana@", "a@b@c", "ana smith@example.com"] {
            assert!(
                matches!(normalize_email(raw), Err(AccountError::Validation(_))),
                "{raw:?} should be rejected"
            );
        }
    }
}
