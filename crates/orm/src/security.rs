//! Identifier validation for table names interpolated into SQL
//!
//! Ledger and seed table names come from configuration, not from bound
//! parameters, so they are checked before being formatted into statements.

use crate::error::{OrmError, OrmResult};

/// Characters allowed in SQL identifiers (alphanumeric, underscore)
const ALLOWED_IDENTIFIER_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_";

/// PostgreSQL truncates identifiers longer than this
const MAX_IDENTIFIER_LEN: usize = 63;

/// SQL keywords that must not be used as bare table names
static SQL_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "FROM", "WHERE", "JOIN", "UNION", "DROP", "CREATE",
    "ALTER", "GRANT", "REVOKE", "TRUNCATE", "TABLE", "ORDER", "GROUP", "USER",
];

/// Escape a SQL identifier by doubling quotes and wrapping it in double quotes
pub fn escape_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Validate that an identifier is safe for use in SQL
pub fn validate_identifier(identifier: &str) -> OrmResult<()> {
    let invalid = |reason: String| OrmError::InvalidIdentifier {
        identifier: identifier.to_string(),
        reason,
    };

    let Some(first) = identifier.chars().next() else {
        return Err(invalid("identifier cannot be empty".to_string()));
    };

    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid(format!(
            "too long (max {} characters)",
            MAX_IDENTIFIER_LEN
        )));
    }

    if let Some(c) = identifier
        .chars()
        .find(|c| !ALLOWED_IDENTIFIER_CHARS.contains(*c))
    {
        return Err(invalid(format!("contains invalid character '{}'", c)));
    }

    if first.is_ascii_digit() {
        return Err(invalid("cannot start with a number".to_string()));
    }

    if SQL_KEYWORDS.contains(&identifier.to_uppercase().as_str()) {
        return Err(invalid("is a reserved SQL keyword".to_string()));
    }

    Ok(())
}
