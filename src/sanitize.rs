//! Whitelist validation for strings that end up inside SQL text.
//!
//! The engine cannot bind identifiers (schema, table, and column names) as
//! statement parameters, so anything interpolated into SQL must first pass
//! one of these predicates. All of them are pure; callers reject the input
//! and leave prior state unchanged when a predicate returns `false`.

/// True iff `s` is non-empty after trimming and contains only ASCII
/// letters, digits, and underscores. Used for usernames and group names.
pub fn validate_identifier(s: &str) -> bool {
    !s.trim().is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// True iff `s` contains only letters, spaces, hyphens, and apostrophes.
/// Used for the first/last name fields of a contact.
pub fn validate_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphabetic() || c == ' ' || c == '-' || c == '\'')
}

/// True iff `s` consists of digits with at most one leading `+`.
pub fn validate_phone(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    let digits = s.strip_prefix('+').unwrap_or(s);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Doubles apostrophes so an accepted name value can sit between single
/// quotes in SQL text without closing the literal.
pub fn escape_name(s: &str) -> String {
    s.replace('\'', "''")
}
