/// Longest database name the server accepts
pub const MAX_DATABASE_NAME_LEN: usize = 64;

/// Longest collection name the server accepts
pub const MAX_COLLECTION_NAME_LEN: usize = 256;

/// Check a database name before it is placed in a URL path
pub fn is_valid_database_name(name: &str) -> bool {
    name.len() <= MAX_DATABASE_NAME_LEN && has_valid_chars(name)
}

/// Check a collection name before it is placed in a URL path
pub fn is_valid_collection_name(name: &str) -> bool {
    name.len() <= MAX_COLLECTION_NAME_LEN && has_valid_chars(name)
}

/// Names are ASCII letters, digits, `_` and `-`, and must start with a letter
/// or `_` (system names such as `_system`).
fn has_valid_chars(name: &str) -> bool {
    let mut chars = name.chars();
    let first_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');

    first_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
