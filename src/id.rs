//! Page token generation.
//!
//! A token is the only capability needed to view a page, so it is drawn from
//! a v4 UUID (122 random bits) and rendered as 32 lowercase hex chars, which
//! is safe to embed directly in a URL path segment.

use uuid::Uuid;

/// Length of a rendered token.
pub const TOKEN_LEN: usize = 32;

/// Generates a fresh page token.
pub fn gen_token() -> String {
    Uuid::new_v4().as_simple().to_string()
}

/// Cheap shape check to reject garbage before hitting the database.
pub fn is_valid_token(s: &str) -> bool {
    s.len() == TOKEN_LEN && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

/// Short prefix of a token for log lines. The full token is a bearer
/// credential and stays out of logs.
pub fn token_prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}
