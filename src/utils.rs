//! Helpers for keeping secrets and large payloads out of logs
//!
//! Truncation respects UTF-8 character boundaries so that server bodies in
//! Spanish or containing emoji never cause a panic when shortened.

/// Number of characters of a token kept visible by [`redact`]
const REDACT_VISIBLE_CHARS: usize = 4;

/// Shorten a string to at most `max_bytes`, appending "..." when cut.
///
/// # Example
/// ```
/// use clinic_api_client::utils::truncate_for_display;
///
/// assert_eq!(truncate_for_display("Cita confirmada", 4), "Cita...");
/// assert_eq!(truncate_for_display("ok", 10), "ok");
/// ```
#[must_use]
pub fn truncate_for_display(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }

    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }

    format!("{}...", &s[..boundary])
}

/// Mask a token for logging, keeping only a short prefix.
///
/// # Example
/// ```
/// use clinic_api_client::utils::redact;
///
/// assert_eq!(redact("eyJhbGciOiJIUzI1NiJ9"), "eyJh***");
/// assert_eq!(redact("abc"), "***");
/// ```
#[must_use]
pub fn redact(token: &str) -> String {
    if token.chars().count() <= REDACT_VISIBLE_CHARS * 2 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(REDACT_VISIBLE_CHARS).collect();
    format!("{prefix}***")
}
