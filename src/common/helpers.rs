// Helper functions for safe logging and timestamp formatting

use chrono::{DateTime, SecondsFormat, Utc};

/// Masks email addresses for safe logging
/// Prevents sensitive data exposure while preserving debugging utility
///
/// # Example
/// ```ignore
/// let masked = safe_email_log("user@example.com");
/// // Returns: "u***@example.com"
/// ```
pub fn safe_email_log(email: &str) -> String {
    if email.chars().count() > 3 {
        let parts: Vec<&str> = email.split('@').collect();
        if let (2, Some(first)) = (parts.len(), parts[0].chars().next()) {
            return format!("{}***@{}", first, parts[1]);
        }
    }
    "***@***.***".to_string()
}

/// Masks tokens for safe logging
/// Shows only first and last 4 characters
pub fn safe_token_log(token: &str) -> String {
    if token.len() > 8 && token.is_ascii() {
        format!("{}...{}", &token[..4], &token[token.len() - 4..])
    } else {
        "***".to_string()
    }
}

/// Fixed-width UTC timestamp so TEXT columns compare chronologically
pub fn db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_email_log() {
        assert_eq!(safe_email_log("user@example.com"), "u***@example.com");
        assert_eq!(safe_email_log("abc"), "***@***.***");
        assert_eq!(safe_email_log("not-an-email"), "***@***.***");
        assert_eq!(safe_email_log("@example.com"), "***@***.***");
    }

    #[test]
    fn test_safe_email_log_multibyte_local_part() {
        assert_eq!(safe_email_log("ñandu@example.com"), "ñ***@example.com");
        assert_eq!(safe_email_log("日本@例え.jp"), "日***@例え.jp");
    }

    #[test]
    fn test_safe_token_log() {
        assert_eq!(safe_token_log("secret_abcdefghijkl"), "secr...ijkl");
        assert_eq!(safe_token_log("short"), "***");
    }

    #[test]
    fn test_db_timestamp_is_fixed_width() {
        use chrono::TimeZone;
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(db_timestamp(at), "2026-01-02T03:04:05Z");
    }
}
