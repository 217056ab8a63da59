//! Redaction helpers for log output.
//!
//! Secret key material and plaintext must never reach a log line. Call sites
//! wrap values in these types before handing them to `tracing`.

use std::fmt;

/// A wrapper that redacts sensitive data when displayed.
pub struct Redacted<T>(pub T);

impl<T> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Shortened public key, first and last 6 characters only.
pub struct RedactedKey<'a>(pub &'a str);

impl<'a> fmt::Display for RedactedKey<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        if s.len() > 16 && s.is_char_boundary(6) && s.is_char_boundary(s.len() - 6) {
            write!(f, "{}...{}", &s[..6], &s[s.len() - 6..])
        } else {
            write!(f, "[{} chars]", s.chars().count())
        }
    }
}

impl<'a> fmt::Debug for RedactedKey<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Redact a byte slice, showing only length.
pub struct RedactedBytes<'a>(pub &'a [u8]);

impl<'a> fmt::Display for RedactedBytes<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} bytes]", self.0.len())
    }
}

impl<'a> fmt::Debug for RedactedBytes<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_hides_value() {
        let secret = "super-secret-key";
        assert_eq!(format!("{}", Redacted(secret)), "[REDACTED]");
        assert_eq!(format!("{:?}", Redacted(secret)), "[REDACTED]");
    }

    #[test]
    fn test_redacted_key_preview() {
        let key = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
        assert_eq!(format!("{}", RedactedKey(key)), "ABCDEF...456789");
        assert_eq!(format!("{}", RedactedKey("short")), "[5 chars]");
    }

    #[test]
    fn test_redacted_bytes_length_only() {
        assert_eq!(format!("{}", RedactedBytes(&[1, 2, 3])), "[3 bytes]");
    }
}
