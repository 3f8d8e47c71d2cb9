//! SHA-256 digests of raw model output.
//!
//! Step results log the digest instead of the full reply so two runs can be
//! compared without dumping model text into the log stream.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `text`.
pub fn raw_output_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// First 12 chars of a hex digest, for log lines. Shorter input, or input
/// where byte 12 is not a char boundary, comes back whole.
pub fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable_hex() {
        let a = raw_output_digest("{\"indicators\": []}");
        let b = raw_output_digest("{\"indicators\": []}");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_differs_on_whitespace() {
        assert_ne!(raw_output_digest("{}"), raw_output_digest("{ }"));
    }

    #[test]
    fn test_short_digest() {
        let d = raw_output_digest("x");
        assert_eq!(short_digest(&d).len(), 12);
        assert_eq!(short_digest("abc"), "abc");
    }

    #[test]
    fn test_short_digest_never_splits_a_char() {
        let text = "abcdefghijk\u{e9}z";
        assert_eq!(short_digest(text), text);
        let accents = "\u{e9}".repeat(7);
        assert_eq!(short_digest(&accents), "\u{e9}".repeat(6));
    }
}
