//! Bearer token handling with automatic memory zeroization
//!
//! The access token returned by the implicit grant redirect is the only
//! credential this crate holds. It is wiped from memory on drop and never
//! shows up in `Debug` output.

use std::fmt;
use std::ops::Deref;
use zeroize::Zeroizing;

/// An opaque Dropbox bearer token
///
/// # Example
///
/// ```
/// use dbxlink::security::AccessToken;
///
/// let token = AccessToken::new("sl.AbCdEf".to_string());
/// assert_eq!(token.as_str(), "sl.AbCdEf");
/// assert!(!format!("{:?}", token).contains("AbCdEf"));
/// ```
#[derive(Clone)]
pub struct AccessToken(Zeroizing<String>);

impl AccessToken {
    /// Wraps a token string, taking ownership of its buffer
    pub fn new(token: String) -> Self {
        Self(Zeroizing::new(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value of an `Authorization` header carrying this token
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.as_str())
    }
}

impl Deref for AccessToken {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl From<String> for AccessToken {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for AccessToken {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

// Constant-time comparison
impl PartialEq for AccessToken {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(self.as_str().as_bytes(), other.as_str().as_bytes())
    }
}

impl Eq for AccessToken {}

impl PartialEq<&str> for AccessToken {
    fn eq(&self, other: &&str) -> bool {
        constant_time_eq(self.as_str().as_bytes(), other.as_bytes())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_bearer() {
        let token = AccessToken::from("ABC");
        assert_eq!(token.as_str(), "ABC");
        assert_eq!(token.bearer(), "Bearer ABC");
    }

    #[test]
    fn test_access_token_debug_redacted() {
        let token = AccessToken::from("sl.super-secret");
        let debug_output = format!("{:?}", token);
        assert!(!debug_output.contains("super-secret"));
        assert_eq!(debug_output, "AccessToken([REDACTED])");
    }

    #[test]
    fn test_access_token_equality() {
        let a = AccessToken::from("same");
        let b = AccessToken::from(String::from("same"));
        let c = AccessToken::from("other");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a == "same");
        assert!(a != "sam");
    }

    #[test]
    fn test_constant_time_eq_different_lengths() {
        assert!(!constant_time_eq(b"short", b"longer value"));
        assert!(constant_time_eq(b"value", b"value"));
    }
}
