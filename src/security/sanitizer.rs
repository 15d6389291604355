//! Log sanitization for credentials and redirect URLs
//!
//! Implicit grant redirects carry the bearer token in the URL fragment, so
//! every URL that reaches a log line goes through [`Sanitizer::sanitize_url`].

/// Sanitizer for sensitive data
pub struct Sanitizer;

impl Sanitizer {
    /// Sanitizes a token for safe logging
    ///
    /// Shows only the last 4 characters preceded by "***".
    ///
    /// # Examples
    ///
    /// ```
    /// use dbxlink::security::Sanitizer;
    ///
    /// assert_eq!(Sanitizer::sanitize_token("sl.BAbcdefghijklmnop"), "***mnop");
    /// assert_eq!(Sanitizer::sanitize_token("abc"), "****");
    /// ```
    pub fn sanitize_token(token: &str) -> String {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() > 4 {
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("***{}", tail)
        } else {
            "****".to_string()
        }
    }

    /// Strips query parameters and fragments from a URL
    ///
    /// # Examples
    ///
    /// ```
    /// use dbxlink::security::Sanitizer;
    ///
    /// assert_eq!(
    ///     Sanitizer::sanitize_url("https://app.example.com/cb#access_token=secret"),
    ///     "https://app.example.com/cb"
    /// );
    /// ```
    pub fn sanitize_url(url: &str) -> String {
        let end = url.find(['?', '#']).unwrap_or(url.len());
        url[..end].to_string()
    }
}
