//! Authorization URL construction and redirect parsing for the implicit grant

use url::Url;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::security::AccessToken;

/// Path of the implicit grant authorization page on the auth host
pub const AUTHORIZE_PATH: &str = "/1/oauth2/authorize";

/// Builds the authorization page URL for the configured app
pub fn authorize_url(config: &ClientConfig) -> Result<Url, ClientError> {
    let base = format!("{}{}", config.hosts.auth.trim_end_matches('/'), AUTHORIZE_PATH);
    Url::parse_with_params(
        &base,
        &[
            ("client_id", config.app_key.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("response_type", "token"),
        ],
    )
    .map_err(|e| ClientError::InvalidRequest(format!("bad authorization URL {}: {}", base, e)))
}

/// Parameters carried by a successful redirect fragment
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationResponse {
    pub access_token: AccessToken,
    pub token_type: Option<String>,
    pub uid: Option<String>,
    pub account_id: Option<String>,
    pub state: Option<String>,
}

/// Result of inspecting one redirect signal
#[derive(Debug, Clone, PartialEq)]
pub enum RedirectOutcome {
    /// The redirect carried a token
    Token(AuthorizationResponse),
    /// The redirect carried no token; holds the reason
    Rejected(String),
}

/// Inspects a redirect URL (or bare fragment) for a token marker
///
/// The fragment is used when present, otherwise the query string. A
/// hash-routed fragment such as `#/cb?access_token=...` is read from its
/// query part. Both `access_token=` and `token=` count as markers.
pub fn parse_redirect(signal: &str) -> RedirectOutcome {
    let params = match (signal.find('#'), signal.find('?')) {
        (Some(hash), _) => &signal[hash + 1..],
        (None, Some(query)) => &signal[query + 1..],
        (None, None) => signal,
    };
    let params = match params.split_once('?') {
        Some((route, query)) if !route.contains('=') => query,
        _ => params,
    };

    let mut access_token = None;
    let mut token = None;
    let mut token_type = None;
    let mut uid = None;
    let mut account_id = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;

    for (key, value) in url::form_urlencoded::parse(params.as_bytes()) {
        let value = value.into_owned();
        match key.as_ref() {
            "access_token" => access_token = Some(value),
            "token" => token = Some(value),
            "token_type" => token_type = Some(value),
            "uid" => uid = Some(value),
            "account_id" => account_id = Some(value),
            "state" => state = Some(value),
            "error" => error = Some(value),
            "error_description" => error_description = Some(value),
            _ => {}
        }
    }

    match access_token.or(token).filter(|t| !t.is_empty()) {
        Some(value) => RedirectOutcome::Token(AuthorizationResponse {
            access_token: AccessToken::new(value),
            token_type,
            uid,
            account_id,
            state,
        }),
        None => {
            let reason = match (error, error_description) {
                (Some(error), Some(description)) => format!("{}: {}", error, description),
                (Some(error), None) => error,
                (None, _) => "redirect carried no access token".to_string(),
            };
            RedirectOutcome::Rejected(reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_token(outcome: RedirectOutcome) -> AuthorizationResponse {
        match outcome {
            RedirectOutcome::Token(response) => response,
            RedirectOutcome::Rejected(reason) => panic!("unexpected rejection: {}", reason),
        }
    }

    #[test]
    fn test_authorize_url() {
        let config = ClientConfig::new("my app", "https://app.example.com/cb?x=1");
        let url = authorize_url(&config).unwrap();

        assert_eq!(url.host_str(), Some("www.dropbox.com"));
        assert_eq!(url.path(), "/1/oauth2/authorize");

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("client_id".to_string(), "my app".to_string()),
                ("redirect_uri".to_string(), "https://app.example.com/cb?x=1".to_string()),
                ("response_type".to_string(), "token".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_full_redirect() {
        let response = expect_token(parse_redirect(
            "https://app.example.com/cb#access_token=ABC&token_type=bearer&uid=42&account_id=dbid%3AAAA",
        ));
        assert_eq!(response.access_token, "ABC");
        assert_eq!(response.token_type.as_deref(), Some("bearer"));
        assert_eq!(response.uid.as_deref(), Some("42"));
        assert_eq!(response.account_id.as_deref(), Some("dbid:AAA"));
        assert!(response.state.is_none());
    }

    #[test]
    fn test_parse_bare_fragment() {
        let response = expect_token(parse_redirect("#access_token=ABC&token_type=bearer"));
        assert_eq!(response.access_token, "ABC");
    }

    #[test]
    fn test_parse_token_marker() {
        let response = expect_token(parse_redirect("https://app.example.com/#token=XYZ"));
        assert_eq!(response.access_token, "XYZ");
    }

    #[test]
    fn test_parse_query_fallback() {
        let response = expect_token(parse_redirect("https://app.example.com/cb?access_token=Q1"));
        assert_eq!(response.access_token, "Q1");
    }

    #[test]
    fn test_parse_hash_routed_fragment() {
        let response = expect_token(parse_redirect(
            "https://app.example.com/#/cb?access_token=HR1&token_type=bearer",
        ));
        assert_eq!(response.access_token, "HR1");
        assert_eq!(response.token_type.as_deref(), Some("bearer"));

        let response = expect_token(parse_redirect("#!/auth?token=HR2"));
        assert_eq!(response.access_token, "HR2");
    }

    #[test]
    fn test_parse_question_mark_inside_value() {
        let response = expect_token(parse_redirect("#access_token=A?B&uid=1"));
        assert_eq!(response.access_token, "A?B");
    }

    #[test]
    fn test_parse_no_marker() {
        assert_eq!(
            parse_redirect("https://app.example.com/cb#section"),
            RedirectOutcome::Rejected("redirect carried no access token".into())
        );
    }

    #[test]
    fn test_parse_empty_token() {
        assert!(matches!(
            parse_redirect("https://app.example.com/cb#access_token="),
            RedirectOutcome::Rejected(_)
        ));
    }

    #[test]
    fn test_parse_user_denied() {
        assert_eq!(
            parse_redirect(
                "https://app.example.com/cb#error=access_denied&error_description=The+user+denied"
            ),
            RedirectOutcome::Rejected("access_denied: The user denied".into())
        );
    }
}
