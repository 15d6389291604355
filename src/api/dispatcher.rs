//! Authenticated request dispatcher
//!
//! Turns a [`RequestSpec`] into one HTTP call. The bearer token is read from
//! the [`TokenStore`] at call time. Failures are logged and returned; nothing
//! is retried.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use super::request::{Blob, DecodedBody, RequestSpec, ResponseType};
use crate::auth::TokenStore;
use crate::error::ClientError;
use crate::security::Sanitizer;

/// Header carrying JSON call arguments
pub const API_ARG_HEADER: &str = "Dropbox-API-Arg";

/// Header carrying JSON call results on content endpoints
pub const API_RESULT_HEADER: &str = "Dropbox-API-Result";

/// Issues authenticated requests against the Dropbox API
pub struct RequestDispatcher {
    client: Client,
    store: Arc<dyn TokenStore>,
}

impl RequestDispatcher {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self::with_client(Client::new(), store)
    }

    /// Uses a preconfigured HTTP client (proxies, timeouts, TLS)
    pub fn with_client(client: Client, store: Arc<dyn TokenStore>) -> Self {
        Self { client, store }
    }

    /// Executes the request and decodes the response
    pub async fn request(&self, spec: RequestSpec) -> Result<DecodedBody, ClientError> {
        let result = self.execute(&spec).await;
        if let Err(e) = &result {
            tracing::error!(
                "{} {} failed: {}",
                spec.method(),
                Sanitizer::sanitize_url(&spec.url()),
                e
            );
        }
        result
    }

    async fn execute(&self, spec: &RequestSpec) -> Result<DecodedBody, ClientError> {
        let raw_url = spec.url();
        let url = Url::parse(&raw_url)
            .map_err(|e| ClientError::InvalidRequest(format!("bad URL {}: {}", raw_url, e)))?;
        let method = spec.method();
        let headers = self.build_headers(spec).await?;

        tracing::debug!("{} {}", method, Sanitizer::sanitize_url(&raw_url));

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = spec.body.clone().filter(|b| !b.is_empty()) {
            builder = builder.body(body.into_bytes());
        }

        let response = builder.send().await?;
        let status = response.status();
        tracing::debug!("Response status: {}", status);

        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown Status").to_string(),
            });
        }

        decode(response, spec.response_type).await
    }

    async fn build_headers(&self, spec: &RequestSpec) -> Result<HeaderMap, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        // Without a token the server rejects the call, not us
        let token = self.store.get().await?;
        let mut authorization = match &token {
            Some(token) => HeaderValue::from_str(&token.bearer())
                .map_err(|_| ClientError::InvalidRequest("token is not a valid header value".into()))?,
            None => HeaderValue::from_static("Bearer"),
        };
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        if let Some(content_type) = &spec.headers.content_type {
            let value = HeaderValue::from_str(content_type).map_err(|_| {
                ClientError::InvalidRequest(format!("bad content type {:?}", content_type))
            })?;
            headers.insert(CONTENT_TYPE, value);
        }

        if let Some(arg) = &spec.headers.arg {
            let value = HeaderValue::from_str(&header_safe_json(arg)?)
                .map_err(|e| ClientError::InvalidRequest(format!("bad {} value: {}", API_ARG_HEADER, e)))?;
            headers.insert(HeaderName::from_static("dropbox-api-arg"), value);
        }

        Ok(headers)
    }
}

/// Serializes JSON for an HTTP header, escaping everything outside printable ASCII
pub(crate) fn header_safe_json(value: &Value) -> Result<String, ClientError> {
    let json = serde_json::to_string(value)
        .map_err(|e| ClientError::InvalidRequest(format!("unserializable argument: {}", e)))?;

    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(out)
}

/// Maps a body read failure to a decode or network error
fn body_error(e: reqwest::Error) -> ClientError {
    if e.is_decode() {
        ClientError::Decode(e.to_string())
    } else {
        ClientError::Network(e)
    }
}

async fn decode(response: Response, response_type: ResponseType) -> Result<DecodedBody, ClientError> {
    match response_type {
        ResponseType::Blob => {
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let api_result = response
                .headers()
                .get(API_RESULT_HEADER)
                .map(|v| {
                    serde_json::from_slice::<Value>(v.as_bytes()).map_err(|e| {
                        ClientError::Decode(format!("invalid {} header: {}", API_RESULT_HEADER, e))
                    })
                })
                .transpose()?;
            let data = response.bytes().await.map_err(body_error)?.to_vec();
            Ok(DecodedBody::Blob(Blob {
                data,
                content_type,
                api_result,
            }))
        }
        ResponseType::Json => {
            let bytes = response.bytes().await.map_err(body_error)?;
            serde_json::from_slice(&bytes)
                .map(DecodedBody::Json)
                .map_err(|e| ClientError::Decode(format!("invalid JSON body: {}", e)))
        }
        ResponseType::Bytes => {
            let bytes = response.bytes().await.map_err(body_error)?;
            Ok(DecodedBody::Bytes(bytes.to_vec()))
        }
        ResponseType::Text => {
            let bytes = response.bytes().await.map_err(body_error)?;
            String::from_utf8(bytes.to_vec())
                .map(DecodedBody::Text)
                .map_err(|e| ClientError::Decode(format!("body is not UTF-8: {}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Method;
    use crate::auth::{MemoryTokenStore, MockTokenStore};
    use serde_json::json;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dispatcher(token: Option<&str>) -> RequestDispatcher {
        let store = match token {
            Some(token) => MemoryTokenStore::with_token(token),
            None => MemoryTokenStore::new(),
        };
        RequestDispatcher::new(Arc::new(store))
    }

    #[test]
    fn test_header_safe_json_escapes_non_ascii() {
        let value = json!({"path": "/Fotos/año 🎉.jpg"});
        let encoded = header_safe_json(&value).unwrap();
        assert!(encoded.is_ascii());
        assert_eq!(encoded, r#"{"path":"/Fotos/a\u00f1o \ud83c\udf89.jpg"}"#);

        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, value);
    }

    #[tokio::test]
    async fn test_method_defaults_to_post_and_url_is_concatenated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/p"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let body = dispatcher(Some("T"))
            .request(RequestSpec::new(server.uri(), "/p"))
            .await
            .unwrap();
        assert_eq!(body, DecodedBody::Text("ok".into()));
    }

    #[tokio::test]
    async fn test_explicit_method() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/g"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let result = dispatcher(None)
            .request(RequestSpec::new(server.uri(), "/g").with_method(Method::GET))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_standard_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/h"))
            .and(header("Accept", "application/json"))
            .and(header("Authorization", "Bearer ABC"))
            .and(header("Content-Type", "text/plain"))
            .and(header("Dropbox-API-Arg", r#"{"path":"/a"}"#))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        dispatcher(Some("ABC"))
            .request(
                RequestSpec::new(server.uri(), "/h")
                    .with_content_type("text/plain")
                    .with_arg(json!({"path": "/a"})),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_optional_headers_absent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        dispatcher(None)
            .request(RequestSpec::new(server.uri(), "/none"))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let sent = &requests[0].headers;
        assert!(sent.get("content-type").is_none());
        assert!(sent.get("dropbox-api-arg").is_none());
        assert_eq!(sent.get("authorization").unwrap(), "Bearer");
        assert!(requests[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_token_read_at_call_time() {
        let server = MockServer::start().await;
        Mock::given(header("Authorization", "Bearer FRESH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut store = MockTokenStore::new();
        store
            .expect_get()
            .times(1)
            .returning(|| Ok(Some("FRESH".into())));

        RequestDispatcher::new(Arc::new(store))
            .request(RequestSpec::new(server.uri(), "/t"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_body_passed_through() {
        let server = MockServer::start().await;
        Mock::given(body_bytes(vec![0u8, 159, 146, 150]))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        dispatcher(Some("T"))
            .request(RequestSpec::new(server.uri(), "/b").with_body(vec![0u8, 159, 146, 150]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_not_found_is_api_error_regardless_of_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error_summary": "path/not_found/"})))
            .mount(&server)
            .await;

        let err = dispatcher(Some("T"))
            .request(RequestSpec::new(server.uri(), "/missing").with_response_type(ResponseType::Json))
            .await
            .unwrap_err();

        match err {
            ClientError::Api { status, status_text } => {
                assert_eq!(status, 404);
                assert_eq!(status_text, "Not Found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_decode_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "a.txt"})))
            .mount(&server)
            .await;

        let body = dispatcher(Some("T"))
            .request(RequestSpec::new(server.uri(), "/j").with_response_type(ResponseType::Json))
            .await
            .unwrap();
        assert_eq!(body.into_json().unwrap(), json!({"name": "a.txt"}));
    }

    #[tokio::test]
    async fn test_decode_json_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = dispatcher(Some("T"))
            .request(RequestSpec::new(server.uri(), "/j").with_response_type(ResponseType::Json))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn test_decode_blob_with_api_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Dropbox-API-Result", r#"{"name":"a.bin","size":3}"#)
                    .set_body_raw(vec![1u8, 2, 3], "application/octet-stream"),
            )
            .mount(&server)
            .await;

        let blob = dispatcher(Some("T"))
            .request(RequestSpec::new(server.uri(), "/d").with_response_type(ResponseType::Blob))
            .await
            .unwrap()
            .into_blob()
            .unwrap();

        assert_eq!(blob.data, vec![1, 2, 3]);
        assert_eq!(blob.content_type.as_deref(), Some("application/octet-stream"));
        assert_eq!(blob.api_result, Some(json!({"name": "a.bin", "size": 3})));
    }

    #[tokio::test]
    async fn test_decode_bytes_and_invalid_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xffu8, 0xfe]))
            .mount(&server)
            .await;

        let d = dispatcher(Some("T"));
        let bytes = d
            .request(RequestSpec::new(server.uri(), "/x").with_response_type(ResponseType::Bytes))
            .await
            .unwrap();
        assert_eq!(bytes, DecodedBody::Bytes(vec![0xff, 0xfe]));

        let err = d.request(RequestSpec::new(server.uri(), "/x")).await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn test_network_failure() {
        // Nothing listens on port 1
        let err = dispatcher(Some("T"))
            .request(RequestSpec::new("http://127.0.0.1:1", "/gone"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let err = dispatcher(None)
            .request(RequestSpec::new("not-a-host", "/p"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }
}
