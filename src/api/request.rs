//! Request and response value types for the dispatcher

pub use reqwest::Method;
use serde_json::Value;

use crate::error::ClientError;

/// Request body, passed through unchanged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Bytes(Vec<u8>),
    Text(String),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Bytes(bytes) => bytes.is_empty(),
            RequestBody::Text(text) => text.is_empty(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            RequestBody::Bytes(bytes) => bytes,
            RequestBody::Text(text) => text.into_bytes(),
        }
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

/// Optional headers derived from the request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderDirectives {
    /// Sent as `Content-Type`
    pub content_type: Option<String>,
    /// Sent JSON-encoded as `Dropbox-API-Arg`
    pub arg: Option<Value>,
}

/// How the response body should be decoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseType {
    /// Bytes plus content type and `Dropbox-API-Result` metadata
    Blob,
    /// Parsed JSON
    Json,
    /// Raw byte buffer
    Bytes,
    /// UTF-8 text
    #[default]
    Text,
}

/// Description of one API call
///
/// # Example
///
/// ```
/// use dbxlink::api::{RequestSpec, ResponseType};
///
/// let spec = RequestSpec::new("https://api.dropboxapi.com", "/2/users/get_current_account")
///     .with_content_type("application/json")
///     .with_body("null")
///     .with_response_type(ResponseType::Json);
/// assert_eq!(spec.url(), "https://api.dropboxapi.com/2/users/get_current_account");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestSpec {
    pub host: String,
    pub path: String,
    /// Defaults to `POST`
    pub method: Option<Method>,
    pub body: Option<RequestBody>,
    pub headers: HeaderDirectives,
    pub response_type: ResponseType,
}

impl RequestSpec {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.headers.content_type = Some(content_type.into());
        self
    }

    pub fn with_arg(mut self, arg: Value) -> Self {
        self.headers.arg = Some(arg);
        self
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Absolute URL: host and path concatenated verbatim
    pub fn url(&self) -> String {
        format!("{}{}", self.host, self.path)
    }

    /// Method to use, `POST` when unspecified
    pub fn method(&self) -> Method {
        self.method.clone().unwrap_or(Method::POST)
    }
}

/// Downloaded content with its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    /// Parsed `Dropbox-API-Result` header, if the server sent one
    pub api_result: Option<Value>,
}

/// A response body decoded per [`ResponseType`]
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedBody {
    Blob(Blob),
    Json(Value),
    Bytes(Vec<u8>),
    Text(String),
}

impl DecodedBody {
    pub fn into_blob(self) -> Result<Blob, ClientError> {
        match self {
            DecodedBody::Blob(blob) => Ok(blob),
            other => Err(ClientError::Decode(format!("expected blob, got {}", other.kind()))),
        }
    }

    pub fn into_json(self) -> Result<Value, ClientError> {
        match self {
            DecodedBody::Json(value) => Ok(value),
            other => Err(ClientError::Decode(format!("expected JSON, got {}", other.kind()))),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DecodedBody::Text(text) => Some(text),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            DecodedBody::Blob(_) => "blob",
            DecodedBody::Json(_) => "JSON",
            DecodedBody::Bytes(_) => "bytes",
            DecodedBody::Text(_) => "text",
        }
    }
}
