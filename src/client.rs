//! Dropbox client facade
//!
//! Composes the token store, the auth flow and the request dispatcher, and
//! exposes the derived file operations.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use crate::api::{
    Blob, DecodedBody, DownloadArg, RequestDispatcher, RequestSpec, ResponseType, UploadArg,
    WriteMode, FILES_DOWNLOAD_PATH, FILES_UPLOAD_PATH, TOKEN_REVOKE_PATH,
};
use crate::auth::{AuthFlow, HostCapabilities, RedirectStrategy, TokenStore};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::security::AccessToken;

/// Dropbox API client
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> Result<(), dbxlink::ClientError> {
/// use std::sync::Arc;
/// use dbxlink::auth::{HostCapabilities, MemoryTokenStore};
/// use dbxlink::config::ClientConfig;
/// use dbxlink::DropboxClient;
///
/// let config = ClientConfig::new("my-app-key", "https://app.example.com/auth");
/// let client = DropboxClient::new(config, Arc::new(MemoryTokenStore::new()), HostCapabilities::default())?;
///
/// client.authenticate().await?;
/// let blob = client.files_download("/notes.txt", None).await?;
/// println!("{} bytes", blob.data.len());
/// # Ok(())
/// # }
/// ```
pub struct DropboxClient {
    config: Arc<ClientConfig>,
    store: Arc<dyn TokenStore>,
    dispatcher: RequestDispatcher,
    auth: AuthFlow,
}

impl DropboxClient {
    /// Creates a client, picking the redirect capture strategy from the host capabilities
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn TokenStore>,
        host: HostCapabilities,
    ) -> Result<Self, ClientError> {
        Self::with_http_client(config, store, host, reqwest::Client::new())
    }

    /// Same as [`DropboxClient::new`] with a preconfigured HTTP client
    pub fn with_http_client(
        config: ClientConfig,
        store: Arc<dyn TokenStore>,
        host: HostCapabilities,
        http: reqwest::Client,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let config = Arc::new(config);
        let observer = host.select_observer(&config)?;
        tracing::debug!("Using {:?} redirect capture", observer.strategy());

        Ok(Self {
            auth: AuthFlow::new(config.clone(), store.clone(), observer),
            dispatcher: RequestDispatcher::with_client(http, store.clone()),
            config,
            store,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Redirect capture strategy chosen at construction
    pub fn strategy(&self) -> RedirectStrategy {
        self.auth.strategy()
    }

    /// Runs the implicit grant flow and stores the resulting token
    pub async fn authenticate(&self) -> Result<AccessToken, ClientError> {
        self.auth.authenticate().await
    }

    /// Stores the token from a location the app was launched or reloaded with
    ///
    /// Hosts call this with their initial location (deep link, page reload,
    /// pasted redirect). Returns `None` when the location carries no token.
    pub async fn capture_redirect(&self, location: &Url) -> Result<Option<AccessToken>, ClientError> {
        self.auth.capture_redirect(location).await
    }

    /// Returns the stored token, if any
    pub async fn token(&self) -> Result<Option<AccessToken>, ClientError> {
        Ok(self.store.get().await?)
    }

    /// Stores a token obtained elsewhere
    pub async fn set_token(&self, token: impl Into<AccessToken>) -> Result<(), ClientError> {
        Ok(self.store.set(token.into()).await?)
    }

    /// Removes the stored token
    pub async fn clear_token(&self) -> Result<(), ClientError> {
        Ok(self.store.clear().await?)
    }

    /// Forgets the token locally without revoking it
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.clear_token().await?;
        tracing::info!("Cleared stored Dropbox token");
        Ok(())
    }

    /// Issues an arbitrary authenticated request
    pub async fn request(&self, spec: RequestSpec) -> Result<DecodedBody, ClientError> {
        self.dispatcher.request(spec).await
    }

    /// Revokes the current token on the server, then clears it locally
    pub async fn revoke_token(&self) -> Result<DecodedBody, ClientError> {
        let spec = RequestSpec::new(&self.config.hosts.api, TOKEN_REVOKE_PATH)
            .with_content_type("application/json")
            .with_body("null");

        let body = self.request(spec).await?;
        self.store.clear().await?;
        tracing::info!("Dropbox token revoked");
        Ok(body)
    }

    /// Downloads a file, optionally at a specific revision
    pub async fn files_download(&self, path: &str, rev: Option<&str>) -> Result<Blob, ClientError> {
        let arg = DownloadArg {
            path: path.to_string(),
            rev: rev.map(str::to_string),
        };
        let spec = RequestSpec::new(&self.config.hosts.content, FILES_DOWNLOAD_PATH)
            .with_arg(to_arg(&arg)?)
            .with_response_type(ResponseType::Blob);

        self.request(spec).await?.into_blob()
    }

    /// Uploads a file and returns its metadata
    pub async fn files_upload(
        &self,
        file: Vec<u8>,
        path: &str,
        mode: WriteMode,
        autorename: bool,
        client_modified: Option<DateTime<Utc>>,
        mute: bool,
    ) -> Result<Value, ClientError> {
        let arg = UploadArg {
            path: path.to_string(),
            mode,
            autorename,
            client_modified,
            mute,
        };
        tracing::debug!("Uploading {} bytes to {}", file.len(), path);

        let spec = RequestSpec::new(&self.config.hosts.content, FILES_UPLOAD_PATH)
            .with_body(file)
            .with_content_type("application/octet-stream")
            .with_arg(to_arg(&arg)?)
            .with_response_type(ResponseType::Json);

        self.request(spec).await?.into_json()
    }
}

fn to_arg<T: Serialize>(arg: &T) -> Result<Value, ClientError> {
    serde_json::to_value(arg)
        .map_err(|e| ClientError::InvalidRequest(format!("unserializable argument: {}", e)))
}
