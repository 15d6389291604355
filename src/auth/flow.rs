//! Implicit grant authentication flow

use std::sync::Arc;
use url::Url;

use super::observer::{AuthRedirectObserver, RedirectStrategy};
use super::redirect::{authorize_url, parse_redirect, RedirectOutcome};
use super::token_store::TokenStore;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::security::{AccessToken, Sanitizer};

/// Obtains a fresh token through the provider's redirect flow
pub struct AuthFlow {
    config: Arc<ClientConfig>,
    store: Arc<dyn TokenStore>,
    observer: Arc<dyn AuthRedirectObserver>,
}

impl AuthFlow {
    pub fn new(
        config: Arc<ClientConfig>,
        store: Arc<dyn TokenStore>,
        observer: Arc<dyn AuthRedirectObserver>,
    ) -> Self {
        Self {
            config,
            store,
            observer,
        }
    }

    /// Returns the redirect capture strategy in use
    pub fn strategy(&self) -> RedirectStrategy {
        self.observer.strategy()
    }

    /// Runs the flow and returns the captured token
    ///
    /// Any stored token is cleared first. The first redirect signal decides
    /// the outcome: a token is stored and returned, anything else is
    /// [`ClientError::AuthRejected`]. If the secondary context disappears
    /// without a redirect, the returned future never completes.
    pub async fn authenticate(&self) -> Result<AccessToken, ClientError> {
        self.store.clear().await?;

        let url = authorize_url(&self.config)?;
        tracing::info!(
            "Opening Dropbox authorization page {} ({:?})",
            Sanitizer::sanitize_url(url.as_str()),
            self.strategy()
        );

        let mut subscription = self.observer.subscribe(&url).await?;

        if let Some(signal) = subscription.next_signal().await {
            tracing::debug!("Redirect observed at {}", Sanitizer::sanitize_url(signal.as_str()));

            return match parse_redirect(signal.as_str()) {
                RedirectOutcome::Token(response) => {
                    self.store.set(response.access_token.clone()).await?;
                    if let Err(e) = subscription.close() {
                        tracing::warn!("Failed to close authorization window: {}", e);
                    }
                    tracing::info!(
                        "Dropbox authorization complete, token {}",
                        Sanitizer::sanitize_token(&response.access_token)
                    );
                    Ok(response.access_token)
                }
                RedirectOutcome::Rejected(reason) => {
                    if let Err(e) = subscription.close() {
                        tracing::warn!("Failed to close authorization window: {}", e);
                    }
                    tracing::warn!("Dropbox authorization rejected: {}", reason);
                    Err(ClientError::AuthRejected(reason))
                }
            };
        }

        tracing::debug!("Authorization context went away before a redirect");
        std::future::pending().await
    }

    /// Stores a token carried by a location the app was launched or reloaded with
    ///
    /// No flow has to be pending. A location without a token leaves the store
    /// untouched and yields `None`.
    pub async fn capture_redirect(&self, location: &Url) -> Result<Option<AccessToken>, ClientError> {
        match parse_redirect(location.as_str()) {
            RedirectOutcome::Token(response) => {
                self.store.set(response.access_token.clone()).await?;
                tracing::info!(
                    "Captured Dropbox token {} from {}",
                    Sanitizer::sanitize_token(&response.access_token),
                    Sanitizer::sanitize_url(location.as_str())
                );
                Ok(Some(response.access_token))
            }
            RedirectOutcome::Rejected(reason) => {
                tracing::debug!("No token in location: {}", reason);
                Ok(None)
            }
        }
    }
}
