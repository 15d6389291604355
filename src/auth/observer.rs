//! Redirect capture strategies
//!
//! The authorization page lives in a secondary browsing context. Depending on
//! what the host offers, the redirect back to the app is seen either as a
//! change of the app's own location ([`HashChangeObserver`]) or as a
//! navigation inside an embedded popup ([`PopupNavigationObserver`]). The
//! strategy is picked once, by [`HostCapabilities::select_observer`].

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use url::Url;

use crate::config::{ClientConfig, PopupGeometry};
use crate::error::ClientError;
use crate::security::Sanitizer;

/// Which redirect capture strategy an observer implements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectStrategy {
    /// The app's own location changes carry the token fragment
    HashChange,
    /// An embedded popup reports navigation starts
    PopupNavigation,
}

/// A window the auth flow can close once the token is captured
pub trait PopupWindow: Send + Sync {
    fn close(&self) -> Result<(), ClientError>;
}

/// An opened embedded-browser popup
pub struct Popup {
    /// Every URL the popup starts navigating to
    pub navigations: mpsc::UnboundedReceiver<Url>,
    /// Handle used to close the popup
    pub window: Box<dyn PopupWindow>,
}

/// Host capability: open an embedded browser popup
#[async_trait]
pub trait PopupLauncher: Send + Sync {
    async fn launch(&self, url: &Url, geometry: PopupGeometry) -> Result<Popup, ClientError>;
}

/// Host capability: hand a URL to an external browser
pub trait ExternalBrowser: Send + Sync {
    fn open(&self, url: &Url) -> Result<(), ClientError>;
}

/// Opens URLs in the system default browser
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl ExternalBrowser for SystemBrowser {
    fn open(&self, url: &Url) -> Result<(), ClientError> {
        opener::open(url.as_str()).map_err(|e| ClientError::Browser(e.to_string()))
    }
}

/// Publishes the app's own location changes
///
/// Hosts push every URL the app is (re)opened with: a deep link, a page
/// reload with a fragment, or a redirect URL pasted by the user.
#[derive(Debug, Clone)]
pub struct LocationFeed {
    tx: broadcast::Sender<Url>,
}

impl LocationFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Publishes a new location
    pub fn publish(&self, url: Url) {
        // No subscriber means no flow is waiting
        let _ = self.tx.send(url);
    }

    /// Parses and publishes a location
    pub fn publish_str(&self, url: &str) -> Result<(), ClientError> {
        let url = Url::parse(url.trim())
            .map_err(|e| ClientError::InvalidRequest(format!("not a URL: {}", e)))?;
        self.publish(url);
        Ok(())
    }

    /// Subscribes to locations published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Url> {
        self.tx.subscribe()
    }
}

impl Default for LocationFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription to redirect signals
///
/// Dropping the subscription unsubscribes. The signal stream ends when the
/// secondary context goes away.
pub struct RedirectSubscription {
    signals: mpsc::UnboundedReceiver<Url>,
    window: Option<Box<dyn PopupWindow>>,
    forwarder: Option<JoinHandle<()>>,
}

impl RedirectSubscription {
    /// Builds a subscription from a signal stream and an optional window to close
    pub fn new(signals: mpsc::UnboundedReceiver<Url>, window: Option<Box<dyn PopupWindow>>) -> Self {
        Self {
            signals,
            window,
            forwarder: None,
        }
    }

    fn with_forwarder(mut self, forwarder: JoinHandle<()>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Waits for the next redirect signal
    pub async fn next_signal(&mut self) -> Option<Url> {
        self.signals.recv().await
    }

    /// Unsubscribes and closes the secondary context, if it can be closed
    pub fn close(mut self) -> Result<(), ClientError> {
        self.signals.close();
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        match self.window.take() {
            Some(window) => window.close(),
            None => Ok(()),
        }
    }
}

impl Drop for RedirectSubscription {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

/// Opens the authorization page and reports redirect signals
#[async_trait]
pub trait AuthRedirectObserver: Send + Sync {
    fn strategy(&self) -> RedirectStrategy;

    async fn subscribe(&self, authorize_url: &Url) -> Result<RedirectSubscription, ClientError>;
}

/// Watches the app's own location for a token fragment
///
/// The authorization page opens in an external browser, which the crate
/// cannot close afterwards.
pub struct HashChangeObserver {
    feed: LocationFeed,
    browser: Arc<dyn ExternalBrowser>,
}

impl HashChangeObserver {
    pub fn new(feed: LocationFeed, browser: Arc<dyn ExternalBrowser>) -> Self {
        Self { feed, browser }
    }
}

#[async_trait]
impl AuthRedirectObserver for HashChangeObserver {
    fn strategy(&self) -> RedirectStrategy {
        RedirectStrategy::HashChange
    }

    async fn subscribe(&self, authorize_url: &Url) -> Result<RedirectSubscription, ClientError> {
        // Subscribe before opening so a fast redirect is not missed
        let mut locations = self.feed.subscribe();
        self.browser.open(authorize_url)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(async move {
            loop {
                match locations.recv().await {
                    Ok(url) => {
                        if url.fragment().map_or(true, str::is_empty) {
                            continue;
                        }
                        if tx.send(url).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Location feed lagged, skipped {} updates", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(RedirectSubscription::new(rx, None).with_forwarder(forwarder))
    }
}

/// Watches navigation starts inside an embedded popup
///
/// Only navigations targeting the redirect URI are signals; the provider's
/// own login pages are ignored.
pub struct PopupNavigationObserver {
    launcher: Arc<dyn PopupLauncher>,
    redirect_uri: Url,
    geometry: PopupGeometry,
}

impl PopupNavigationObserver {
    pub fn new(launcher: Arc<dyn PopupLauncher>, redirect_uri: Url, geometry: PopupGeometry) -> Self {
        Self {
            launcher,
            redirect_uri,
            geometry,
        }
    }
}

/// True when `url` points at the same origin and path as the redirect URI
fn targets_redirect(redirect_uri: &Url, url: &Url) -> bool {
    url.scheme() == redirect_uri.scheme()
        && url.host_str() == redirect_uri.host_str()
        && url.port_or_known_default() == redirect_uri.port_or_known_default()
        && url.path() == redirect_uri.path()
}

#[async_trait]
impl AuthRedirectObserver for PopupNavigationObserver {
    fn strategy(&self) -> RedirectStrategy {
        RedirectStrategy::PopupNavigation
    }

    async fn subscribe(&self, authorize_url: &Url) -> Result<RedirectSubscription, ClientError> {
        let Popup {
            mut navigations,
            window,
        } = self.launcher.launch(authorize_url, self.geometry).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let redirect_uri = self.redirect_uri.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(url) = navigations.recv().await {
                if !targets_redirect(&redirect_uri, &url) {
                    tracing::trace!("Ignoring popup navigation to {}", Sanitizer::sanitize_url(url.as_str()));
                    continue;
                }
                if tx.send(url).is_err() {
                    break;
                }
            }
        });

        Ok(RedirectSubscription::new(rx, Some(window)).with_forwarder(forwarder))
    }
}

/// What the host environment can do for the auth flow
#[derive(Clone)]
pub struct HostCapabilities {
    embedded_browser: Option<Arc<dyn PopupLauncher>>,
    location_feed: LocationFeed,
    external_browser: Arc<dyn ExternalBrowser>,
}

impl HostCapabilities {
    /// A host that only sees its own location changes
    pub fn new(location_feed: LocationFeed) -> Self {
        Self {
            embedded_browser: None,
            location_feed,
            external_browser: Arc::new(SystemBrowser),
        }
    }

    /// Adds an embedded browser, which takes precedence over location tracking
    pub fn with_embedded_browser(mut self, launcher: Arc<dyn PopupLauncher>) -> Self {
        self.embedded_browser = Some(launcher);
        self
    }

    /// Replaces the browser used to open the authorization page externally
    pub fn with_external_browser(mut self, browser: Arc<dyn ExternalBrowser>) -> Self {
        self.external_browser = browser;
        self
    }

    /// Returns the feed hosts publish location changes into
    pub fn location_feed(&self) -> &LocationFeed {
        &self.location_feed
    }

    /// Picks the redirect capture strategy for this host
    pub fn select_observer(
        &self,
        config: &ClientConfig,
    ) -> Result<Arc<dyn AuthRedirectObserver>, ClientError> {
        match &self.embedded_browser {
            Some(launcher) => {
                let redirect_uri = Url::parse(&config.redirect_uri).map_err(|e| {
                    ClientError::InvalidRequest(format!("bad redirect URI: {}", e))
                })?;
                Ok(Arc::new(PopupNavigationObserver::new(
                    launcher.clone(),
                    redirect_uri,
                    config.popup,
                )))
            }
            None => Ok(Arc::new(HashChangeObserver::new(
                self.location_feed.clone(),
                self.external_browser.clone(),
            ))),
        }
    }
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self::new(LocationFeed::new())
    }
}
