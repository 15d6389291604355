//! Authentication module - Token storage and the implicit grant flow
//!
//! Provides:
//! - Durable token storage (OS credential manager via the keyring crate, or a file)
//! - Authorization URL building and redirect parsing
//! - Redirect capture through location changes or an embedded popup

mod flow;
mod observer;
mod redirect;
mod token_store;

#[cfg(feature = "tauri-popup")]
mod tauri_popup;

pub use flow::AuthFlow;
pub use observer::{
    AuthRedirectObserver, ExternalBrowser, HashChangeObserver, HostCapabilities, LocationFeed,
    Popup, PopupLauncher, PopupNavigationObserver, PopupWindow, RedirectStrategy,
    RedirectSubscription, SystemBrowser,
};
pub use redirect::{authorize_url, parse_redirect, AuthorizationResponse, RedirectOutcome};
pub use token_store::{
    FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore, TokenStoreError, TOKEN_KEY,
};

#[cfg(test)]
pub use token_store::MockTokenStore;

#[cfg(feature = "tauri-popup")]
pub use tauri_popup::TauriPopupLauncher;
