//! dbxlink - Dropbox API client with implicit grant authentication
//!
//! Obtains a bearer token through the OAuth2 implicit grant redirect and
//! issues authenticated file operations against the Dropbox HTTP API.
//!
//! ## Features
//!
//! - Implicit grant flow with two redirect capture strategies: the app's own
//!   location changes, or navigation events of an embedded popup
//! - Durable token storage in the OS credential manager or a per-user file
//! - Generic authenticated request dispatch with typed response decoding
//! - `files/download`, `files/upload` and `auth/token/revoke` helpers
//!
//! ## Architecture
//!
//! - **Auth**: token storage, authorization URL, redirect observers, the flow
//! - **Api**: request specs, the dispatcher, endpoint argument types
//! - **Security**: zeroizing token type and log sanitization
//! - **Config**: app key, redirect URI, hosts, popup geometry

pub mod api;
pub mod auth;
mod client;
pub mod config;
mod error;
pub mod security;

pub use client::DropboxClient;
pub use error::ClientError;

/// Installs the default `tracing` subscriber, writing to stderr
///
/// Honors `RUST_LOG`; falls back to debug output for this crate and info for
/// everything else. Stdout stays free for command output. Does nothing if a
/// subscriber is already installed.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dbxlink=debug,info"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
