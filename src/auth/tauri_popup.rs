//! Embedded webview popup backed by Tauri
//!
//! Enabled with the `tauri-popup` feature. Navigation starts inside the
//! webview are reported to the auth flow through `on_navigation`.

use async_trait::async_trait;
use tauri::{AppHandle, Runtime, WebviewUrl, WebviewWindow, WebviewWindowBuilder};
use tokio::sync::mpsc;
use url::Url;

use super::observer::{Popup, PopupLauncher, PopupWindow};
use crate::config::PopupGeometry;
use crate::error::ClientError;

/// Opens the authorization page in a Tauri webview window
pub struct TauriPopupLauncher<R: Runtime> {
    app: AppHandle<R>,
    label: String,
}

impl<R: Runtime> TauriPopupLauncher<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self {
            app,
            label: "dropbox-auth".to_string(),
        }
    }

    /// Uses a custom window label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

#[async_trait]
impl<R: Runtime> PopupLauncher for TauriPopupLauncher<R> {
    async fn launch(&self, url: &Url, geometry: PopupGeometry) -> Result<Popup, ClientError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let window = WebviewWindowBuilder::new(&self.app, self.label.clone(), WebviewUrl::External(url.clone()))
            .title("Dropbox")
            .inner_size(geometry.width, geometry.height)
            .position(geometry.left, geometry.top)
            .on_navigation(move |target| {
                let _ = tx.send(target.clone());
                true
            })
            .build()
            .map_err(|e| ClientError::Browser(format!("failed to open auth window: {}", e)))?;

        Ok(Popup {
            navigations: rx,
            window: Box::new(TauriPopupWindow { window }),
        })
    }
}

struct TauriPopupWindow<R: Runtime> {
    window: WebviewWindow<R>,
}

impl<R: Runtime> PopupWindow for TauriPopupWindow<R> {
    fn close(&self) -> Result<(), ClientError> {
        self.window
            .close()
            .map_err(|e| ClientError::Browser(format!("failed to close auth window: {}", e)))
    }
}
