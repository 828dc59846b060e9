//! Click scope user journeys built from the dash proxies.

use crate::backends::FakeBackends;
use crate::config::HarnessConfig;
use crate::dash::{AppDetails, AppPreview, Dash, Introspection, PreviewDetails, Scope, Waiter};
use crate::error::{HarnessError, Result};
use std::sync::Arc;
use tracing::info;

/// Scope id of the click scope in the dash.
pub const CLICK_SCOPE_ID: &str = "applications";

/// Preview title shown when installing without Ubuntu One credentials.
pub const LOGIN_ERROR_TITLE: &str = "Login Error";

/// A dash with the click scope open, optionally backed by fakes.
pub struct ClickScopeSession {
    dash: Dash,
    scope: Scope,
    backends: Option<FakeBackends>,
}

impl ClickScopeSession {
    /// Open the click scope on `ui`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Timeout`] if the scope never becomes current.
    pub fn open(ui: Arc<dyn Introspection>, config: &HarnessConfig) -> Result<Self> {
        let dash = Dash::new(ui, Waiter::from(&config.ui));
        let scope = dash.open_scope(CLICK_SCOPE_ID)?;
        Ok(Self {
            dash,
            scope,
            backends: None,
        })
    }

    /// Keep `backends` alive for as long as the session.
    pub fn with_backends(mut self, backends: FakeBackends) -> Self {
        self.backends = Some(backends);
        self
    }

    /// The dash this session drives.
    pub fn dash(&self) -> &Dash {
        &self.dash
    }

    /// The click scope, already current.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Fake backends owned by the session, if any were attached.
    pub fn backends(&self) -> Option<&FakeBackends> {
        self.backends.as_ref()
    }

    /// Search for `name` and wait for its tile.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Timeout`] if no tile titled `name` appears.
    pub fn search_app(&self, name: &str) -> Result<()> {
        self.dash.search(name)?;
        self.scope.wait_tile(name).map(|_| ())
    }

    /// Search for `name`, tap its tile and wait for the loaded preview.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Timeout`] if the tile or preview never
    /// appears.
    pub fn open_app_preview(&self, name: &str) -> Result<AppPreview> {
        info!(app = name, "opening app preview");
        self.dash.search(name)?;
        self.scope.wait_tile(name)?.tap()?;
        self.dash.wait_app_preview()
    }

    /// Details shown in `name`'s preview.
    ///
    /// # Errors
    ///
    /// Same as [`open_app_preview`](Self::open_app_preview).
    pub fn app_details(&self, name: &str) -> Result<AppDetails> {
        self.open_app_preview(name)?.details()
    }

    /// Install `name` with no credentials and return the error preview.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Ui`] if the resulting preview is not the
    /// login error.
    pub fn install_without_credentials(&self, name: &str) -> Result<PreviewDetails> {
        let preview = self.open_app_preview(name)?;
        preview.install()?;
        let details = self.dash.wait_dash_preview()?.details()?;
        if details.title != LOGIN_ERROR_TITLE {
            return Err(HarnessError::Ui(format!(
                "expected {LOGIN_ERROR_TITLE:?} preview, got {:?}",
                details.title
            )));
        }
        Ok(details)
    }
}
