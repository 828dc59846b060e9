//! Proxies for the dash, the click scope and its previews.

use super::{
    ElementId, Introspection, Selector, Waiter, required_property, select_single, wait_for,
    wait_select_single, wait_until_gone,
};
use crate::error::{HarnessError, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Scope view type in the dash.
pub const SCOPE_VIEW: &str = "GenericScopeView";
/// Button switching the dash to a scope.
pub const SCOPE_BUTTON: &str = "ScopeButton";
/// Property carrying a scope's id on both of the above.
pub const SCOPE_ID: &str = "scopeId";
/// Search field toggle in the dash header.
pub const SEARCH_INDICATOR: &str = "SearchIndicator";
/// Result tile in a scope.
pub const TILE: &str = "Tile";
/// Application preview.
pub const APP_PREVIEW: &str = "AppPreview";
/// Generic preview (used for error messages).
pub const DASH_PREVIEW: &str = "DashPreview";
/// First action button of a preview.
pub const INSTALL_BUTTON: &str = "button0";
/// Label on the install action.
pub const INSTALL_LABEL: &str = "Install";

const TRUE: &str = "true";
const FALSE: &str = "false";

/// The dash: entry point for scopes, search and previews.
#[derive(Clone)]
pub struct Dash {
    ui: Arc<dyn Introspection>,
    waiter: Waiter,
}

impl Dash {
    /// Dash over `ui`, waiting with `waiter` for every "eventually" step.
    pub fn new(ui: Arc<dyn Introspection>, waiter: Waiter) -> Self {
        Self { ui, waiter }
    }

    /// Proxy for the scope with id `scope_id`, without switching to it.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Timeout`] if the scope never shows up.
    pub fn scope(&self, scope_id: &str) -> Result<Scope> {
        let element = wait_select_single(
            self.ui.as_ref(),
            &Selector::of(SCOPE_VIEW).with(SCOPE_ID, scope_id),
            &self.waiter,
        )?;
        Ok(Scope {
            ui: Arc::clone(&self.ui),
            waiter: self.waiter,
            id: scope_id.to_owned(),
            element,
        })
    }

    /// Switch to `scope_id` and wait until it is current.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Ui`] if the scope has no button and
    /// [`HarnessError::Timeout`] if it never becomes current.
    pub fn open_scope(&self, scope_id: &str) -> Result<Scope> {
        let scope = self.scope(scope_id)?;
        if scope.is_current()? {
            return Ok(scope);
        }
        info!(scope = scope_id, "opening scope");
        let button = select_single(
            self.ui.as_ref(),
            &Selector::of(SCOPE_BUTTON).with(SCOPE_ID, scope_id),
        )?;
        self.ui.tap(button)?;
        scope.wait_current(true)?;
        Ok(scope)
    }

    /// Tap the search indicator and type `query`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Ui`] if the search indicator is missing.
    pub fn search(&self, query: &str) -> Result<()> {
        debug!(query, "searching");
        let indicator = select_single(self.ui.as_ref(), &Selector::of(SEARCH_INDICATOR))?;
        self.ui.tap(indicator)?;
        self.ui.type_text(query)
    }

    /// Wait for an application preview that finished loading.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Timeout`] if none opens or it keeps
    /// processing.
    pub fn wait_app_preview(&self) -> Result<AppPreview> {
        let element =
            wait_select_single(self.ui.as_ref(), &Selector::of(APP_PREVIEW), &self.waiter)?;
        wait_for(
            self.ui.as_ref(),
            element,
            "showProcessingAction",
            FALSE,
            &self.waiter,
        )?;
        Ok(AppPreview {
            preview: PreviewElement {
                ui: Arc::clone(&self.ui),
                waiter: self.waiter,
                element,
            },
        })
    }

    /// Wait for a generic dash preview (error or information message).
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Timeout`] if none opens.
    pub fn wait_dash_preview(&self) -> Result<DashPreview> {
        let element =
            wait_select_single(self.ui.as_ref(), &Selector::of(DASH_PREVIEW), &self.waiter)?;
        Ok(DashPreview {
            preview: PreviewElement {
                ui: Arc::clone(&self.ui),
                waiter: self.waiter,
                element,
            },
        })
    }
}

/// One scope view in the dash.
#[derive(Clone)]
pub struct Scope {
    ui: Arc<dyn Introspection>,
    waiter: Waiter,
    id: String,
    element: ElementId,
}

impl Scope {
    /// Scope id, e.g. `applications`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this scope is the one on screen.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Ui`] if the view lost its `isCurrent` property.
    pub fn is_current(&self) -> Result<bool> {
        Ok(required_property(self.ui.as_ref(), self.element, "isCurrent")? == TRUE)
    }

    /// Wait until `isCurrent` equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Timeout`] otherwise.
    pub fn wait_current(&self, expected: bool) -> Result<()> {
        let value = if expected { TRUE } else { FALSE };
        wait_for(self.ui.as_ref(), self.element, "isCurrent", value, &self.waiter)
    }

    /// Wait for a result tile titled `text`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Timeout`] if it never appears.
    pub fn wait_tile(&self, text: &str) -> Result<Tile> {
        let element = wait_select_single(
            self.ui.as_ref(),
            &Selector::of(TILE).with("text", text).within(self.element),
            &self.waiter,
        )?;
        Ok(Tile {
            ui: Arc::clone(&self.ui),
            element,
        })
    }
}

/// A result tile.
pub struct Tile {
    ui: Arc<dyn Introspection>,
    element: ElementId,
}

impl Tile {
    /// Underlying UI element.
    pub fn element(&self) -> ElementId {
        self.element
    }

    /// Open the tile's preview.
    ///
    /// # Errors
    ///
    /// Propagates backend tap failures.
    pub fn tap(&self) -> Result<()> {
        self.ui.tap(self.element)
    }
}

/// Title and subtitle labels of any preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewDetails {
    /// `titleLabel` text.
    pub title: String,
    /// `subtitleLabel` text.
    pub subtitle: String,
}

/// Application preview details; the subtitle carries the publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDetails {
    /// Application title.
    pub title: String,
    /// Publisher shown under the title.
    pub publisher: String,
}

struct PreviewElement {
    ui: Arc<dyn Introspection>,
    waiter: Waiter,
    element: ElementId,
}

impl PreviewElement {
    fn label(&self, object_name: &str) -> Result<String> {
        let label = select_single(
            self.ui.as_ref(),
            &Selector::of("Label")
                .with("objectName", object_name)
                .within(self.element),
        )?;
        required_property(self.ui.as_ref(), label, "text")
    }

    fn details(&self) -> Result<PreviewDetails> {
        Ok(PreviewDetails {
            title: self.label("titleLabel")?,
            subtitle: self.label("subtitleLabel")?,
        })
    }
}

/// Preview of one application.
pub struct AppPreview {
    preview: PreviewElement,
}

impl AppPreview {
    /// Underlying UI element.
    pub fn element(&self) -> ElementId {
        self.preview.element
    }

    /// Title and publisher.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Ui`] if a label is missing.
    pub fn details(&self) -> Result<AppDetails> {
        let PreviewDetails { title, subtitle } = self.preview.details()?;
        Ok(AppDetails {
            title,
            publisher: subtitle,
        })
    }

    /// Press the install action and wait for the preview to close.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Ui`] if the first action is not `Install`,
    /// or [`HarnessError::Timeout`] if the preview stays open.
    pub fn install(&self) -> Result<()> {
        let ui = self.preview.ui.as_ref();
        let button = select_single(
            ui,
            &Selector::of("Button")
                .with("objectName", INSTALL_BUTTON)
                .within(self.preview.element),
        )?;
        let text = required_property(ui, button, "text")?;
        if text != INSTALL_LABEL {
            return Err(HarnessError::Ui(format!(
                "install button not found (first action is {text:?})"
            )));
        }
        info!("installing from preview");
        ui.tap(button)?;
        wait_until_gone(
            ui,
            self.preview.element,
            &Selector::of(APP_PREVIEW),
            &self.preview.waiter,
        )
    }
}

/// Generic preview, as used for login errors.
pub struct DashPreview {
    preview: PreviewElement,
}

impl DashPreview {
    /// Underlying UI element.
    pub fn element(&self) -> ElementId {
        self.preview.element
    }

    /// Title and subtitle.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Ui`] if a label is missing.
    pub fn details(&self) -> Result<PreviewDetails> {
        self.preview.details()
    }
}
