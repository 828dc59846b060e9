//! Black-box UI automation for the dash and the click scope.
//!
//! The shell is reached through an [`Introspection`] backend that can find
//! elements by type and properties, read properties, tap and type. Proxies
//! in [`proxies`] wrap the elements the click scope tests care about; the
//! helpers here add exact-one selection and "eventually" polling on top.

pub mod memory;
pub mod proxies;

pub use memory::InMemoryShell;
pub use proxies::{AppDetails, AppPreview, Dash, DashPreview, PreviewDetails, Scope, Tile};

use crate::config::UiConfig;
use crate::error::{HarnessError, Result};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Opaque handle to a live UI element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Element query: a type name plus exact property values, optionally
/// restricted to the descendants of one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// Element type, e.g. `GenericScopeView`.
    pub type_name: String,
    /// Properties that must match exactly.
    pub properties: Vec<(String, String)>,
    /// Ancestor the match must live under.
    pub within: Option<ElementId>,
}

impl Selector {
    /// Every element of `type_name`.
    pub fn of(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: Vec::new(),
            within: None,
        }
    }

    /// Also require `name == value`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }

    /// Only look below `parent`.
    pub fn within(mut self, parent: ElementId) -> Self {
        self.within = Some(parent);
        self
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name)?;
        for (name, value) in &self.properties {
            write!(f, "[{name}={value:?}]")?;
        }
        if let Some(parent) = self.within {
            write!(f, " within {parent}")?;
        }
        Ok(())
    }
}

/// What the harness needs from a UI introspection backend.
pub trait Introspection: Send + Sync {
    /// Elements matching `selector`, in a stable order.
    fn find(&self, selector: &Selector) -> Result<Vec<ElementId>>;

    /// Current value of a property, `None` if the element has no such
    /// property.
    fn property(&self, element: ElementId, name: &str) -> Result<Option<String>>;

    /// Tap (click) an element.
    fn tap(&self, element: ElementId) -> Result<()>;

    /// Type into whatever has keyboard focus.
    fn type_text(&self, text: &str) -> Result<()>;
}

/// Exactly one element matching `selector`.
///
/// # Errors
///
/// Returns [`HarnessError::Ui`] if there are zero or several matches.
pub fn select_single(ui: &dyn Introspection, selector: &Selector) -> Result<ElementId> {
    let found = ui.find(selector)?;
    match found.as_slice() {
        [one] => Ok(*one),
        [] => Err(HarnessError::Ui(format!("no element matches {selector}"))),
        many => Err(HarnessError::Ui(format!(
            "{} elements match {selector}, expected one",
            many.len()
        ))),
    }
}

/// Read a property that must exist.
///
/// # Errors
///
/// Returns [`HarnessError::Ui`] if the element lacks the property.
pub fn required_property(ui: &dyn Introspection, element: ElementId, name: &str) -> Result<String> {
    ui.property(element, name)?
        .ok_or_else(|| HarnessError::Ui(format!("element {element} has no property `{name}`")))
}

/// Timeout and poll interval for "eventually" assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waiter {
    /// Give up after this long.
    pub timeout: Duration,
    /// Pause between attempts.
    pub poll: Duration,
}

impl From<&UiConfig> for Waiter {
    fn from(config: &UiConfig) -> Self {
        Self {
            timeout: config.wait_timeout(),
            poll: config.poll_interval(),
        }
    }
}

impl Default for Waiter {
    fn default() -> Self {
        Self::from(&UiConfig::default())
    }
}

impl Waiter {
    /// Poll `probe` until it yields a value or the timeout expires.
    ///
    /// Errors from `probe` end the wait immediately.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Timeout`] naming `what` when time runs out.
    pub fn until<T, F>(&self, what: &str, mut probe: F) -> Result<T>
    where
        F: FnMut() -> Result<Option<T>>,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(value) = probe()? {
                return Ok(value);
            }
            if Instant::now() >= deadline {
                return Err(HarnessError::Timeout(format!(
                    "{what} (after {:?})",
                    self.timeout
                )));
            }
            std::thread::sleep(self.poll);
        }
    }
}

/// Wait until exactly one element matches `selector`.
///
/// Transient states with several matches keep the wait going.
///
/// # Errors
///
/// Returns [`HarnessError::Timeout`] if no single match appears in time.
pub fn wait_select_single(
    ui: &dyn Introspection,
    selector: &Selector,
    waiter: &Waiter,
) -> Result<ElementId> {
    debug!(%selector, "waiting for element");
    waiter.until(&format!("waiting for {selector}"), || {
        let found = ui.find(selector)?;
        Ok(match found.as_slice() {
            [one] => Some(*one),
            _ => None,
        })
    })
}

/// Wait until `element.name == expected`.
///
/// # Errors
///
/// Returns [`HarnessError::Timeout`] with the last observed value.
pub fn wait_for(
    ui: &dyn Introspection,
    element: ElementId,
    name: &str,
    expected: &str,
    waiter: &Waiter,
) -> Result<()> {
    let mut last = None;
    let result = waiter.until("property wait", || {
        let current = ui.property(element, name)?;
        let done = current.as_deref() == Some(expected);
        last = current;
        Ok(done.then_some(()))
    });
    result.map_err(|e| match e {
        HarnessError::Timeout(_) => HarnessError::Timeout(format!(
            "{element}.{name} never became {expected:?} (last {last:?})"
        )),
        other => other,
    })
}

/// Wait until `element` no longer matches `selector` (it was destroyed or
/// replaced).
///
/// # Errors
///
/// Returns [`HarnessError::Timeout`] if it is still present.
pub fn wait_until_gone(
    ui: &dyn Introspection,
    element: ElementId,
    selector: &Selector,
    waiter: &Waiter,
) -> Result<()> {
    waiter.until(&format!("waiting for {element} to close"), || {
        Ok((!ui.find(selector)?.contains(&element)).then_some(()))
    })
}
