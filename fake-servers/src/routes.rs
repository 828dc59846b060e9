//! Route tables: ordered (method, path-prefix) -> response rule mappings.
//!
//! A table is built once and then shared read-only by every request the
//! fake serves. Lookup walks the routes in registration order and the first
//! match wins, so more specific prefixes must be registered first
//! (`/api/v1/search` before `/api/v1`).

use crate::error::{FakeError, Result};
use crate::placeholder::{Placeholder, Placeholders};
use crate::response::ResponseRule;
use axum::http::Method;
use serde::{Deserialize, Serialize};

/// Which request methods a route accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodFilter {
    /// `GET` only.
    Get,
    /// `HEAD` only.
    Head,
    /// `GET` and `HEAD`; `HEAD` gets the same headers with an empty body.
    GetOrHead,
    /// Any method.
    Any,
}

impl MethodFilter {
    /// Whether `method` is admitted by this filter.
    pub fn admits(self, method: &Method) -> bool {
        match self {
            Self::Get => *method == Method::GET,
            Self::Head => *method == Method::HEAD,
            Self::GetOrHead => *method == Method::GET || *method == Method::HEAD,
            Self::Any => true,
        }
    }
}

/// One entry of a [`RouteTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Accepted methods.
    pub methods: MethodFilter,
    /// Path prefix matched against the request path (query excluded).
    pub prefix: String,
    /// Reject requests without an `Authorization` header with 401.
    #[serde(default)]
    pub requires_auth: bool,
    /// How the response is produced.
    pub rule: ResponseRule,
}

impl Route {
    /// Route accepting `methods` on paths starting with `prefix`.
    pub fn new(methods: MethodFilter, prefix: impl Into<String>, rule: ResponseRule) -> Self {
        Self {
            methods,
            prefix: prefix.into(),
            requires_auth: false,
            rule,
        }
    }

    /// Shorthand for a `GET` route.
    pub fn get(prefix: impl Into<String>, rule: ResponseRule) -> Self {
        Self::new(MethodFilter::Get, prefix, rule)
    }

    /// Shorthand for a `HEAD` route.
    pub fn head(prefix: impl Into<String>, rule: ResponseRule) -> Self {
        Self::new(MethodFilter::Head, prefix, rule)
    }

    /// Require an `Authorization` header on this route.
    pub fn authenticated(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// Whether this route handles `method` on `path`.
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.methods.admits(method) && path.starts_with(&self.prefix)
    }

    /// The part of `path` after this route's prefix.
    pub fn remainder<'a>(&self, path: &'a str) -> &'a str {
        path.strip_prefix(self.prefix.as_str()).unwrap_or_default()
    }
}

/// Immutable, ordered set of routes plus the placeholder bindings used when
/// rendering their responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteTable {
    routes: Vec<Route>,
    #[serde(default)]
    placeholders: Placeholders,
}

impl RouteTable {
    /// Empty table. Every request against it is unmatched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. Earlier routes take precedence.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Bind a placeholder token for every response of this table.
    pub fn placeholder(mut self, token: impl Into<String>, value: Placeholder) -> Self {
        self.placeholders = self.placeholders.bind(token, value);
        self
    }

    /// Require an `Authorization` header on every route registered so far.
    pub fn require_auth(mut self) -> Self {
        for route in &mut self.routes {
            route.requires_auth = true;
        }
        self
    }

    /// Registered routes in lookup order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Placeholder bindings.
    pub fn placeholders(&self) -> &Placeholders {
        &self.placeholders
    }

    /// First route that handles `method` on `path`, if any.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(method, path))
    }

    /// Reject tables that can never serve anything sensible.
    ///
    /// # Errors
    ///
    /// Returns [`FakeError::Config`] when the table is empty or a prefix
    /// does not start with `/`.
    pub fn validate(&self) -> Result<()> {
        if self.routes.is_empty() {
            return Err(FakeError::Config("route table has no routes".into()));
        }
        if let Some(route) = self.routes.iter().find(|r| !r.prefix.starts_with('/')) {
            return Err(FakeError::Config(format!(
                "route prefix `{}` must start with `/`",
                route.prefix
            )));
        }
        Ok(())
    }

    /// Encode for handing to a child process.
    ///
    /// # Errors
    ///
    /// Returns [`FakeError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a table produced by [`RouteTable::to_json`].
    ///
    /// # Errors
    ///
    /// Returns [`FakeError::Serialization`] on malformed input.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
