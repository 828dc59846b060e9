//! Environment contract between the fakes and the system under test.
//!
//! The click scope reads its backend base URLs from four variables. A
//! backend is faked when its variable is unset or holds the `fake`
//! sentinel; any other value points at a real service and is passed
//! through untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::process::Command;

/// Value that asks for a backend to be faked.
pub const FAKE_SENTINEL: &str = "fake";

/// Network backends the click scope talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Service {
    /// Click package index (search, details, departments).
    Search,
    /// Package downloads.
    Download,
    /// Ratings and reviews.
    Reviews,
    /// Software center purchase agent.
    Pay,
}

impl Service {
    /// Every backend, in start-up order.
    pub const ALL: [Self; 4] = [Self::Download, Self::Search, Self::Reviews, Self::Pay];

    /// Environment variable carrying this backend's base URL.
    pub fn env_var(self) -> &'static str {
        match self {
            Self::Search => "U1_SEARCH_BASE_URL",
            Self::Download => "DOWNLOAD_BASE_URL",
            Self::Reviews => "U1_REVIEWS_BASE_URL",
            Self::Pay => "PAY_BASE_URL",
        }
    }

    /// Subdirectory of the recorded responses root backing a file-tree fake.
    pub fn responses_dir(self) -> Option<&'static str> {
        match self {
            Self::Search => Some("click-package-index"),
            Self::Reviews => Some("ratings-and-reviews"),
            Self::Pay => Some("software-center-agent"),
            Self::Download => None,
        }
    }

    /// Whether a file-tree fake for this backend rejects requests without
    /// an `Authorization` header.
    pub fn needs_auth(self) -> bool {
        matches!(self, Self::Search | Self::Pay)
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Search => "search",
            Self::Download => "download",
            Self::Reviews => "reviews",
            Self::Pay => "pay",
        };
        f.write_str(label)
    }
}

/// `true` if a variable holding `value` asks for a fake.
pub fn wants_fake(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.trim().is_empty() || v.trim() == FAKE_SENTINEL,
    }
}

/// Where a backend's traffic goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Start a fake and point the variable at it.
    Fake,
    /// Leave the real service URL in place.
    Real(String),
}

impl Endpoint {
    /// Classify a raw variable value.
    pub fn from_value(value: Option<String>) -> Self {
        if wants_fake(value.as_deref()) {
            Self::Fake
        } else {
            Self::Real(value.unwrap_or_default())
        }
    }
}

/// Resolved base URLs for every backend, ready to hand to a child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceEnv {
    vars: BTreeMap<Service, String>,
}

impl ServiceEnv {
    /// No backend resolved yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `service` at `url`.
    pub fn set(&mut self, service: Service, url: impl Into<String>) {
        self.vars.insert(service, url.into());
    }

    /// Base URL for `service`, if one was resolved.
    pub fn get(&self, service: Service) -> Option<&str> {
        self.vars.get(&service).map(String::as_str)
    }

    /// Backends with no URL, in start-up order. The scope falls back to its
    /// built-in production URLs for these.
    pub fn unresolved(&self) -> Vec<Service> {
        Service::ALL
            .into_iter()
            .filter(|s| !self.vars.contains_key(s))
            .collect()
    }

    /// `(variable, value)` pairs in a stable order.
    pub fn vars(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.vars.iter().map(|(s, url)| (s.env_var(), url.as_str()))
    }

    /// Export every resolved variable into `command`'s environment.
    ///
    /// The harness never mutates its own process environment; the scope is
    /// launched with these variables instead.
    pub fn apply<'a>(&self, command: &'a mut Command) -> &'a mut Command {
        command.envs(self.vars())
    }
}
