//! Acceptance-test fixtures for the click scope.
//!
//! The click scope talks to a package index, a download service, a reviews
//! service and a pay service. This crate stands those up as local fakes,
//! points the scope at them through its environment, and drives the dash
//! through a black-box UI layer.
//!
//! # Architecture
//!
//! - **Fixtures** ([`fixture`]): one ephemeral HTTP fake per fixture, on a
//!   dedicated thread or in a child `clickscope-fake-server` process, with
//!   teardown guaranteed by `Drop`
//! - **Backends** ([`backends`]): starts the faked services in dependency
//!   order and collects the resulting [`ServiceEnv`]
//! - **Dash** ([`dash`]): proxies over an [`dash::Introspection`] backend
//! - **Scenarios** ([`scenarios`]): search, preview and install journeys
//!
//! Route tables, canned responses and the HTTP front-end live in the
//! `clickscope-fakes` workspace crate.

pub mod backends;
pub mod config;
pub mod dash;
pub mod env;
pub mod error;
pub mod fixture;
pub mod scenarios;

pub use backends::FakeBackends;
pub use config::{HarnessConfig, IsolationMode};
pub use env::{Service, ServiceEnv};
pub use error::{HarnessError, Result};
pub use fixture::{FakeServerFixture, FixtureState};
pub use scenarios::ClickScopeSession;
