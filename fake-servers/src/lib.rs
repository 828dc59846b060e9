//! # clickscope-fakes
//!
//! Canned-response HTTP fakes standing in for the click scope's network
//! backends during acceptance tests.
//!
//! ## Design
//!
//! - A [`RouteTable`] maps (method, path-prefix) to a [`ResponseRule`];
//!   lookup is in registration order and the first match wins
//! - Tables are immutable once built and shared read-only while serving
//! - Undeclared routes get an explicit `501` and are recorded in the
//!   [`RequestLog`], never a silent empty response
//! - Placeholder tokens let fixtures reference the ephemeral base URL of the
//!   server that serves them
//! - Tables serialize to JSON so a fake can run in a separate process
//!
//! The lifecycle around a fake (threads, child processes, teardown) lives
//! in the `clickscope-acceptance` crate; this crate only binds and serves.

pub mod catalog;
pub mod error;
pub mod log;
pub mod placeholder;
pub mod response;
pub mod routes;
pub mod server;

pub use error::{FakeError, Result};
pub use log::{RecordedRequest, RequestLog};
pub use placeholder::{Placeholder, Placeholders};
pub use response::{CannedResponse, ResponseRule};
pub use routes::{MethodFilter, Route, RouteTable};
pub use server::FakeServer;
