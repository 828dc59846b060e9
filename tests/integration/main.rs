//! Integration test binary -- all integration tests consolidated into a single
//! binary, one module per area.
//!
//! See the matklad pattern: <https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html>

// Allow unwrap/expect in test code
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod helpers;

mod click_scope_journeys;
mod fake_backends;
mod fixture_lifecycle;
mod subprocess_fixture;
