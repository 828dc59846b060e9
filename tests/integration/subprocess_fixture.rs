//! Fake servers running in a child `clickscope-fake-server` process.

use crate::helpers::{
    fixture_config, get, get_with, head, hold_half_sent_request, refuses_connections,
};
use clickscope_acceptance::config::IsolationMode;
use clickscope_acceptance::{FakeServerFixture, FixtureState, HarnessError};
use clickscope_fakes::catalog::{self, CannedPackage};
use std::path::PathBuf;
use std::time::{Duration, Instant};

fn subprocess() -> clickscope_acceptance::config::FixtureConfig {
    fixture_config(IsolationMode::Subprocess)
}

#[test]
fn child_serves_the_route_table() {
    let table = catalog::search_server()
        .package(CannedPackage::shorts())
        .download_base_url("http://127.0.0.1:9/")
        .build();
    let mut fixture = FakeServerFixture::running("child-search", table, subprocess()).unwrap();
    assert_eq!(fixture.isolation(), IsolationMode::Subprocess);

    let (status, body) = get(fixture.url("/api/v1/package/com.ubuntu.shorts").unwrap().as_str());
    assert_eq!(status, 200);
    let details: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(details["download_url"], "http://127.0.0.1:9/download/shorts-dummy.click");

    let url = fixture.base_url().cloned().unwrap();
    fixture.stop().unwrap();
    assert_eq!(fixture.state(), FixtureState::Stopped);
    assert!(refuses_connections(&url));
}

#[test]
fn child_download_head() {
    let fixture =
        FakeServerFixture::running("child-download", catalog::download_server(), subprocess())
            .unwrap();
    let url = fixture.url("/download/delta-dummy.click").unwrap();
    let (status, length, token) = head(url.as_str());
    assert_eq!(status, 200);
    assert!(length.is_some());
    assert_eq!(token.as_deref(), Some("dummy"));
}

#[test]
fn child_enforces_auth() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.json"), r#"{"ok": true}"#).unwrap();
    let fixture = FakeServerFixture::running(
        "child-pay",
        catalog::json_tree_server(dir.path(), true),
        subprocess(),
    )
    .unwrap();
    let base = fixture.base_url().unwrap().to_string();

    assert_eq!(get(&base).0, 401);
    let (status, body) = get_with(&base, Some("OAuth dummy"));
    assert_eq!(status, 200);
    assert_eq!(body, r#"{"ok": true}"#);
}

#[test]
fn dropping_reaps_the_child() {
    let url = {
        let fixture =
            FakeServerFixture::running("child-drop", catalog::download_server(), subprocess())
                .unwrap();
        fixture.base_url().cloned().unwrap()
    };
    assert!(refuses_connections(&url));
}

#[test]
fn missing_binary_is_a_startup_error() {
    let mut config = subprocess();
    config.server_binary = Some(PathBuf::from("/nonexistent/clickscope-fake-server"));
    let mut fixture = FakeServerFixture::new("child-missing", catalog::download_server(), config);
    assert!(matches!(fixture.start(), Err(HarnessError::Startup(_))));
    assert_eq!(fixture.state(), FixtureState::Created);
}

#[test]
fn child_requests_reach_the_parent_log() {
    let mut fixture =
        FakeServerFixture::running("child-log", catalog::download_server(), subprocess())
            .unwrap();
    assert_eq!(get(fixture.url("/nope").unwrap().as_str()).0, 501);
    let url = fixture.url("/download/shorts-dummy.click").unwrap();
    assert_eq!(head(url.as_str()).0, 200);
    fixture.stop().unwrap();

    let requests = fixture.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].method, "HEAD");
    assert!(requests[1].matched);
    let unmatched = fixture.unmatched_requests();
    assert_eq!(unmatched.len(), 1);
    assert_eq!(unmatched[0].path, "/nope");
    assert_eq!(unmatched[0].status, 501);
}

#[test]
fn stop_kills_a_child_stuck_on_a_stalled_connection() {
    let mut config = subprocess();
    config.stop_timeout_ms = 300;
    let mut fixture =
        FakeServerFixture::running("child-stalled", catalog::download_server(), config).unwrap();
    let url = fixture.base_url().cloned().unwrap();
    let _stalled = hold_half_sent_request(&url);
    let (status, _) = get(fixture.url("/download/other.click").unwrap().as_str());
    assert_eq!(status, 200);

    let started = Instant::now();
    let result = fixture.stop();
    let elapsed = started.elapsed();
    assert!(matches!(result, Err(HarnessError::Shutdown(_))), "{result:?}");
    assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
    assert_eq!(fixture.state(), FixtureState::Stopped);
    assert!(refuses_connections(&url));
}
