//! Start/stop guarantees of in-process fake server fixtures.

use crate::helpers::{fixture_config, get, head, hold_half_sent_request, refuses_connections};
use clickscope_acceptance::config::IsolationMode;
use clickscope_acceptance::{FakeServerFixture, FixtureState, HarnessError};
use clickscope_fakes::catalog::{self, CannedPackage};
use clickscope_fakes::response::dummy_click_payload;
use clickscope_fakes::{ResponseRule, Route, RouteTable};
use std::time::{Duration, Instant};

fn in_process() -> clickscope_acceptance::config::FixtureConfig {
    fixture_config(IsolationMode::InProcess)
}

#[test]
fn request_right_after_start_is_served() {
    let table = RouteTable::new().route(Route::get("/", ResponseRule::text("ready")));
    let mut fixture = FakeServerFixture::new("immediate", table, in_process());
    let url = fixture.start().unwrap();

    let (status, body) = get(url.as_str());
    assert_eq!(status, 200);
    assert_eq!(body, "ready");
    fixture.stop().unwrap();
}

#[test]
fn stop_frees_the_listener() {
    let mut fixture =
        FakeServerFixture::running("freed", catalog::download_server(), in_process()).unwrap();
    let url = fixture.base_url().cloned().unwrap();
    assert!(!refuses_connections(&url));

    fixture.stop().unwrap();
    assert_eq!(fixture.state(), FixtureState::Stopped);
    assert!(refuses_connections(&url));

    let mut fresh =
        FakeServerFixture::running("fresh", catalog::download_server(), in_process()).unwrap();
    assert_eq!(fresh.state(), FixtureState::Listening);
    fresh.stop().unwrap();
}

#[test]
fn stop_is_idempotent() {
    let mut fixture =
        FakeServerFixture::running("twice", catalog::download_server(), in_process()).unwrap();
    fixture.stop().unwrap();
    fixture.stop().unwrap();
    assert_eq!(fixture.state(), FixtureState::Stopped);

    let mut never = FakeServerFixture::new("never", catalog::download_server(), in_process());
    never.stop().unwrap();
    assert!(never.base_url().is_none());
}

#[test]
fn drop_stops_the_server() {
    let url = {
        let fixture =
            FakeServerFixture::running("dropped", catalog::download_server(), in_process())
                .unwrap();
        fixture.base_url().cloned().unwrap()
    };
    assert!(refuses_connections(&url));
}

#[test]
fn restart_after_stop_is_rejected() {
    let mut fixture =
        FakeServerFixture::running("once", catalog::download_server(), in_process()).unwrap();
    fixture.stop().unwrap();
    assert!(matches!(fixture.start(), Err(HarnessError::Fixture(_))));
}

#[test]
fn fixtures_get_distinct_ports() {
    let a = FakeServerFixture::running("a", catalog::download_server(), in_process()).unwrap();
    let b = FakeServerFixture::running("b", catalog::download_server(), in_process()).unwrap();
    assert_ne!(
        a.base_url().unwrap().port(),
        b.base_url().unwrap().port()
    );
}

#[test]
fn search_fake_with_one_result() {
    let table = catalog::search_server()
        .package(CannedPackage::shorts())
        .build();
    let fixture = FakeServerFixture::running("search", table, in_process()).unwrap();

    let (status, body) = get(fixture.url("/api/v1/search?q=Shorts").unwrap().as_str());
    assert_eq!(status, 200);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    let packages = json["_embedded"]["clickindex:package"].as_array().unwrap();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0]["title"], "Shorts");
}

#[test]
fn download_head_reports_payload_size() {
    let fixture =
        FakeServerFixture::running("download", catalog::download_server(), in_process()).unwrap();

    let url = fixture.url("/download/shorts-dummy.click").unwrap();
    let (status, length, token) = head(url.as_str());
    assert_eq!(status, 200);
    assert_eq!(
        length.as_deref(),
        Some(dummy_click_payload("shorts-dummy.click").len().to_string().as_str())
    );
    assert_eq!(token.as_deref(), Some("dummy"));
}

#[test]
fn unmapped_paths_are_recorded_and_serving_continues() {
    let fixture =
        FakeServerFixture::running("strict", catalog::download_server(), in_process()).unwrap();

    let (status, body) = get(fixture.url("/api/v1/search").unwrap().as_str());
    assert_eq!(status, 501);
    assert!(body.contains("/api/v1/search"));

    let (status, _, _) = head(fixture.url("/download/x.click").unwrap().as_str());
    assert_eq!(status, 200);

    let unmatched = fixture.unmatched_requests();
    assert_eq!(unmatched.len(), 1);
    assert_eq!(unmatched[0].method, "GET");
    assert_eq!(fixture.requests().len(), 2);
}

#[test]
fn file_tree_auth_and_base_substitution() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("api/v1")).unwrap();
    std::fs::write(
        dir.path().join("api/v1/index.json"),
        r#"{"self": "[FAKE_SERVER_BASE]api/v1"}"#,
    )
    .unwrap();

    let fixture = FakeServerFixture::running(
        "tree",
        catalog::json_tree_server(dir.path(), true),
        in_process(),
    )
    .unwrap();
    let base = fixture.base_url().unwrap().to_string();
    let index = fixture.url("/api/v1").unwrap();

    let (status, _) = get(index.as_str());
    assert_eq!(status, 401);

    let (status, body) = crate::helpers::get_with(index.as_str(), Some("OAuth dummy"));
    assert_eq!(status, 200);
    assert_eq!(body, format!(r#"{{"self": "{base}api/v1"}}"#));
}

#[test]
fn stop_forces_out_a_stalled_connection() {
    let mut config = in_process();
    config.stop_timeout_ms = 300;
    let mut fixture =
        FakeServerFixture::running("stalled", catalog::download_server(), config).unwrap();
    let url = fixture.base_url().cloned().unwrap();
    let _stalled = hold_half_sent_request(&url);
    let (status, _) = get(fixture.url("/download/other.click").unwrap().as_str());
    assert_eq!(status, 200);

    let started = Instant::now();
    let result = fixture.stop();
    let elapsed = started.elapsed();
    assert!(matches!(result, Err(HarnessError::Shutdown(_))), "{result:?}");
    assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
    assert_eq!(fixture.state(), FixtureState::Stopped);
    assert!(refuses_connections(&url));
}
