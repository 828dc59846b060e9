//! Orchestration of the faked click scope backends.

use crate::helpers::{fixture_config, get, get_with, harness_config, head};
use clickscope_acceptance::config::IsolationMode;
use clickscope_acceptance::dash::Waiter;
use clickscope_acceptance::{FakeBackends, Service};
use std::process::Command;
use std::time::Duration;

fn unset(_: &str) -> Option<String> {
    None
}

#[test]
fn search_details_point_at_the_download_fake() {
    let backends = FakeBackends::start(&harness_config(), unset).unwrap();
    let env = backends.env();
    let search = env.get(Service::Search).unwrap();
    let download = env.get(Service::Download).unwrap();
    assert_ne!(search, download);

    let (status, body) = get(&format!("{search}api/v1/package/com.ubuntu.shorts"));
    assert_eq!(status, 200);
    let details: serde_json::Value = serde_json::from_str(&body).unwrap();
    let download_url = details["download_url"].as_str().unwrap().to_owned();
    assert!(download_url.starts_with(download));

    let (status, _, token) = head(&download_url);
    assert_eq!(status, 200);
    assert_eq!(token.as_deref(), Some("dummy"));
}

#[test]
fn sentinel_value_is_faked_and_real_urls_pass_through() {
    let backends = FakeBackends::start(&harness_config(), |name| match name {
        "U1_SEARCH_BASE_URL" => Some("fake".to_owned()),
        "DOWNLOAD_BASE_URL" => Some("https://downloads.example/".to_owned()),
        _ => None,
    })
    .unwrap();
    assert_eq!(backends.faked(), vec![Service::Search]);
    assert_eq!(
        backends.env().get(Service::Download),
        Some("https://downloads.example/")
    );

    let search = backends.env().get(Service::Search).unwrap();
    let (_, body) = get(&format!("{search}api/v1/package/com.ubuntu.shorts"));
    assert!(body.contains("https://downloads.example/download/shorts-dummy.click"));
}

#[test]
fn recorded_responses_back_reviews_and_pay() {
    let dir = tempfile::tempdir().unwrap();
    let reviews = dir.path().join("ratings-and-reviews");
    let pay = dir.path().join("software-center-agent");
    std::fs::create_dir_all(&reviews).unwrap();
    std::fs::create_dir_all(pay.join("api/2.0/click")).unwrap();
    std::fs::write(reviews.join("index.json"), "[]").unwrap();
    std::fs::write(
        pay.join("api/2.0/click/purchases.json"),
        r#"[{"package_name": "com.ubuntu.shorts", "self": "[FAKE_SERVER_BASE]"}]"#,
    )
    .unwrap();

    let mut config = harness_config();
    config.backends.responses_root = Some(dir.path().to_path_buf());
    let backends = FakeBackends::start(&config, unset).unwrap();
    assert_eq!(backends.faked().len(), 4);

    let reviews_url = backends.env().get(Service::Reviews).unwrap();
    assert_eq!(get(reviews_url), (200, "[]".to_owned()));

    let pay_url = backends.env().get(Service::Pay).unwrap();
    let purchases = format!("{pay_url}api/2.0/click/purchases.json");
    assert_eq!(get(&purchases).0, 401);
    let (status, body) = get_with(&purchases, Some("OAuth dummy"));
    assert_eq!(status, 200);
    assert!(body.contains(&format!(r#""self": "{pay_url}""#)));
}

#[test]
fn env_is_exported_to_the_scope_command() {
    let backends = FakeBackends::start(&harness_config(), unset).unwrap();
    let mut command = Command::new("click-scope");
    backends.env().apply(&mut command);
    let mut names: Vec<String> = command
        .get_envs()
        .map(|(k, _)| k.to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["DOWNLOAD_BASE_URL", "U1_SEARCH_BASE_URL"]);
}

#[test]
fn stop_tears_everything_down() {
    let mut backends = FakeBackends::start(&harness_config(), unset).unwrap();
    let search = backends.fixture(Service::Search).unwrap().base_url().cloned().unwrap();
    backends.stop().unwrap();
    assert!(backends.faked().is_empty());
    assert!(crate::helpers::refuses_connections(&search));
    assert!(backends.unmatched_requests().is_empty());
}

#[test]
fn recorded_package_index_replaces_the_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("click-package-index/api/v1");
    std::fs::create_dir_all(&index).unwrap();
    std::fs::write(index.join("index.json"), r#"{"from": "file"}"#).unwrap();

    let mut config = harness_config();
    config.backends.responses_root = Some(dir.path().to_path_buf());
    let backends = FakeBackends::start(&config, unset).unwrap();
    assert!(backends.faked().contains(&Service::Search));

    let search = backends.env().get(Service::Search).unwrap();
    let api = format!("{search}api/v1");
    assert_eq!(get(&api).0, 401);
    let (status, body) = get_with(&api, Some("OAuth dummy"));
    assert_eq!(status, 200);
    assert_eq!(body, r#"{"from": "file"}"#);
}

#[test]
fn subprocess_backends_report_unmatched_requests() {
    let mut config = harness_config();
    config.fixture = fixture_config(IsolationMode::Subprocess);
    let backends = FakeBackends::start(&config, unset).unwrap();
    let search = backends.env().get(Service::Search).unwrap();
    assert_eq!(get(&format!("{search}api/v2/unknown")).0, 501);

    let waiter = Waiter {
        timeout: Duration::from_secs(2),
        poll: Duration::from_millis(10),
    };
    let unmatched = waiter
        .until("unmatched request from the search child", || {
            let unmatched = backends.unmatched_requests();
            Ok((!unmatched.is_empty()).then_some(unmatched))
        })
        .unwrap();
    assert_eq!(unmatched.len(), 1);
    assert_eq!(unmatched[0].0, Service::Search);
    assert_eq!(unmatched[0].1.path, "/api/v2/unknown");
}
