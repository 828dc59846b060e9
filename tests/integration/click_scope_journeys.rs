//! Dash journeys against a scripted shell whose click scope reads from the
//! fake backends.

use crate::helpers::{click_scope_dash, harness_config};
use clickscope_acceptance::dash::{AppDetails, Dash, Waiter};
use clickscope_acceptance::scenarios::{CLICK_SCOPE_ID, LOGIN_ERROR_TITLE};
use clickscope_acceptance::{ClickScopeSession, FakeBackends, HarnessError, Service};
use url::Url;

fn unset(_: &str) -> Option<String> {
    None
}

fn session() -> ClickScopeSession {
    let config = harness_config();
    let backends = FakeBackends::start(&config, unset).unwrap();
    let search = Url::parse(backends.env().get(Service::Search).unwrap()).unwrap();
    ClickScopeSession::open(click_scope_dash(search), &config)
        .unwrap()
        .with_backends(backends)
}

#[test]
fn open_scope_becomes_current() {
    let config = harness_config();
    let backends = FakeBackends::start(&config, unset).unwrap();
    let search = Url::parse(backends.env().get(Service::Search).unwrap()).unwrap();
    let dash = Dash::new(click_scope_dash(search), Waiter::from(&config.ui));

    let scope = dash.scope(CLICK_SCOPE_ID).unwrap();
    assert!(!scope.is_current().unwrap());
    dash.open_scope(CLICK_SCOPE_ID).unwrap();
    assert!(scope.is_current().unwrap());
}

#[test]
fn search_available_app() {
    let session = session();
    session.search_app("Shorts").unwrap();
}

#[test]
fn search_for_unknown_app_finds_nothing() {
    let session = session();
    assert!(matches!(
        session.search_app("Calculator"),
        Err(HarnessError::Timeout(_))
    ));
}

#[test]
fn open_app_preview_shows_title_and_publisher() {
    let session = session();
    let details = session.app_details("Shorts").unwrap();
    assert_eq!(
        details,
        AppDetails {
            title: "Shorts".to_owned(),
            publisher: "Ubuntu Click Loader".to_owned(),
        }
    );
    let backends = session.backends().unwrap();
    assert!(backends.unmatched_requests().is_empty());
    let search_requests = backends.fixture(Service::Search).unwrap().requests();
    assert!(search_requests
        .iter()
        .any(|r| r.path == "/api/v1/package/com.ubuntu.shorts"));
}

#[test]
fn install_without_credentials_shows_login_error() {
    let session = session();
    let error = session.install_without_credentials("Shorts").unwrap();
    assert_eq!(error.title, LOGIN_ERROR_TITLE);
}
