//! Shared helpers for integration tests.

use clickscope_acceptance::config::{FixtureConfig, HarnessConfig, IsolationMode};
use clickscope_acceptance::dash::InMemoryShell;
use clickscope_acceptance::dash::proxies::{
    APP_PREVIEW, DASH_PREVIEW, INSTALL_BUTTON, INSTALL_LABEL, SCOPE_BUTTON, SCOPE_ID, SCOPE_VIEW,
    SEARCH_INDICATOR, TILE,
};
use clickscope_acceptance::scenarios::{CLICK_SCOPE_ID, LOGIN_ERROR_TITLE};
use std::io::Write;
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Fixture settings with short timeouts.
pub(crate) fn fixture_config(isolation: IsolationMode) -> FixtureConfig {
    FixtureConfig {
        isolation,
        startup_timeout_ms: 5_000,
        stop_timeout_ms: 1_000,
        server_binary: Some(PathBuf::from(env!("CARGO_BIN_EXE_clickscope-fake-server"))),
        ..FixtureConfig::default()
    }
}

/// Harness settings with short UI waits.
pub(crate) fn harness_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.fixture = fixture_config(IsolationMode::InProcess);
    config.ui.wait_timeout_ms = 2_000;
    config.ui.poll_interval_ms = 10;
    config
}

/// Blocking GET returning `(status, body)` for any status code.
pub(crate) fn get(url: &str) -> (u16, String) {
    get_with(url, None)
}

/// Blocking GET with an optional `Authorization` header.
pub(crate) fn get_with(url: &str, authorization: Option<&str>) -> (u16, String) {
    let mut request = ureq::get(url);
    if let Some(value) = authorization {
        request = request.set("Authorization", value);
    }
    match request.call() {
        Ok(response) => (response.status(), response.into_string().expect("body")),
        Err(ureq::Error::Status(code, response)) => {
            (code, response.into_string().unwrap_or_default())
        }
        Err(e) => panic!("GET {url} failed: {e}"),
    }
}

/// Blocking HEAD returning `(status, content-length, x-click-token)`.
pub(crate) fn head(url: &str) -> (u16, Option<String>, Option<String>) {
    let response = match ureq::head(url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(e) => panic!("HEAD {url} failed: {e}"),
    };
    (
        response.status(),
        response.header("content-length").map(str::to_owned),
        response.header("x-click-token").map(str::to_owned),
    )
}

/// `true` if nothing accepts connections on `url`'s port any more.
pub(crate) fn refuses_connections(url: &Url) -> bool {
    let addrs = url.socket_addrs(|| None).expect("socket addrs");
    addrs.iter().all(|addr| {
        TcpStream::connect_timeout(addr, std::time::Duration::from_millis(200)).is_err()
    })
}

/// Open a connection to `url` and send only part of a request head, so the
/// server keeps the connection open waiting for the rest.
pub(crate) fn hold_half_sent_request(url: &Url) -> TcpStream {
    let addr = url.socket_addrs(|| None).expect("socket addrs")[0];
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream
        .write_all(b"GET /download/stalled.click HTTP/1.1\r\nHost: fake\r\n")
        .expect("partial request");
    stream
}

/// A scripted dash whose click scope queries the search fake at
/// `search_base` for results and previews, like the real scope does.
///
/// Installing always fails with the login error, as no credentials exist.
pub(crate) fn click_scope_dash(search_base: Url) -> Arc<InMemoryShell> {
    let shell = Arc::new(InMemoryShell::new());
    let view = shell.add(
        SCOPE_VIEW,
        None,
        &[(SCOPE_ID, CLICK_SCOPE_ID), ("isCurrent", "false")],
    );
    let button = shell.add(SCOPE_BUTTON, None, &[(SCOPE_ID, CLICK_SCOPE_ID)]);
    shell.add(SEARCH_INDICATOR, None, &[]);
    shell.on_tap(button, move |tree| tree.set(view, "isCurrent", "true"));

    let search = search_base.clone();
    shell.on_type(move |tree, query| {
        let url = search
            .join(&format!("api/v1/search?q={}", urlencode(query)))
            .expect("search url");
        let (status, body) = get(url.as_str());
        if status != 200 {
            return;
        }
        let results: serde_json::Value = serde_json::from_str(&body).expect("search json");
        let packages = results["_embedded"]["clickindex:package"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        for package in packages {
            let title = package["title"].as_str().unwrap_or_default();
            if title.to_lowercase().contains(&query.to_lowercase()) {
                let name = package["name"].as_str().unwrap_or_default();
                tree.add(TILE, Some(view), &[("text", title), ("packageName", name)]);
            }
        }
    });

    let details_base = search_base;
    shell.on_tap_any(TILE, move |tree, tile| {
        let name = tree.get(tile, "packageName").unwrap_or_default().to_owned();
        let url = details_base
            .join(&format!("api/v1/package/{name}"))
            .expect("details url");
        let (_, body) = get(url.as_str());
        let details: serde_json::Value = serde_json::from_str(&body).expect("details json");
        let preview = tree.add(APP_PREVIEW, None, &[("showProcessingAction", "false")]);
        tree.add(
            "Label",
            Some(preview),
            &[
                ("objectName", "titleLabel"),
                ("text", details["title"].as_str().unwrap_or_default()),
            ],
        );
        tree.add(
            "Label",
            Some(preview),
            &[
                ("objectName", "subtitleLabel"),
                ("text", details["publisher"].as_str().unwrap_or_default()),
            ],
        );
        tree.add(
            "Button",
            Some(preview),
            &[("objectName", INSTALL_BUTTON), ("text", INSTALL_LABEL)],
        );
    });

    shell.on_tap_any("Button", |tree, button| {
        if tree.get(button, "objectName") != Some(INSTALL_BUTTON) {
            return;
        }
        if let Some(preview) = tree.first(APP_PREVIEW) {
            tree.remove(preview);
        }
        let error = tree.add(DASH_PREVIEW, None, &[]);
        tree.add(
            "Label",
            Some(error),
            &[("objectName", "titleLabel"), ("text", LOGIN_ERROR_TITLE)],
        );
        tree.add(
            "Label",
            Some(error),
            &[
                ("objectName", "subtitleLabel"),
                ("text", "Please log in to your Ubuntu One account."),
            ],
        );
    });

    shell
}

fn urlencode(text: &str) -> String {
    url::form_urlencoded::byte_serialize(text.as_bytes()).collect()
}
