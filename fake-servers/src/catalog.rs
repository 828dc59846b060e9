//! Canned backends used by the click scope acceptance tests.
//!
//! - [`search_server`]: the click package index (search, package details,
//!   department/highlight index, static extras).
//! - [`download_server`]: dummy click payloads with a download token.
//! - [`json_tree_server`]: a directory of recorded JSON responses, as used
//!   for the reviews and pay backends.

use crate::placeholder::{Placeholder, DOWNLOAD_BASE_URL, FAKE_SERVER_BASE, SEARCH_BASE_URL};
use crate::response::ResponseRule;
use crate::routes::{MethodFilter, Route, RouteTable};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Search endpoint of the package index.
pub const SEARCH_PATH: &str = "/api/v1/search";
/// Package details endpoint; the package name follows the prefix.
pub const PACKAGE_PATH: &str = "/api/v1/package/";
/// Root of the package index API.
pub const INDEX_PATH: &str = "/api/v1";
/// Static extras (icons, screenshots).
pub const EXTRA_PATH: &str = "/extra/";
/// Download endpoint; the click file name follows the prefix.
pub const DOWNLOAD_PATH: &str = "/download/";
/// Token sent with every dummy download.
pub const DUMMY_CLICK_TOKEN: &str = "dummy";

/// A package the search fake knows about.
#[derive(Debug, Clone, PartialEq)]
pub struct CannedPackage {
    /// Click package name, e.g. `com.ubuntu.shorts`.
    pub name: String,
    /// Display title shown on the dash tile.
    pub title: String,
    /// Publisher shown as the preview subtitle.
    pub publisher: String,
    /// Full details document served by the package endpoint.
    pub details: Value,
}

impl CannedPackage {
    /// Search-result summary for this package.
    pub fn summary(&self) -> Value {
        json!({
            "name": self.name,
            "title": self.title,
            "publisher": self.publisher,
            "price": self.details.get("price").cloned().unwrap_or(json!(0.0)),
            "icon_url": self.details.get("icon_url").cloned().unwrap_or(Value::Null),
            "architecture": self.details.get("architecture").cloned().unwrap_or(json!(["all"])),
            "_links": {
                "self": {
                    "href": format!("{SEARCH_BASE_URL}api/v1/package/{}", self.name)
                }
            }
        })
    }

    /// The RSS reader used by the original dash tests.
    pub fn shorts() -> Self {
        Self {
            name: "com.ubuntu.shorts".into(),
            title: "Shorts".into(),
            publisher: "Ubuntu Click Loader".into(),
            details: json!({
                "website": "https://launchpad.net/ubuntu-rssreader-app",
                "description": "Shorts is an rssreader application\nShorts is an rss reader application that allows you to easily search for new feeds.",
                "price": 0.0,
                "framework": ["ubuntu-sdk-13.10"],
                "terms_of_service": "",
                "prices": {"USD": 0.0},
                "screenshot_url": "https://TODO/shorts0.png",
                "date_published": "2013-10-16T15:58:52.469000",
                "publisher": "Ubuntu Click Loader",
                "name": "com.ubuntu.shorts",
                "license": "GNU GPL v3",
                "changelog": "Test fixes",
                "support_url": "mailto:ubuntu-touch-coreapps@lists.launchpad.net",
                "icon_url": format!("{SEARCH_BASE_URL}extra/shorts.png"),
                "title": "Shorts",
                "binary_filesize": 164944,
                "download_url": format!("{DOWNLOAD_BASE_URL}download/shorts-dummy.click"),
                "click_version": "0.1",
                "developer_name": "Ubuntu Click Loader",
                "version": "0.2.152",
                "company_name": "",
                "keywords": ["shorts", "rss", "news"],
                "screenshot_urls": ["https://TODO/shorts0.png", "https://TODO/shorts1.png"],
                "architecture": ["all"]
            }),
        }
    }

    /// The Delta web app from the later index fixtures.
    pub fn delta() -> Self {
        Self {
            name: "com.ubuntu.developer.dobey.delta-web".into(),
            title: "Delta".into(),
            publisher: "Rodney Dawes".into(),
            details: json!({
                "website": "",
                "description": "A simple web app for Delta.\nCheck in, view flight schedules, and book flights, on the Delta mobile web site.",
                "price": 0.0,
                "date_published": "2014-05-03T15:30:16.431511Z",
                "framework": ["ubuntu-sdk-14.04-qml-dev1"],
                "terms_of_service": "",
                "prices": {"USD": 0.0},
                "screenshot_url": "http://TODO/delta-web-checkin.png",
                "category": "Utility",
                "publisher": "Rodney Dawes",
                "name": "com.ubuntu.developer.dobey.delta-web",
                "license": "GNU GPL v3",
                "title": "Delta",
                "support_url": "https://launchpad.net/~dobey",
                "icon_url": "http://TODO/delta-web.png",
                "changelog": "",
                "binary_filesize": 23728,
                "download_url": format!("{DOWNLOAD_BASE_URL}download/delta-dummy.click"),
                "click_version": "0.1",
                "developer_name": "Rodney Dawes",
                "version": "1.0.1",
                "company_name": "",
                "keywords": ["delta", "airlines", "flight", "status", "schedules"],
                "department": ["Accessories"],
                "screenshot_urls": [
                    "http://TODO/delta-web-checkin.png",
                    "https://TODO/delta-web-main.png"
                ],
                "architecture": ["all"]
            }),
        }
    }
}

/// Builder for the package index fake.
#[derive(Debug, Clone, Default)]
pub struct SearchServer {
    packages: Vec<CannedPackage>,
    download_base_url: Option<String>,
    extra_root: Option<PathBuf>,
}

/// Start building a search fake.
pub fn search_server() -> SearchServer {
    SearchServer::default()
}

impl SearchServer {
    /// Add a package to search results, details and highlights.
    pub fn package(mut self, package: CannedPackage) -> Self {
        self.packages.push(package);
        self
    }

    /// Base URL of the download fake referenced by `download_url` fields.
    pub fn download_base_url(mut self, url: impl Into<String>) -> Self {
        self.download_base_url = Some(url.into());
        self
    }

    /// Directory served under `/extra/`.
    pub fn extra_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.extra_root = Some(root.into());
        self
    }

    /// The immutable route table.
    pub fn build(self) -> RouteTable {
        let summaries: Vec<Value> = self.packages.iter().map(CannedPackage::summary).collect();
        let details: BTreeMap<String, Value> = self
            .packages
            .iter()
            .map(|p| (p.name.clone(), p.details.clone()))
            .collect();

        let mut table = RouteTable::new().route(Route::get(
            SEARCH_PATH,
            ResponseRule::json(json!({
                "_embedded": { "clickindex:package": summaries }
            })),
        ));
        if let Some(root) = self.extra_root {
            table = table.route(Route::get(EXTRA_PATH, ResponseRule::static_files(root)));
        }
        table = table
            .route(Route::get(
                PACKAGE_PATH,
                ResponseRule::PackageDetails { packages: details },
            ))
            .route(Route::get(INDEX_PATH, ResponseRule::json(index_document(&summaries))))
            .placeholder(SEARCH_BASE_URL, Placeholder::SelfBase);
        if let Some(url) = self.download_base_url {
            table = table.placeholder(DOWNLOAD_BASE_URL, Placeholder::Literal(url));
        }
        table
    }
}

/// HAL index with one department and one highlight holding every package.
fn index_document(summaries: &[Value]) -> Value {
    json!({
        "_embedded": {
            "clickindex:department": [{
                "has_children": false,
                "_links": {"self": {"href": format!("{SEARCH_BASE_URL}api/v1/departments/accessories")}},
                "name": "Accessories",
                "slug": "accessories"
            }],
            "clickindex:highlight": [{
                "_embedded": {"clickindex:package": summaries},
                "_links": {"self": {"href": format!("{SEARCH_BASE_URL}api/v1/highlights/travel-apps")}},
                "name": "Travel apps",
                "slug": "travel-apps"
            }]
        },
        "_links": {
            "clickindex:department": {
                "href": format!("{SEARCH_BASE_URL}api/v1/departments/{{slug}}"),
                "templated": true,
                "title": "Department"
            },
            "clickindex:departments": {
                "href": format!("{SEARCH_BASE_URL}api/v1/departments"),
                "title": "Departments"
            },
            "clickindex:highlight": {
                "href": format!("{SEARCH_BASE_URL}api/v1/highlights/{{slug}}"),
                "templated": true,
                "title": "Highlight"
            },
            "clickindex:highlights": {
                "href": format!("{SEARCH_BASE_URL}api/v1/highlights"),
                "title": "Highlights"
            },
            "clickindex:package": {
                "href": format!("{SEARCH_BASE_URL}api/v1/package/{{name}}"),
                "templated": true,
                "title": "Package"
            },
            "curies": [{
                "href": format!("{SEARCH_BASE_URL}docs/v1/relations.html{{#rel}}"),
                "name": "clickindex",
                "templated": true
            }],
            "search": {
                "href": format!("{SEARCH_BASE_URL}api/v1/search{{?q}}"),
                "templated": true,
                "title": "Search"
            },
            "self": {"href": format!("{SEARCH_BASE_URL}api/v1")}
        }
    })
}

/// Download fake: `GET`/`HEAD /download/<name>` serve the dummy payload
/// for `<name>` with an `X-Click-Token` header.
pub fn download_server() -> RouteTable {
    RouteTable::new().route(Route::new(
        MethodFilter::GetOrHead,
        DOWNLOAD_PATH,
        ResponseRule::DummyDownload {
            token: DUMMY_CLICK_TOKEN.into(),
        },
    ))
}

/// Recorded JSON responses under `root`, optionally behind the auth gate.
/// `[FAKE_SERVER_BASE]` in the files becomes the fake's own base URL.
pub fn json_tree_server(root: impl Into<PathBuf>, needs_auth: bool) -> RouteTable {
    let table = RouteTable::new()
        .route(Route::new(
            MethodFilter::GetOrHead,
            "/",
            ResponseRule::json_tree(root),
        ))
        .placeholder(FAKE_SERVER_BASE, Placeholder::SelfBase);
    if needs_auth {
        table.require_auth()
    } else {
        table
    }
}
