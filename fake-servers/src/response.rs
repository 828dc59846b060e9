//! Response rules and the canned responses they render to.

use crate::error::{FakeError, Result};
use crate::placeholder::{substitute_bytes, substitute_json};
use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Header carrying the click download token.
pub const CLICK_TOKEN_HEADER: &str = "x-click-token";

/// Prefix of every generated dummy click payload.
pub const DUMMY_CLICK_PREFIX: &str = "Dummy click file.";

/// Index file served when a file-tree request resolves to a directory.
pub const DIRECTORY_INDEX: &str = "index.json";

const JSON_CONTENT_TYPE: &str = "application/json";

fn default_status() -> u16 {
    200
}

fn default_substitute() -> bool {
    true
}

/// How a matched route produces its response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ResponseRule {
    /// In-memory JSON literal. Placeholder tokens in string leaves are
    /// substituted.
    Json {
        #[serde(default = "default_status")]
        status: u16,
        body: serde_json::Value,
    },
    /// Literal text body.
    Text {
        #[serde(default = "default_status")]
        status: u16,
        content_type: String,
        body: String,
    },
    /// The path remainder names a package; its details are served as JSON.
    PackageDetails {
        packages: BTreeMap<String, serde_json::Value>,
    },
    /// The path remainder is resolved under `root`. Directories serve
    /// `index.json`.
    FileTree {
        root: PathBuf,
        /// Fixed content type; guessed from the extension when absent.
        #[serde(default)]
        content_type: Option<String>,
        /// Substitute placeholder tokens in the file bytes.
        #[serde(default = "default_substitute")]
        substitute: bool,
    },
    /// Deterministic dummy click payload named by the path remainder.
    DummyDownload { token: String },
}

impl ResponseRule {
    /// `200` JSON literal.
    pub fn json(body: serde_json::Value) -> Self {
        Self::Json { status: 200, body }
    }

    /// `200` plain-text literal.
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text {
            status: 200,
            content_type: "text/plain; charset=utf-8".into(),
            body: body.into(),
        }
    }

    /// File tree under `root` served as JSON with placeholder substitution.
    pub fn json_tree(root: impl Into<PathBuf>) -> Self {
        Self::FileTree {
            root: root.into(),
            content_type: Some(JSON_CONTENT_TYPE.into()),
            substitute: true,
        }
    }

    /// Raw static files under `root`, content type guessed per file.
    pub fn static_files(root: impl Into<PathBuf>) -> Self {
        Self::FileTree {
            root: root.into(),
            content_type: None,
            substitute: false,
        }
    }

    /// Render this rule for one request.
    ///
    /// `remainder` is the request path with the route prefix removed;
    /// `resolved` holds the placeholder expansions for the serving fake.
    ///
    /// # Errors
    ///
    /// [`FakeError::NotFound`] for unknown packages or missing files,
    /// [`FakeError::Io`] for unreadable files and [`FakeError::Config`] for
    /// invalid status codes.
    pub async fn render(
        &self,
        remainder: &str,
        resolved: &[(String, String)],
    ) -> Result<CannedResponse> {
        match self {
            Self::Json { status, body } => {
                let mut body = body.clone();
                substitute_json(&mut body, resolved);
                CannedResponse::json(parse_status(*status)?, &body)
            }
            Self::Text {
                status,
                content_type,
                body,
            } => Ok(CannedResponse::new(
                parse_status(*status)?,
                content_type,
                Bytes::from(body.clone()),
            )),
            Self::PackageDetails { packages } => {
                let name = decode_segment(remainder.trim_end_matches('/'))?;
                let mut details = packages
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| FakeError::NotFound(format!("package {name}")))?;
                substitute_json(&mut details, resolved);
                CannedResponse::json(StatusCode::OK, &details)
            }
            Self::FileTree {
                root,
                content_type,
                substitute,
            } => {
                let path = resolve_under(root, remainder)?;
                let path = if tokio::fs::metadata(&path)
                    .await
                    .map(|m| m.is_dir())
                    .unwrap_or(false)
                {
                    path.join(DIRECTORY_INDEX)
                } else {
                    path
                };
                let data = match tokio::fs::read(&path).await {
                    Ok(data) => data,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Err(FakeError::NotFound(format!("file {}", path.display())));
                    }
                    Err(e) => return Err(FakeError::Io(e)),
                };
                let data = if *substitute {
                    substitute_bytes(&data, resolved)
                } else {
                    data
                };
                let content_type = content_type
                    .clone()
                    .unwrap_or_else(|| guess_content_type(&path).to_owned());
                Ok(CannedResponse::new(
                    StatusCode::OK,
                    &content_type,
                    Bytes::from(data),
                ))
            }
            Self::DummyDownload { token } => {
                let name = decode_segment(remainder)?;
                Ok(CannedResponse::new(
                    StatusCode::OK,
                    "application/octet-stream",
                    dummy_click_payload(&name),
                )
                .with_header(CLICK_TOKEN_HEADER, token))
            }
        }
    }
}

/// The dummy click payload served for `name`.
pub fn dummy_click_payload(name: &str) -> Bytes {
    Bytes::from(format!("{DUMMY_CLICK_PREFIX}{name}"))
}

fn parse_status(status: u16) -> Result<StatusCode> {
    StatusCode::from_u16(status)
        .map_err(|e| FakeError::Config(format!("invalid status code {status}: {e}")))
}

fn decode_segment(raw: &str) -> Result<String> {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|e| FakeError::NotFound(format!("undecodable path `{raw}`: {e}")))
}

/// Join a request path remainder onto `root`, refusing to leave it.
fn resolve_under(root: &Path, remainder: &str) -> Result<PathBuf> {
    let decoded = decode_segment(remainder)?;
    let mut path = root.to_path_buf();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(FakeError::NotFound(format!("path outside root: {remainder}")));
            }
        }
    }
    Ok(path)
}

fn guess_content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => JSON_CONTENT_TYPE,
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// A fully rendered response: status, headers and body bytes.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    /// Response status.
    pub status: StatusCode,
    /// `Content-Type` header value.
    pub content_type: String,
    /// Additional headers, in order.
    pub headers: Vec<(String, String)>,
    /// Body bytes. `Content-Length` is always exactly `body.len()`.
    pub body: Bytes,
}

impl CannedResponse {
    /// Response with the given status, content type and body.
    pub fn new(status: StatusCode, content_type: &str, body: Bytes) -> Self {
        Self {
            status,
            content_type: content_type.to_owned(),
            headers: Vec::new(),
            body,
        }
    }

    /// Serialize `value` as an `application/json` body.
    ///
    /// # Errors
    ///
    /// Returns [`FakeError::Serialization`] if encoding fails.
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(status, JSON_CONTENT_TYPE, Bytes::from(body)))
    }

    /// JSON error body `{"error": message}`.
    pub fn error(status: StatusCode, message: &str) -> Self {
        let body = serde_json::json!({ "error": message }).to_string();
        Self::new(status, JSON_CONTENT_TYPE, Bytes::from(body))
    }

    /// Append a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Build the HTTP response. For `HEAD` the headers, including
    /// `Content-Length`, are those of the full response but no body is sent.
    pub fn into_http(self, head_only: bool) -> Response {
        let length = self.body.len();
        let body = if head_only {
            Body::empty()
        } else {
            Body::from(self.body)
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&self.content_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        for (name, value) in self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::warn!(header = %name, "dropping invalid canned header"),
            }
        }
        response
    }
}

impl From<&FakeError> for CannedResponse {
    fn from(err: &FakeError) -> Self {
        Self::error(err.status(), &err.to_string())
    }
}
