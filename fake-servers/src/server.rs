//! axum front-end dispatching every request through a [`RouteTable`].
//!
//! The router has no axum routes of its own: a single fallback handler
//! looks the request up in the table, so matching stays prefix-based and
//! ordered exactly as the table declares it.

use crate::error::{FakeError, Result};
use crate::log::{RecordedRequest, RequestLog};
use crate::response::CannedResponse;
use crate::routes::RouteTable;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, Uri};
use axum::response::Response;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use url::Url;

/// Shared state for the dispatch handler.
struct ServeContext {
    table: Arc<RouteTable>,
    /// Placeholder expansions, resolved once against the bound base URL.
    resolved: Vec<(String, String)>,
    log: RequestLog,
}

/// Base URL (`http://<addr>/`) for a bound socket address.
///
/// # Errors
///
/// Returns [`FakeError::Config`] if the address does not form a valid URL.
pub fn base_url_for(addr: SocketAddr) -> Result<Url> {
    Url::parse(&format!("http://{addr}/"))
        .map_err(|e| FakeError::Config(format!("invalid base URL for {addr}: {e}")))
}

/// Build the dispatching router for `table` served at `base_url`.
pub fn router(table: Arc<RouteTable>, base_url: &Url, log: RequestLog) -> Router {
    let resolved = table.placeholders().resolve(base_url.as_str());
    let state = Arc::new(ServeContext {
        table,
        resolved,
        log,
    });
    Router::new().fallback(dispatch).with_state(state)
}

async fn dispatch(
    State(ctx): State<Arc<ServeContext>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let path = uri.path().to_owned();
    let head_only = method == Method::HEAD;

    let (canned, matched) = match ctx.table.resolve(&method, &path) {
        None => {
            let err = FakeError::NoRoute {
                method: method.to_string(),
                path: path.clone(),
            };
            error!("not implemented path in fake server: {method} {path}");
            (CannedResponse::from(&err), false)
        }
        Some(route) if route.requires_auth && !headers.contains_key(header::AUTHORIZATION) => {
            debug!(%method, path = %path, "rejecting request without credentials");
            (CannedResponse::from(&FakeError::Unauthorized), true)
        }
        Some(route) => match route.rule.render(route.remainder(&path), &ctx.resolved).await {
            Ok(canned) => (canned, true),
            Err(e) => {
                warn!(%method, path = %path, error = %e, "fake route failed");
                (CannedResponse::from(&e), true)
            }
        },
    };

    debug!(%method, path = %path, status = canned.status.as_u16(), "served");
    ctx.log.record(RecordedRequest {
        method: method.to_string(),
        path,
        status: canned.status.as_u16(),
        matched,
    });
    canned.into_http(head_only)
}

/// A fake bound to a listening socket, ready to serve.
pub struct FakeServer {
    listener: TcpListener,
    addr: SocketAddr,
    base_url: Url,
    router: Router,
}

impl FakeServer {
    /// Bind `host` on an OS-assigned port.
    ///
    /// # Errors
    ///
    /// Returns [`FakeError::Io`] if the socket cannot be bound and
    /// [`FakeError::Config`] if the table is invalid.
    pub async fn bind(host: &str, table: Arc<RouteTable>, log: RequestLog) -> Result<Self> {
        let listener = TcpListener::bind((host, 0)).await?;
        Self::from_listener(listener, table, log)
    }

    /// Wrap an already-bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`FakeError::Config`] if the table is invalid.
    pub fn from_listener(
        listener: TcpListener,
        table: Arc<RouteTable>,
        log: RequestLog,
    ) -> Result<Self> {
        table.validate()?;
        let addr = listener.local_addr()?;
        let base_url = base_url_for(addr)?;
        let router = router(table, &base_url, log);
        Ok(Self {
            listener,
            addr,
            base_url,
            router,
        })
    }

    /// Bound socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://<host>:<port>/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Serve until `shutdown` resolves, then stop accepting and drain open
    /// connections.
    ///
    /// # Errors
    ///
    /// Returns [`FakeError::Io`] if the accept loop fails.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("fake server listening on {}", self.base_url);
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("fake server on {} stopped", self.base_url);
        Ok(())
    }
}
