//! Ephemeral fake HTTP server fixtures with guaranteed teardown.
//!
//! A [`FakeServerFixture`] owns one fake server serving an immutable
//! [`RouteTable`]. `start` binds an OS-assigned loopback port and returns
//! the base URL only once the socket is listening; `stop` (or dropping the
//! fixture) shuts the server down and waits for its thread or process.
//!
//! ```text
//! Created → Listening → Stopped
//!    └───────────────────↗
//! ```

mod process;
mod thread;

pub use process::{
    HANDSHAKE_PREFIX, REQUEST_PREFIX, format_request_line, parse_handshake, parse_request_line,
};

use crate::config::{FixtureConfig, IsolationMode};
use crate::error::{HarnessError, Result};
use clickscope_fakes::{RecordedRequest, RequestLog, RouteTable};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Fixture lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    /// Constructed, nothing bound yet.
    Created,
    /// Socket bound and background server running.
    Listening,
    /// Shut down (or never started). Terminal.
    Stopped,
}

impl FixtureState {
    /// Returns `true` if no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns `true` if a transition from `self` to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Created, Self::Listening)
                | (Self::Created, Self::Stopped)
                | (Self::Listening, Self::Stopped)
        )
    }
}

impl fmt::Display for FixtureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Listening => "listening",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

enum Backend {
    Thread(thread::ThreadServer),
    Process(process::ProcessServer),
}

impl Backend {
    fn stop(&mut self, grace: std::time::Duration) -> Result<()> {
        match self {
            Self::Thread(server) => server.stop(grace),
            Self::Process(server) => server.stop(grace),
        }
    }
}

/// One disposable fake server.
///
/// Dropping a listening fixture stops it, so a failing or panicking test
/// still releases its port.
pub struct FakeServerFixture {
    name: String,
    table: Arc<RouteTable>,
    config: FixtureConfig,
    state: FixtureState,
    base_url: Option<Url>,
    backend: Option<Backend>,
    log: RequestLog,
}

impl FakeServerFixture {
    /// A fixture in the `Created` state. Nothing is bound until
    /// [`start`](Self::start).
    pub fn new(name: impl Into<String>, table: RouteTable, config: FixtureConfig) -> Self {
        Self {
            name: name.into(),
            table: Arc::new(table),
            config,
            state: FixtureState::Created,
            base_url: None,
            backend: None,
            log: RequestLog::new(),
        }
    }

    /// Construct and start in one step.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub fn running(
        name: impl Into<String>,
        table: RouteTable,
        config: FixtureConfig,
    ) -> Result<Self> {
        let mut fixture = Self::new(name, table, config);
        fixture.start()?;
        Ok(fixture)
    }

    /// Fixture name used in logs and thread names.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> FixtureState {
        self.state
    }

    /// Isolation mode this fixture runs with.
    pub fn isolation(&self) -> IsolationMode {
        self.config.isolation
    }

    /// Bind, start serving and return the base URL.
    ///
    /// Returns only once the socket accepts connections, so a request
    /// issued right after this call never races a not-yet-listening server.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::Fixture`] if the fixture is already listening or
    ///   stopped.
    /// - [`HarnessError::Fake`] if the route table is invalid.
    /// - [`HarnessError::Startup`] if binding, spawning or the readiness
    ///   handshake fails.
    pub fn start(&mut self) -> Result<Url> {
        if !self.state.can_transition_to(FixtureState::Listening) {
            return Err(HarnessError::Fixture(format!(
                "cannot start fake server `{}` while {}",
                self.name, self.state
            )));
        }
        self.table.validate()?;

        info!(fixture = %self.name, isolation = ?self.config.isolation, "starting fake server");
        let (backend, url) = match self.config.isolation {
            IsolationMode::InProcess => {
                let (server, url) = thread::spawn(
                    &self.name,
                    Arc::clone(&self.table),
                    self.log.clone(),
                    &self.config,
                )?;
                (Backend::Thread(server), url)
            }
            IsolationMode::Subprocess => {
                let (server, url) =
                    process::spawn(&self.name, &self.table, self.log.clone(), &self.config)?;
                (Backend::Process(server), url)
            }
        };
        info!(fixture = %self.name, "serving at {url}");

        self.backend = Some(backend);
        self.base_url = Some(url.clone());
        self.state = FixtureState::Listening;
        Ok(url)
    }

    /// Stop serving and wait for the background thread or process to exit.
    ///
    /// Idempotent: stopping a stopped or never-started fixture does nothing.
    /// A server that does not exit within `stop_timeout` is terminated.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Shutdown`] if the server had to be abandoned.
    /// The fixture is `Stopped` either way.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            FixtureState::Stopped => return Ok(()),
            FixtureState::Created => {
                self.state = FixtureState::Stopped;
                return Ok(());
            }
            FixtureState::Listening => {}
        }

        info!(fixture = %self.name, "stopping fake server");
        self.state = FixtureState::Stopped;
        match self.backend.take() {
            Some(mut backend) => backend.stop(self.config.stop_timeout()),
            None => Ok(()),
        }
    }

    /// Base URL while listening (`http://<host>:<port>/`).
    ///
    /// Stays available after `stop` so tests can check the server is gone.
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Absolute URL of `path` on this fake.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Fixture`] if the fixture never started, or
    /// [`HarnessError::Config`] if `path` cannot be joined.
    pub fn url(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_ref().ok_or_else(|| {
            HarnessError::Fixture(format!("fake server `{}` was never started", self.name))
        })?;
        base.join(path.trim_start_matches('/'))
            .map_err(|e| HarnessError::Config(format!("invalid path `{path}`: {e}")))
    }

    /// Requests served so far.
    ///
    /// A subprocess fixture receives its entries over the child's stdout,
    /// so a request may show up a moment after its response; after
    /// [`stop`](Self::stop) the log is complete in both modes.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.log.snapshot()
    }

    /// Requests no declared route handled.
    pub fn unmatched_requests(&self) -> Vec<RecordedRequest> {
        self.log.unmatched()
    }
}

impl Drop for FakeServerFixture {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(fixture = %self.name, error = %e, "fake server teardown failed");
        }
    }
}

impl fmt::Debug for FakeServerFixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeServerFixture")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("isolation", &self.config.isolation)
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}
