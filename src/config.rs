//! Configuration for fixtures, fake backends and UI waits.

use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the out-of-process fake server binary.
pub const FAKE_SERVER_BIN_NAME: &str = "clickscope-fake-server";

/// Environment variable overriding the fake server binary path.
pub const FAKE_SERVER_BIN_ENV: &str = "CLICKSCOPE_FAKE_SERVER_BIN";

/// Top-level configuration for the acceptance harness.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Fake server fixture settings.
    pub fixture: FixtureConfig,
    /// Which canned backends to start and where their data lives.
    pub backends: BackendsConfig,
    /// UI automation timing.
    pub ui: UiConfig,
}

/// Where a fake server runs relative to the test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationMode {
    /// Dedicated background thread in the test process.
    #[default]
    InProcess,
    /// Separate `clickscope-fake-server` process, isolated from the test's
    /// signal handling.
    Subprocess,
}

/// Fake server fixture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    /// Thread or child process.
    pub isolation: IsolationMode,
    /// Interface to bind. The port is always chosen by the OS.
    pub host: String,
    /// How long `start` waits for the server to report it is listening.
    pub startup_timeout_ms: u64,
    /// How long `stop` waits for a clean exit before forcing termination.
    pub stop_timeout_ms: u64,
    /// Explicit path to the fake server binary (subprocess mode only).
    pub server_binary: Option<PathBuf>,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            isolation: IsolationMode::InProcess,
            host: "127.0.0.1".to_owned(),
            startup_timeout_ms: 10_000,
            stop_timeout_ms: 5_000,
            server_binary: None,
        }
    }
}

impl FixtureConfig {
    /// Same settings with a different isolation mode.
    pub fn with_isolation(mut self, isolation: IsolationMode) -> Self {
        self.isolation = isolation;
        self
    }

    /// Startup deadline.
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// Shutdown grace period.
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Locate the fake server binary: explicit path, then
    /// `CLICKSCOPE_FAKE_SERVER_BIN`, then `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] if no candidate exists.
    pub fn resolve_server_binary(&self) -> Result<PathBuf> {
        if let Some(path) = &self.server_binary {
            return existing(path);
        }
        if let Ok(path) = std::env::var(FAKE_SERVER_BIN_ENV) {
            if !path.trim().is_empty() {
                return existing(Path::new(path.trim()));
            }
        }
        which::which(FAKE_SERVER_BIN_NAME).map_err(|e| {
            HarnessError::Config(format!(
                "{FAKE_SERVER_BIN_NAME} not found (set {FAKE_SERVER_BIN_ENV}): {e}"
            ))
        })
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(HarnessError::Config("fixture.host must not be empty".into()));
        }
        if self.startup_timeout_ms == 0 {
            return Err(HarnessError::Config(
                "fixture.startup_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.stop_timeout_ms == 0 {
            return Err(HarnessError::Config(
                "fixture.stop_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn existing(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(HarnessError::Config(format!(
            "fake server binary {} does not exist",
            path.display()
        )))
    }
}

/// Canned backend configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    /// Root of the recorded JSON responses. When set, the reviews
    /// (`ratings-and-reviews/`) and pay (`software-center-agent/`) fakes
    /// are started from its subdirectories.
    pub responses_root: Option<PathBuf>,
    /// Directory served by the search fake under `/extra/`.
    pub extra_root: Option<PathBuf>,
}

/// UI automation timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Upper bound for every wait on the UI.
    pub wait_timeout_ms: u64,
    /// Delay between polls while waiting.
    pub poll_interval_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 10_000,
            poll_interval_ms: 100,
        }
    }
}

impl UiConfig {
    /// Wait deadline.
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    /// Poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl HarnessConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] on malformed TOML or invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| HarnessError::Config(format!("invalid harness config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if the file cannot be read and
    /// [`HarnessError::Config`] if it is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check every section.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.fixture.validate()?;
        if self.ui.poll_interval_ms == 0 {
            return Err(HarnessError::Config(
                "ui.poll_interval_ms must be greater than 0".into(),
            ));
        }
        if self.ui.poll_interval_ms > self.ui.wait_timeout_ms {
            return Err(HarnessError::Config(
                "ui.poll_interval_ms must be <= ui.wait_timeout_ms".into(),
            ));
        }
        Ok(())
    }
}
