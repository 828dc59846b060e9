//! Error types for the acceptance harness.

/// Top-level error type for fixtures, backends and UI proxies.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// A fake server could not be brought up (bind, spawn, handshake).
    #[error("startup error: {0}")]
    Startup(String),

    /// A fake server did not shut down cleanly.
    #[error("shutdown error: {0}")]
    Shutdown(String),

    /// Operation not valid in the fixture's current state.
    #[error("fixture error: {0}")]
    Fixture(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// A UI element lookup or interaction failed.
    #[error("UI error: {0}")]
    Ui(String),

    /// A wait for a UI condition expired.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Error from the canned backends.
    #[error(transparent)]
    Fake(#[from] clickscope_fakes::FakeError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, HarnessError>;
