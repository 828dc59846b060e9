//! Subprocess isolation: the fake runs in a `clickscope-fake-server` child.
//!
//! The route table travels to the child as JSON on stdin. The child binds,
//! prints `LISTENING <base-url>` on stdout and serves until it receives
//! SIGTERM. Non-unix hosts skip the graceful step and kill outright.
//!
//! After the handshake the child prints one `REQUEST <json>` line per served
//! request; the reader thread replays them into the parent's request log.

use crate::config::FixtureConfig;
use crate::error::{HarnessError, Result};
use clickscope_fakes::{RecordedRequest, RequestLog, RouteTable};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// First stdout line a fake server child prints once it is listening.
pub const HANDSHAKE_PREFIX: &str = "LISTENING ";

/// Prefix of each request record the child prints after the handshake.
pub const REQUEST_PREFIX: &str = "REQUEST ";

const EXIT_POLL: Duration = Duration::from_millis(20);

/// Parse the child's readiness line into its base URL.
///
/// # Errors
///
/// Returns [`HarnessError::Startup`] if the line is not a handshake or the
/// URL is malformed.
pub fn parse_handshake(line: &str) -> Result<Url> {
    let rest = line
        .trim_end()
        .strip_prefix(HANDSHAKE_PREFIX)
        .ok_or_else(|| HarnessError::Startup(format!("unexpected fake server output: {line:?}")))?;
    Url::parse(rest.trim())
        .map_err(|e| HarnessError::Startup(format!("invalid fake server URL {rest:?}: {e}")))
}

/// Parse a request record line, `None` for any other output.
///
/// # Errors
///
/// Returns the JSON error if the line has the prefix but a malformed body.
pub fn parse_request_line(line: &str) -> Option<serde_json::Result<RecordedRequest>> {
    line.trim_end()
        .strip_prefix(REQUEST_PREFIX)
        .map(serde_json::from_str)
}

/// Format `request` as a record line for the parent.
///
/// # Errors
///
/// Returns the JSON error if `request` cannot be serialized.
pub fn format_request_line(request: &RecordedRequest) -> serde_json::Result<String> {
    Ok(format!("{REQUEST_PREFIX}{}", serde_json::to_string(request)?))
}

pub(super) struct ProcessServer {
    name: String,
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
}

pub(super) fn spawn(
    name: &str,
    table: &RouteTable,
    log: RequestLog,
    config: &FixtureConfig,
) -> Result<(ProcessServer, Url)> {
    let binary = config
        .resolve_server_binary()
        .map_err(|e| HarnessError::Startup(e.to_string()))?;
    let payload = table.to_json()?;

    debug!(fixture = %name, binary = %binary.display(), "spawning fake server process");
    let mut child = Command::new(&binary)
        .arg("--host")
        .arg(&config.host)
        .arg("--name")
        .arg(name)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| {
            HarnessError::Startup(format!("cannot spawn {}: {e}", binary.display()))
        })?;

    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(payload.as_bytes()),
        None => Err(std::io::Error::other("child stdin not captured")),
    };
    if let Err(e) = written {
        reap(&mut child);
        return Err(HarnessError::Startup(format!(
            "cannot send route table to fake server: {e}"
        )));
    }

    let Some(stdout) = child.stdout.take() else {
        reap(&mut child);
        return Err(HarnessError::Startup("child stdout not captured".into()));
    };

    let (line_tx, line_rx) = crossbeam_channel::bounded::<Option<String>>(1);
    let fixture = name.to_owned();
    let reader = std::thread::Builder::new()
        .name(format!("fake-{name}-stdout"))
        .spawn(move || {
            let mut lines = BufReader::new(stdout).lines();
            let _ = line_tx.send(lines.next().and_then(|line| line.ok()));
            for line in lines.map_while(|line| line.ok()) {
                match parse_request_line(&line) {
                    Some(Ok(request)) => log.record(request),
                    Some(Err(e)) => {
                        warn!(fixture = %fixture, error = %e, "malformed request record");
                    }
                    None => debug!(fixture = %fixture, "{line}"),
                }
            }
        });
    let reader = match reader {
        Ok(reader) => reader,
        Err(e) => {
            reap(&mut child);
            return Err(HarnessError::Startup(format!("cannot spawn reader thread: {e}")));
        }
    };

    let handshake = match line_rx.recv_timeout(config.startup_timeout()) {
        Ok(Some(line)) => parse_handshake(&line),
        Ok(None) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
            let status = child.try_wait().ok().flatten();
            Err(HarnessError::Startup(format!(
                "fake server `{name}` exited before listening ({})",
                status.map_or_else(|| "still running".to_owned(), |s| s.to_string())
            )))
        }
        Err(crossbeam_channel::RecvTimeoutError::Timeout) => Err(HarnessError::Startup(format!(
            "fake server `{name}` did not report readiness within {:?}",
            config.startup_timeout()
        ))),
    };

    match handshake {
        Ok(url) => Ok((
            ProcessServer {
                name: name.to_owned(),
                child: Some(child),
                reader: Some(reader),
            },
            url,
        )),
        Err(e) => {
            reap(&mut child);
            let _ = reader.join();
            Err(e)
        }
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn request_termination(child: &mut Child) -> std::io::Result<()> {
    let pid = i32::try_from(child.id()).map_err(std::io::Error::other)?;
    // SAFETY: kill(2) with a pid we spawned and have not yet reaped.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}

impl ProcessServer {
    /// SIGTERM, wait up to `grace`, then SIGKILL.
    pub(super) fn stop(&mut self, grace: Duration) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let outcome = self.terminate(&mut child, grace);
        if outcome.is_err() {
            reap(&mut child);
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        outcome
    }

    fn terminate(&self, child: &mut Child, grace: Duration) -> Result<()> {
        if let Some(status) = child.try_wait()? {
            warn!(fixture = %self.name, %status, "fake server process had already exited");
            return Ok(());
        }
        if let Err(e) = request_termination(child) {
            warn!(fixture = %self.name, error = %e, "cannot signal fake server");
        }
        let deadline = Instant::now() + grace;
        loop {
            if child.try_wait()?.is_some() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(fixture = %self.name, "fake server ignored SIGTERM for {grace:?}, killing");
                child.kill()?;
                child.wait()?;
                return Err(HarnessError::Shutdown(format!(
                    "fake server `{}` had to be killed",
                    self.name
                )));
            }
            std::thread::sleep(EXIT_POLL);
        }
    }
}

impl Drop for ProcessServer {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            reap(&mut child);
        }
    }
}
