//! In-process isolation: one dedicated thread with its own current-thread
//! tokio runtime per fixture.

use crate::config::FixtureConfig;
use crate::error::{HarnessError, Result};
use clickscope_fakes::{FakeServer, RequestLog, RouteTable};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use url::Url;

/// Extra time `stop` allows beyond the grace period for the thread to
/// tear its runtime down.
const JOIN_MARGIN: Duration = Duration::from_secs(1);

pub(super) struct ThreadServer {
    name: String,
    cancel: CancellationToken,
    done: Receiver<Result<()>>,
    handle: Option<JoinHandle<()>>,
}

/// Bind synchronously, then hand the listener to a serving thread.
///
/// The socket is listening before this returns; the readiness message only
/// confirms the runtime and router came up.
pub(super) fn spawn(
    name: &str,
    table: Arc<RouteTable>,
    log: RequestLog,
    config: &FixtureConfig,
) -> Result<(ThreadServer, Url)> {
    let listener = std::net::TcpListener::bind((config.host.as_str(), 0))
        .map_err(|e| HarnessError::Startup(format!("cannot bind {}: {e}", config.host)))?;
    listener.set_nonblocking(true)?;

    let cancel = CancellationToken::new();
    let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<Url>>(1);
    let (done_tx, done_rx) = crossbeam_channel::bounded::<Result<()>>(1);

    let token = cancel.clone();
    let grace = config.stop_timeout();
    let fixture = name.to_owned();
    let handle = std::thread::Builder::new()
        .name(format!("fake-{name}"))
        .spawn(move || {
            let outcome = serve_on_thread(&fixture, listener, table, log, token, grace, &ready_tx);
            let _ = done_tx.send(outcome);
        })
        .map_err(|e| HarnessError::Startup(format!("cannot spawn server thread: {e}")))?;

    match ready_rx.recv_timeout(config.startup_timeout()) {
        Ok(Ok(url)) => Ok((
            ThreadServer {
                name: name.to_owned(),
                cancel,
                done: done_rx,
                handle: Some(handle),
            },
            url,
        )),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => {
            cancel.cancel();
            Err(HarnessError::Startup(format!(
                "fake server `{name}` did not become ready within {:?}",
                config.startup_timeout()
            )))
        }
    }
}

fn serve_on_thread(
    name: &str,
    listener: std::net::TcpListener,
    table: Arc<RouteTable>,
    log: RequestLog,
    token: CancellationToken,
    grace: Duration,
    ready: &Sender<Result<Url>>,
) -> Result<()> {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(HarnessError::Startup(format!(
                "cannot build runtime: {e}"
            ))));
            return Ok(());
        }
    };

    let outcome = runtime.block_on(async move {
        let server = match tokio::net::TcpListener::from_std(listener)
            .map_err(HarnessError::from)
            .and_then(|l| FakeServer::from_listener(l, table, log).map_err(HarnessError::from))
        {
            Ok(server) => server,
            Err(e) => {
                let _ = ready.send(Err(e));
                return Ok(());
            }
        };
        let _ = ready.send(Ok(server.base_url().clone()));

        let deadline = {
            let token = token.clone();
            async move {
                token.cancelled().await;
                tokio::time::sleep(grace).await;
            }
        };

        tokio::select! {
            result = server.run(token.cancelled_owned()) => {
                if let Err(e) = result {
                    error!(fixture = %name, error = %e, "fake server stopped with an error");
                }
                Ok(())
            }
            () = deadline => {
                warn!(fixture = %name, "connections still open after {grace:?}, dropping them");
                Err(HarnessError::Shutdown(format!(
                    "fake server `{name}` had to drop open connections after {grace:?}"
                )))
            }
        }
    });
    // Dropping the runtime aborts any connection task still alive.
    drop(runtime);
    outcome
}

impl ThreadServer {
    /// Cancel, wait up to `grace` plus a margin, then join.
    pub(super) fn stop(&mut self, grace: Duration) -> Result<()> {
        self.cancel.cancel();
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let joined = |handle: JoinHandle<()>| {
            handle.join().map_err(|_| {
                HarnessError::Shutdown(format!("server thread for `{}` panicked", self.name))
            })
        };
        match self.done.recv_timeout(grace + JOIN_MARGIN) {
            Ok(outcome) => {
                joined(handle)?;
                outcome
            }
            Err(RecvTimeoutError::Disconnected) => joined(handle),
            Err(RecvTimeoutError::Timeout) => Err(HarnessError::Shutdown(format!(
                "server thread for `{}` did not exit within {:?}; detached",
                self.name,
                grace + JOIN_MARGIN
            ))),
        }
    }
}
