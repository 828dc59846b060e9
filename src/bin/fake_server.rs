//! Out-of-process fake server.
//!
//! Reads a JSON route table from stdin, binds an OS-assigned port, prints
//! `LISTENING <base-url>` on stdout and serves until SIGTERM or Ctrl-C.
//! Every served request is then reported as a `REQUEST <json>` line.
//!
//! All tracing output goes to stderr so that stdout carries only the
//! protocol lines.

use anyhow::Context;
use clickscope_acceptance::fixture::{HANDSHAKE_PREFIX, format_request_line};
use clickscope_fakes::{FakeServer, RecordedRequest, RequestLog, RouteTable};
use std::io::{Read, Write};
use std::sync::Arc;

struct Args {
    host: String,
    name: String,
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut args = Args {
        host: "127.0.0.1".to_owned(),
        name: "fake".to_owned(),
    };
    let mut iter = std::env::args().skip(1);
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--host" => args.host = iter.next().context("--host requires a value")?,
            "--name" => args.name = iter.next().context("--name requires a value")?,
            "help" | "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            other => anyhow::bail!("unknown argument `{other}`"),
        }
    }
    Ok(Some(args))
}

fn print_usage() {
    eprintln!("usage: clickscope-fake-server [--host <addr>] [--name <label>] < routes.json");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading route table from stdin")?;
    let table = RouteTable::from_json(&input).context("parsing route table")?;

    let server = FakeServer::bind(&args.host, Arc::new(table), RequestLog::with_sink(report))
        .await
        .with_context(|| format!("binding {}", args.host))?;

    {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{HANDSHAKE_PREFIX}{}", server.base_url())?;
        stdout.flush()?;
    }
    tracing::info!(fake = %args.name, "fake server ready at {}", server.base_url());

    server.run(shutdown_signal()).await.map_err(|e| {
        tracing::error!(fake = %args.name, error = %e, "fake server exited with error");
        anyhow::anyhow!("fake server `{}` failed: {e}", args.name)
    })?;

    tracing::info!(fake = %args.name, "fake server shut down cleanly");
    Ok(())
}

/// Forward one request record to the parent.
fn report(request: &RecordedRequest) {
    let line = match format_request_line(request) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!(error = %e, "cannot encode request record");
            return;
        }
    };
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{line}").and_then(|()| stdout.flush()) {
        tracing::warn!(error = %e, "cannot report request to parent");
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = term.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
