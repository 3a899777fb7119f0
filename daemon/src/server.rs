//! TCP control listener for the daemon
//!
//! Each accepted connection gets its own task; the accept loop never waits
//! on a connection's I/O. Within one connection the read, enqueue and echo
//! steps run strictly in sequence.

use std::future::Future;
use std::io;
use std::sync::Arc;

use alarmsweet_core::control::{echo_line, MAX_LINE_BYTES};
use alarmsweet_core::Error;
use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::DaemonState;

/// Bind the control endpoint.
///
/// # Errors
/// Fails if the address is invalid or already in use. The daemon treats
/// this as fatal and starts no loops.
pub async fn bind(state: &DaemonState) -> Result<TcpListener> {
    let addr = state.config.bind_addr();
    TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind control endpoint {}", addr))
}

/// Run the accept loop until `shutdown` resolves or shutdown is requested.
pub async fn run<F>(listener: TcpListener, state: Arc<DaemonState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    info!("Listening on {}", listener.local_addr()?);

    let mut clients = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        if state.should_shutdown() {
            info!("Shutdown requested, stopping server");
            break;
        }

        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!("Controller connected from {}", addr);
                        let state = Arc::clone(&state);
                        clients.spawn(async move {
                            match handle_client(stream, state).await {
                                Ok(()) => debug!("Controller {} disconnected", addr),
                                Err(e) => error!("Client error ({}): {}", addr, e),
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            Some(_) = clients.join_next(), if !clients.is_empty() => {}
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                state.request_shutdown();
                break;
            }
            _ = state.shutdown_requested() => {}
        }
    }

    let open = clients.len();
    clients.shutdown().await;
    info!("Server stopped ({} open connections closed)", open);
    Ok(())
}

/// Resets and broken pipes from a controller that hung up early.
fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe
    )
}

/// Serve one controller connection until it disconnects.
///
/// Each full line is queued (trimmed) as a command and acknowledged with
/// `Echo: <line>`. A clean or abrupt hang-up ends the handler with `Ok`.
pub async fn handle_client<S>(stream: S, state: Arc<DaemonState>) -> alarmsweet_core::error::Result<()>
where
    S: AsyncRead + AsyncWrite,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64)
            .read_line(&mut line)
            .await;

        let n = match read {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if is_disconnect(&e) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if !line.ends_with('\n') {
            if n >= MAX_LINE_BYTES {
                return Err(Error::Protocol(format!(
                    "command line exceeds {} bytes",
                    MAX_LINE_BYTES
                )));
            }
            debug!("Dropping partial line at end of stream: {:?}", line);
            return Ok(());
        }

        let raw = line.trim_end_matches(['\r', '\n']);
        state.commands.push(raw.trim());

        match writer.write_all(echo_line(raw).as_bytes()).await {
            Ok(()) => {}
            Err(e) if is_disconnect(&e) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}
