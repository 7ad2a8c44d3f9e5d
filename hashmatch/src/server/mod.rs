//! Unix socket server for the fingerprint matcher
//!
//! Binds one filesystem socket and serves clients strictly one at a time:
//! accept, run the line protocol until the client goes away, close, repeat.
//! Further clients wait in the listen backlog.

mod handler;
pub mod protocol;

pub use handler::{ConnectionHandler, SessionSummary};

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{UnixListener, UnixSocket};

use crate::engine::HashMatcher;
use crate::{HashMatchError, Result};

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/searcher.sock";
pub const DEFAULT_BACKLOG: u32 = 10;
pub const DEFAULT_MAX_LINE_LEN: usize = 1024;

/// Pause after a failed accept before retrying
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Filesystem path of the listening socket
    pub socket_path: PathBuf,
    /// Pending connection queue depth
    pub backlog: u32,
    /// Longest accepted command line, newline included
    pub max_line_len: usize,
    /// Reply "Inserted OK" to add commands
    pub ack_inserts: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            backlog: DEFAULT_BACKLOG,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            ack_inserts: true,
        }
    }
}

/// Create, bind and listen on the configured socket path.
///
/// A stale socket file from a previous run is removed first.
pub fn bind_listener(config: &ServerConfig) -> Result<UnixListener> {
    let path_str = config.socket_path.display().to_string();

    match std::fs::remove_file(&config.socket_path) {
        Ok(()) => log::debug!("Removed stale socket {}", path_str),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(HashMatchError::Bind {
                path: path_str,
                source: e,
            })
        }
    }

    let socket = UnixSocket::new_stream().map_err(HashMatchError::SocketCreate)?;
    socket
        .bind(&config.socket_path)
        .map_err(|e| HashMatchError::Bind {
            path: path_str,
            source: e,
        })?;
    socket.listen(config.backlog).map_err(HashMatchError::Listen)
}

/// Accept and serve connections one at a time until `shutdown` resolves
pub async fn serve<F>(
    listener: UnixListener,
    engine: Arc<HashMatcher>,
    config: &ServerConfig,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let handler = ConnectionHandler::new(engine, config.max_line_len, config.ack_inserts);
    tokio::pin!(shutdown);

    loop {
        log::info!("Waiting for a connection.");
        let stream = tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, _)) => stream,
                Err(e) => {
                    log::error!("Accept error: {:?}", e);
                    // Persistent failures (e.g. EMFILE) would otherwise spin
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
            },
            _ = &mut shutdown => break,
        };

        log::info!("Connection established, waiting for commands.");
        tokio::select! {
            result = handler.run(stream) => match result {
                Ok(summary) => log::info!(
                    "Connection closed ({} commands, {} invalid).",
                    summary.commands,
                    summary.invalid
                ),
                Err(HashMatchError::LineTooLong(limit)) => {
                    log::error!("Command too long (over {} bytes), closing connection.", limit)
                }
                Err(e) => log::error!("Error serving client: {}", e),
            },
            _ = &mut shutdown => break,
        }
    }

    Ok(())
}

/// Bind the socket and serve until Ctrl-C
pub async fn start_server(engine: Arc<HashMatcher>, config: ServerConfig) -> Result<()> {
    let listener = bind_listener(&config)?;

    log::info!("hashmatch listening on {}", config.socket_path.display());
    println!("hashmatch fingerprint server");
    println!("  Socket:      {}", config.socket_path.display());
    println!("  Shards:      {}", engine.shard_count());
    println!("  Placement:   {}", engine.config().placement);
    println!("  Max results: {}", engine.config().max_results);

    let result = serve(listener, engine, &config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;

    println!("\nShutting down hashmatch server...");
    if let Err(e) = std::fs::remove_file(&config.socket_path) {
        log::warn!("Couldn't remove socket {}: {}", config.socket_path.display(), e);
    }
    result
}
