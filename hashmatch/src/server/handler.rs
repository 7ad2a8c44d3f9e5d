//! Connection handler for the line protocol
//!
//! Reads newline-terminated commands from one client, dispatches them to the
//! matcher and writes the replies. Runs until the client closes, an I/O error
//! occurs, or a line exceeds the configured length.

use std::io;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

use super::protocol::{self, Command};
use crate::engine::HashMatcher;
use crate::query::QueryParams;
use crate::{HashMatchError, Result};

/// Per-session counters, logged when the connection closes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub commands: u64,
    pub invalid: u64,
}

/// Protocol handler shared by all sessions of one server
pub struct ConnectionHandler {
    engine: Arc<HashMatcher>,
    max_line_len: usize,
    ack_inserts: bool,
}

impl ConnectionHandler {
    pub fn new(engine: Arc<HashMatcher>, max_line_len: usize, ack_inserts: bool) -> Self {
        Self {
            engine,
            max_line_len: max_line_len.max(1),
            ack_inserts,
        }
    }

    /// Serve one connection to completion
    pub async fn run<S>(&self, stream: S) -> Result<SessionSummary>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut reader, writer) = tokio::io::split(stream);
        let mut writer = BufWriter::new(writer);
        let mut buf = BytesMut::with_capacity(self.max_line_len);
        let mut chunk = vec![0u8; self.max_line_len];
        let mut summary = SessionSummary::default();

        loop {
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line = buf.split_to(pos + 1);
                summary.commands += 1;
                if !self.dispatch(&line[..pos], &mut writer).await? {
                    summary.invalid += 1;
                }
            }
            writer.flush().await?;

            if buf.len() >= self.max_line_len {
                return Err(HashMatchError::LineTooLong(self.max_line_len));
            }

            let room = self.max_line_len - buf.len();
            let n = reader.read(&mut chunk[..room]).await?;
            if n == 0 {
                if !buf.is_empty() {
                    log::debug!("Discarding {} bytes of unterminated input", buf.len());
                }
                return Ok(summary);
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Execute one line. Returns false if the line was not a valid command.
    async fn dispatch<W>(&self, raw: &[u8], out: &mut W) -> Result<bool>
    where
        W: AsyncWrite + Unpin,
    {
        let parsed = std::str::from_utf8(raw)
            .map_err(|_| HashMatchError::Protocol("line is not valid UTF-8".to_string()))
            .and_then(Command::parse);

        let command = match parsed {
            Ok(command) => command,
            Err(e) => {
                log::warn!("Invalid command received: {}", e);
                self.engine.record_invalid_line();
                return Ok(false);
            }
        };

        match command {
            Command::Match(params) => self.handle_match(params, out).await?,
            Command::Add { owner_id, hash } => self.handle_add(owner_id, hash, out).await?,
            Command::Stats => {
                let mut text = String::new();
                protocol::encode_stats(&mut text, &self.engine.stats());
                out.write_all(text.as_bytes()).await?;
            }
        }
        Ok(true)
    }

    async fn handle_match<W>(&self, params: QueryParams, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        log::debug!(
            "Will search for {:x} (max distance {})",
            params.hash,
            params.max_distance
        );

        // The scan is CPU bound; keep it off the I/O thread
        let engine = Arc::clone(&self.engine);
        let outcome = tokio::task::spawn_blocking(move || engine.search(params))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        let mut line = String::with_capacity(32);
        for m in &outcome.matches {
            line.clear();
            protocol::encode_match(&mut line, m);
            out.write_all(line.as_bytes()).await?;
        }
        if outcome.truncated {
            line.clear();
            protocol::encode_truncated(&mut line, outcome.total_matches);
            out.write_all(line.as_bytes()).await?;
        }
        Ok(())
    }

    async fn handle_add<W>(&self, owner_id: u64, hash: u64, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        log::debug!("Will add {} 0x{:X}", owner_id, hash);

        match self.engine.add(owner_id, hash) {
            Ok(_) => {
                if self.ack_inserts {
                    out.write_all(protocol::INSERTED_OK.as_bytes()).await?;
                }
            }
            Err(e) => {
                log::error!("Failed to insert {} 0x{:X}: {}", owner_id, hash, e);
                if self.ack_inserts {
                    let mut line = String::new();
                    protocol::encode_insert_failure(&mut line, &e);
                    out.write_all(line.as_bytes()).await?;
                }
            }
        }
        Ok(())
    }
}
