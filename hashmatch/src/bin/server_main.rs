//! hashmatch fingerprint server
//!
//! Usage:
//!   hashmatch-server -c NUM_CORES [--socket /tmp/searcher.sock]
//!
//! Then connect to the socket and send newline-terminated commands:
//!   match <hash_hex64> <max_distance_u8>
//!   add <owner_id_u64> <hash_hex64>
//!   stats

use std::path::PathBuf;
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::Parser;

use hashmatch::engine::DEFAULT_MAX_RESULTS;
use hashmatch::server::{
    self, ServerConfig, DEFAULT_BACKLOG, DEFAULT_MAX_LINE_LEN, DEFAULT_SOCKET_PATH,
};
use hashmatch::{EngineConfig, HashMatcher, PlacementPolicy};

/// Exit code for unusable command-line arguments
const EXIT_BAD_ARGS: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "hashmatch-server")]
#[command(about = "In-memory Hamming-distance matcher for 64-bit fingerprints")]
#[command(version)]
struct Args {
    /// Number of shards and scan threads
    #[arg(short = 'c', long = "cores", value_parser = clap::value_parser!(u32).range(1..))]
    cores: u32,

    /// Unix socket path to listen on
    #[arg(short, long, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    /// Pending connection queue depth
    #[arg(long, default_value_t = DEFAULT_BACKLOG)]
    backlog: u32,

    /// Maximum matches buffered and returned per query, across all shards (0 = unlimited)
    #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
    max_results: usize,

    /// Maximum command line length in bytes
    #[arg(long = "max-line", default_value_t = DEFAULT_MAX_LINE_LEN)]
    max_line: usize,

    /// How new fingerprints are assigned to shards
    #[arg(long, value_enum, default_value_t = PlacementPolicy::LeastLoaded)]
    placement: PlacementPolicy,

    /// Do not acknowledge add commands
    #[arg(long)]
    no_ack: bool,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                std::process::exit(EXIT_BAD_ARGS);
            }
        },
    };

    let engine_config = EngineConfig {
        workers: args.cores as usize,
        placement: args.placement,
        max_results: args.max_results,
    };
    let server_config = ServerConfig {
        socket_path: args.socket,
        backlog: args.backlog,
        max_line_len: args.max_line,
        ack_inserts: !args.no_ack,
    };

    let engine = match HashMatcher::new(engine_config) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            eprintln!("Startup error: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    if let Err(e) = server::start_server(engine, server_config).await {
        eprintln!("Server error: {}", e);
        std::process::exit(e.exit_code());
    }
}
