//! hashmatch - In-memory Hamming-distance matcher for 64-bit fingerprints
//!
//! Stores (owner id, fingerprint) pairs across a fixed number of shards and
//! answers "every fingerprint within distance T of this one" by scanning all
//! shards in parallel on a persistent worker pool.

pub mod engine;
pub mod query;
pub mod scaling;
pub mod stats;
#[cfg(feature = "server")]
pub mod server;

// Re-export main types
pub use engine::{EngineConfig, HashMatcher};
pub use query::{hamming_distance, Match, QueryOutcome, QueryParams};
pub use scaling::{FingerprintEntry, PlacementPolicy, ShardId, ShardStore};
pub use stats::{EngineStats, StatsSnapshot};

/// Engine error type
#[derive(Debug, thiserror::Error)]
pub enum HashMatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(String),

    #[error("Couldn't create server socket: {0}")]
    SocketCreate(#[source] std::io::Error),

    #[error("Couldn't bind socket {path}: {source}")]
    Bind {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't listen on socket: {0}")]
    Listen(#[source] std::io::Error),

    #[error("Command too long (limit {0} bytes)")]
    LineTooLong(usize),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl HashMatchError {
    /// Process exit code for errors that abort startup
    pub fn exit_code(&self) -> i32 {
        match self {
            HashMatchError::InvalidConfig(_) => 1,
            HashMatchError::ThreadPool(_) => 2,
            HashMatchError::SocketCreate(_) => 3,
            HashMatchError::Bind { .. } => 4,
            HashMatchError::Listen(_) => 5,
            _ => 6,
        }
    }
}

pub type Result<T> = std::result::Result<T, HashMatchError>;
