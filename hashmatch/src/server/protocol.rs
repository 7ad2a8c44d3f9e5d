//! Line protocol: command parsing and response encoding
//!
//! ```text
//! match <hash:hex64> <max_distance:u8>   ->  "<owner> <distance>\n"*  ["truncated <total>\n"]
//! add <owner:u64> <hash:hex64>           ->  "Inserted OK\n" | "Failed to insert: <reason>\n"
//! stats                                  ->  "<key> <value>\n"*
//! ```

use std::fmt::Write;

use crate::query::{Match, QueryParams};
use crate::stats::StatsSnapshot;
use crate::{HashMatchError, Result};

pub const INSERTED_OK: &str = "Inserted OK\n";

/// A parsed client command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Match(QueryParams),
    Add { owner_id: u64, hash: u64 },
    Stats,
}

impl Command {
    /// Parse one line (without its terminating newline)
    pub fn parse(line: &str) -> Result<Command> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let mut tokens = line.split_ascii_whitespace();
        let verb = tokens
            .next()
            .ok_or_else(|| HashMatchError::Protocol("empty line".to_string()))?;

        let command = match verb {
            "match" => {
                let hash = parse_hex64(next_token(&mut tokens, "hash")?)?;
                let max_distance = parse_distance(next_token(&mut tokens, "max distance")?)?;
                Command::Match(QueryParams::new(hash, max_distance))
            }
            "add" => {
                let owner_id = parse_dec_u64(next_token(&mut tokens, "owner id")?)?;
                let hash = parse_hex64(next_token(&mut tokens, "hash")?)?;
                Command::Add { owner_id, hash }
            }
            "stats" => Command::Stats,
            other => {
                return Err(HashMatchError::Protocol(format!("unknown command '{}'", other)));
            }
        };

        if let Some(extra) = tokens.next() {
            return Err(HashMatchError::Protocol(format!("unexpected token '{}'", extra)));
        }
        Ok(command)
    }
}

fn next_token<'a>(tokens: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<&'a str> {
    tokens
        .next()
        .ok_or_else(|| HashMatchError::Protocol(format!("missing {}", what)))
}

/// 1-16 hex digits, optional 0x prefix
pub fn parse_hex64(token: &str) -> Result<u64> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty() || digits.len() > 16 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(HashMatchError::Protocol(format!("invalid hex hash '{}'", token)));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| HashMatchError::Protocol(format!("invalid hex hash '{}': {}", token, e)))
}

pub fn parse_dec_u64(token: &str) -> Result<u64> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(HashMatchError::Protocol(format!("invalid decimal '{}'", token)));
    }
    token
        .parse()
        .map_err(|e| HashMatchError::Protocol(format!("invalid decimal '{}': {}", token, e)))
}

/// Decimal 0..=255; anything above 64 simply matches everything
pub fn parse_distance(token: &str) -> Result<u8> {
    let value = parse_dec_u64(token)?;
    u8::try_from(value)
        .map_err(|_| HashMatchError::Protocol(format!("max distance {} out of range", value)))
}

// ============================================================================
// Response encoding
// ============================================================================

pub fn encode_match(out: &mut String, m: &Match) {
    let _ = writeln!(out, "{} {}", m.owner_id, m.distance);
}

pub fn encode_truncated(out: &mut String, total_matches: u64) {
    let _ = writeln!(out, "truncated {}", total_matches);
}

pub fn encode_insert_failure(out: &mut String, reason: &dyn std::fmt::Display) {
    let _ = writeln!(out, "Failed to insert: {}", reason);
}

pub fn encode_stats(out: &mut String, stats: &StatsSnapshot) {
    let _ = writeln!(out, "shards {}", stats.shard_count());
    let _ = writeln!(out, "entries {}", stats.total_entries);
    for (i, len) in stats.shard_sizes.iter().enumerate() {
        let _ = writeln!(out, "shard {} {}", i, len);
    }
    let _ = writeln!(out, "inserts {}", stats.inserts);
    let _ = writeln!(out, "queries {}", stats.queries);
    let _ = writeln!(out, "matches {}", stats.matches_returned);
    let _ = writeln!(out, "truncated {}", stats.truncated_queries);
    let _ = writeln!(out, "invalid {}", stats.invalid_lines);
}
