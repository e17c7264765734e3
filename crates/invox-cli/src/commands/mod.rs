//! CLI commands.

pub mod config;
pub mod ingest;
pub mod records;
pub mod sync;

use invox_core::ContentHash;

/// Clap value parser for content hash arguments.
pub fn parse_hash(s: &str) -> Result<ContentHash, String> {
    ContentHash::parse(s).ok_or_else(|| format!("not a SHA-256 hex digest: {}", s))
}
