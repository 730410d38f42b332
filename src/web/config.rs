//! Configuration types and constants for the daybook server.

use std::path::PathBuf;

use clap::Parser;

/// Maximum image upload size accepted by `POST /api/notes/:note/images`.
pub(crate) const MAX_IMAGE_SIZE: u64 = 10 * 1024 * 1024; // 10 MiB

/// Maximum results returned by the user search endpoint.
pub(crate) const SEARCH_LIMIT: u32 = 10;

/// Minimum query length for user search; shorter terms return nothing.
pub(crate) const SEARCH_MIN_CHARS: usize = 2;

/// Session cookie name.
pub(crate) const SESSION_COOKIE: &str = "session_id";

/// Shared daily-journal server.
///
/// Serves a REST API for per-date notes made of ordered text blocks,
/// todos and images, with a friend graph and per-note sharing.
/// Persists everything in SQLite.
///
/// Configuration can be set via CLI arguments or environment variables.
/// CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(name = "daybook", version, about)]
pub struct Cli {
    /// HTTP server bind address [env: DAYBOOK_BIND] [default: 127.0.0.1:3000]
    #[arg(long, short = 'b')]
    pub bind: Option<String>,

    /// Data directory for the database and images [env: DAYBOOK_HOME] [default: ~/.daybook]
    #[arg(long, short = 'd')]
    pub data_dir: Option<PathBuf>,
}

pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_cli_and_env(cli: Cli) -> Self {
        let data_dir = cli
            .data_dir
            .or_else(|| std::env::var("DAYBOOK_HOME").ok().map(PathBuf::from))
            .unwrap_or_else(|| {
                std::env::var("HOME")
                    .map(|h| PathBuf::from(h).join(".daybook"))
                    .unwrap_or_else(|_| PathBuf::from(".daybook"))
            });

        let bind_addr = cli
            .bind
            .or_else(|| std::env::var("DAYBOOK_BIND").ok())
            .unwrap_or_else(|| "127.0.0.1:3000".to_string());

        Self {
            bind_addr,
            data_dir,
        }
    }
}
