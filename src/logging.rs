//! Timestamped logging with source locations and ANSI colour support.
//!
//! Provides the [`dlog!`] macro for consistent log output in the format:
//!
//! ```text
//! 20260828T09:14:02.000 - src/web/handlers/friends.rs:42 - friend-request: sent to u-9f3ab21
//! ```
//!
//! When stderr is a terminal, timestamps and source locations are dimmed
//! and user/note ids get a consistent colour derived from their content,
//! so the same id is always the same colour within a session.

use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};

static COLOUR_ENABLED: AtomicBool = AtomicBool::new(false);

/// Initialize the logging system. Call once at startup before any logging.
/// Detects whether stderr supports ANSI colours.
pub fn init() {
    let is_terminal = std::io::stderr().is_terminal();
    COLOUR_ENABLED.store(is_terminal, Ordering::Relaxed);
}

/// Returns whether ANSI colour output is enabled.
pub fn colour_enabled() -> bool {
    COLOUR_ENABLED.load(Ordering::Relaxed)
}

// ANSI escape codes
const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

const ID_COLOURS: &[&str] = &[
    "\x1b[91m", // bright red
    "\x1b[92m", // bright green
    "\x1b[93m", // bright yellow
    "\x1b[94m", // bright blue
    "\x1b[95m", // bright magenta
    "\x1b[96m", // bright cyan
    "\x1b[31m", // red
    "\x1b[32m", // green
    "\x1b[33m", // yellow
    "\x1b[34m", // blue
    "\x1b[35m", // magenta
    "\x1b[36m", // cyan
];

/// Pick a deterministic colour for the given string.
fn hash_colour(id: &str) -> &'static str {
    let hash: u32 = id
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    ID_COLOURS[(hash as usize) % ID_COLOURS.len()]
}

const LOG_ID_TRUNCATE_LEN: usize = 7;

fn truncate_id(id: &str) -> &str {
    let end = id
        .char_indices()
        .nth(LOG_ID_TRUNCATE_LEN)
        .map(|(i, _)| i)
        .unwrap_or(id.len());
    &id[..end]
}

/// Format a user id with consistent colour and truncation, e.g. `u-9f3ab21`.
pub fn user_id(id: &str) -> String {
    let short = truncate_id(id);
    if colour_enabled() {
        let colour = hash_colour(id);
        format!("{colour}u-{short}{RESET}")
    } else {
        format!("u-{short}")
    }
}

/// Format a note id with consistent colour and truncation, e.g. `n-41c09de`.
pub fn note_id(id: &str) -> String {
    let short = truncate_id(id);
    if colour_enabled() {
        let colour = hash_colour(id);
        format!("{colour}n-{short}{RESET}")
    } else {
        format!("n-{short}")
    }
}

/// Write a single log line to stderr.
///
/// Called by the [`dlog!`] macro; not intended for direct use.
pub fn emit(file: &str, line: u32, msg: &str) {
    let ts = chrono::Utc::now().format("%Y%m%dT%H:%M:%S%.3f");
    if colour_enabled() {
        eprintln!("{DIM}{ts}{RESET} {DIM}{file}:{line}{RESET} {msg}");
    } else {
        eprintln!("{ts} - {file}:{line} - {msg}");
    }
}

/// Emit a log line to stderr with timestamp and source location.
///
/// # Usage
///
/// ```ignore
/// dlog!("share: note {} granted to {}", logging::note_id(&nid), logging::user_id(&uid));
/// ```
#[macro_export]
macro_rules! dlog {
    ($($arg:tt)*) => {{
        $crate::logging::emit(file!(), line!(), &format!($($arg)*));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_truncated_and_prefixed() {
        assert_eq!(user_id("0123456789abcdef"), "u-0123456");
        assert_eq!(note_id("abc"), "n-abc");
    }

    #[test]
    fn colour_is_deterministic() {
        assert_eq!(hash_colour("alice"), hash_colour("alice"));
    }
}
