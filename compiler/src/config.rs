// config.rs — Process-wide settings
//
// The only ambient setting is the auxiliary tracing verbosity, read once from
// the `PBIND_DEBUG` environment variable and cached for the process lifetime.
//
// Failure modes: unparsable values are treated as 0.
// Side effects: reads the environment on first access.

use std::sync::OnceLock;

use tracing::level_filters::LevelFilter;

/// Environment variable holding the verbosity integer.
pub const DEBUG_ENV_VAR: &str = "PBIND_DEBUG";

/// Verbosity: 0 prints warnings only, 1 adds major events, 2 adds detail,
/// 3 traces everything.
pub fn debug_level() -> u32 {
    static LEVEL: OnceLock<u32> = OnceLock::new();
    *LEVEL.get_or_init(|| parse_level(std::env::var(DEBUG_ENV_VAR).ok().as_deref()))
}

fn parse_level(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}

/// Map a verbosity integer onto a `tracing` filter.
pub fn level_filter(level: u32) -> LevelFilter {
    match level {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}
