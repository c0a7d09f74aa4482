//! Logging infrastructure for sanecore.
//!
//! Built on `env_logger`/`log` rather than a hand-rolled `log::Log`
//! implementation, since the crate runs hosted. Verbosity is controlled
//! by `SANE_DEBUG_<BACKEND>` (spec §6.4), an integer matching the SANE
//! convention used across every backend in the family rather than the
//! usual `RUST_LOG` filter string.

use log::LevelFilter;

/// Map a SANE-style integer verbosity to a `log::LevelFilter`:
/// 0 disables logging, 1 errors only, up through 5+ trace (spec §6.4).
pub fn level_from_sane_debug(value: i64) -> LevelFilter {
    match value {
        i64::MIN..=0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Read `SANE_DEBUG_<BACKEND>` (backend name upper-cased) and initialize
/// `env_logger` at the corresponding level. Falls back to `Warn` if the
/// variable is unset or unparsable.
pub fn init(backend_name: &str) {
    let var = format!("SANE_DEBUG_{}", backend_name.to_uppercase());
    let level = std::env::var(&var)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .map(level_from_sane_debug)
        .unwrap_or(LevelFilter::Warn);

    let _ = env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_millis()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_sane_debug_levels() {
        assert_eq!(level_from_sane_debug(0), LevelFilter::Off);
        assert_eq!(level_from_sane_debug(1), LevelFilter::Error);
        assert_eq!(level_from_sane_debug(3), LevelFilter::Info);
        assert_eq!(level_from_sane_debug(9), LevelFilter::Trace);
        assert_eq!(level_from_sane_debug(-5), LevelFilter::Off);
    }
}
