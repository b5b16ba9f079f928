// ── Runtime log level ──
//
// The subscriber lives in the binary; core only needs to ask it to
// change level when the hub sends `cmd.log.set_level`.

use tracing::level_filters::LevelFilter;

use crate::error::CoreError;

/// Adjusts the active `tracing` filter.
pub trait LogLevelControl: Send + Sync {
    fn set_level(&self, level: LevelFilter) -> Result<(), CoreError>;
}

/// Parse a level name as sent by the hub. Accepts the `tracing` names
/// plus the `warning`/`fatal`/`panic` spellings older hub UIs still use.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_ascii_lowercase().as_str() {
        "warning" => Some(LevelFilter::WARN),
        "fatal" | "panic" => Some(LevelFilter::ERROR),
        other => other.parse().ok(),
    }
}

/// Lowercase name of a level filter (`"info"`, `"off"`, ...).
pub fn level_name(level: LevelFilter) -> String {
    level.to_string().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hub_level_names() {
        assert_eq!(parse_level("debug"), Some(LevelFilter::DEBUG));
        assert_eq!(parse_level(" INFO "), Some(LevelFilter::INFO));
        assert_eq!(parse_level("warning"), Some(LevelFilter::WARN));
        assert_eq!(parse_level("fatal"), Some(LevelFilter::ERROR));
        assert_eq!(parse_level("off"), Some(LevelFilter::OFF));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn level_names_are_lowercase() {
        assert_eq!(level_name(LevelFilter::TRACE), "trace");
        assert_eq!(level_name(LevelFilter::OFF), "off");
    }
}
