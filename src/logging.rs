//! Logging setup, powered by tracing-subscriber.
//!
//! Events go to stderr so stdout carries only results.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "warn";

/// Pick the filter directive: the command-line flag, then `RUST_LOG`, then
/// the config file, then `warn`.
pub fn resolve_directive(flag: Option<&str>, env: Option<String>, config: Option<&str>) -> String {
    flag.map(str::to_string)
        .or(env.filter(|s| !s.trim().is_empty()))
        .or(config.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}

fn build_env_filter(directive: &str) -> Result<EnvFilter> {
    // calamine and zip are noisy at debug
    let filter_str = format!("{},calamine=warn,zip=warn", directive);
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", directive, e))
}

/// Install the global subscriber.
pub fn init_logging(flag: Option<&str>, config: Option<&str>) -> Result<()> {
    let directive = resolve_directive(flag, std::env::var("RUST_LOG").ok(), config);
    let filter = build_env_filter(&directive)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_precedence() {
        assert_eq!(
            resolve_directive(Some("debug"), Some("info".into()), Some("error")),
            "debug"
        );
        assert_eq!(resolve_directive(None, Some("info".into()), Some("error")), "info");
        assert_eq!(resolve_directive(None, None, Some("error")), "error");
        assert_eq!(resolve_directive(None, Some("  ".into()), None), "warn");
    }

    #[test]
    fn test_invalid_directive() {
        assert!(build_env_filter("sheetquery=loud").is_err());
        assert!(build_env_filter("info").is_ok());
    }
}
