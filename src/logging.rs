//! Tracing subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "unum=info";

/// Builds the filter from `directive`, then `RUST_LOG`, then the default.
pub fn filter(directive: Option<&str>) -> EnvFilter {
    match directive {
        Some(d) => EnvFilter::try_new(d).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    }
}

/// Installs the global subscriber, writing to stderr. Later calls are no-ops.
pub fn init(directive: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(directive))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_directive_wins() {
        assert_eq!(filter(Some("unum=debug")).to_string(), "unum=debug");
    }

    #[test]
    fn invalid_directive_falls_back_to_default() {
        assert_eq!(filter(Some("unum=loudest")).to_string(), DEFAULT_FILTER);
    }

    #[test]
    fn init_twice_does_not_panic() {
        init(Some("warn"));
        init(Some("warn"));
    }
}
