//! Tracing subscriber setup.

use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::error::{RollTrackerError, Result};

/// Dependencies that log far too much at `info`.
const QUIET_DIRECTIVES: [&str; 4] = ["serenity=warn", "tungstenite=warn", "h2=warn", "hyper=warn"];

/// Build the filter: `RUST_LOG` when set, otherwise `level`, with the noisy
/// dependencies capped at `warn`.
fn build_filter(level: &str) -> EnvFilter {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    for directive in QUIET_DIRECTIVES {
        if let Ok(parsed) = directive.parse::<Directive>() {
            filter = filter.add_directive(parsed);
        }
    }

    filter
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init(level: &str) -> Result<()> {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_level(true)
        .with_target(true)
        .with_writer(std::io::stdout);

    Registry::default()
        .with(build_filter(level))
        .with(stdout_layer)
        .try_init()
        .map_err(|e| RollTrackerError::Config(format!("Failed to initialize logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_keeps_quiet_directives() {
        let rendered = build_filter("debug").to_string();
        for directive in QUIET_DIRECTIVES {
            assert!(rendered.contains(directive), "missing {} in {}", directive, rendered);
        }
    }
}
