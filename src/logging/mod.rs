//! Logging for the gateway
//!
//! `RUST_LOG` wins over the configured level when set.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConf;

/// Directive used when `RUST_LOG` is absent
pub fn default_directive(level: &str) -> String {
    format!("yiwen_api={},info", level)
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init(conf: &LogConf) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&conf.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if conf.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_parses() {
        let directive = default_directive("debug");
        assert_eq!(directive, "yiwen_api=debug,info");
        assert!(EnvFilter::try_new(directive).is_ok());
    }
}
