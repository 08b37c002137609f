//! Tracing subscriber setup

use crate::common::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber: `RUST_LOG` wins, otherwise `config.log_level`.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_tracing(config: &Config) -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = Config::default();
        let _ = init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
