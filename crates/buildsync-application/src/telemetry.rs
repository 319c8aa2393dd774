use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` applies to the buildsync
/// crates and everything else logs at `warn`. Safe to call more than once.
pub fn init_tracing(level: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
    });
}

fn default_directives(level: &str) -> String {
    format!(
        "warn,buildsync_core={level},buildsync_infrastructure={level},buildsync_application={level}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_scope_level_to_workspace_crates() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("buildsync_application=debug"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing("info");
        init_tracing("trace");
    }
}
