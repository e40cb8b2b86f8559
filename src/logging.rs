use crate::config::Environment;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber. `RUST_LOG` overrides the per-env
/// defaults. Signing keys, session tokens and authorization codes are never
/// logged at any level.
pub fn init_logging(env: &Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(env)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(env.is_dev())
        .with_line_number(env.is_dev());

    // Human-readable output in dev; staging and prod ship flattened JSON to
    // the log pipeline
    if env.is_dev() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.pretty())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json().flatten_event(true))
            .init();
    }

    tracing::info!(env = ?env, "Logging initialized");
}

fn default_filter(env: &Environment) -> &'static str {
    // sqlx logs full statements at info; keep it quiet outside dev
    match env {
        Environment::Dev => "portal_backend=debug,tower_http=debug,sqlx=info,info",
        Environment::Staging => "portal_backend=debug,tower_http=info,sqlx=warn,info",
        Environment::Prod => "portal_backend=info,tower_http=warn,sqlx=warn,warn",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prod_filter_quiets_dependencies() {
        let prod = default_filter(&Environment::Prod);
        assert!(prod.contains("sqlx=warn"));
        assert!(prod.starts_with("portal_backend=info"));
    }

    #[test]
    fn dev_filter_keeps_crate_verbose() {
        assert!(default_filter(&Environment::Dev).starts_with("portal_backend=debug"));
    }
}
