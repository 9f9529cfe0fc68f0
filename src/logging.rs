use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "geopick.log";

// Connection pool chatter from every Nominatim call drowns the picker's own events.
const DEFAULT_DIRECTIVES: &str = "info,hyper=warn,reqwest=warn";

/// Routes tracing output to a daily `geopick.log` under `dir`. The terminal
/// belongs to the UI, so nothing is written to stdout. Keep the guard alive
/// until exit.
pub fn initialize_logging(dir: impl AsRef<Path>) -> WorkerGuard {
    let dir = dir.as_ref();
    let _ = std::fs::create_dir_all(dir);

    let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::registry()
        .with(env_filter(directives.as_deref()))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::info!("Logging to {}", dir.join(LOG_FILE).display());
    if let Some(bad) = directives.filter(|d| EnvFilter::try_new(d).is_err()) {
        tracing::warn!("Ignoring unparsable {}={:?}", EnvFilter::DEFAULT_ENV, bad);
    }
    guard
}

/// `RUST_LOG` when it parses, the quiet default otherwise.
fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn defaults_to_info() {
        assert_eq!(env_filter(None).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn honours_valid_directives() {
        let filter = env_filter(Some("geopick=debug"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn unparsable_directives_fall_back() {
        let filter = env_filter(Some("geopick=loudest"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }
}
