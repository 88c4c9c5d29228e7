use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Map a logrus-style level (as sent by the host) to a tracing filter.
pub fn level_filter(log_level: u8) -> LevelFilter {
    match log_level {
        0..=2 => LevelFilter::ERROR,
        3 => LevelFilter::WARN,
        4 => LevelFilter::INFO,
        5 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install a stderr subscriber. `RUST_LOG` wins over `log_level`.
///
/// Does nothing if a global subscriber is already set.
pub fn init(log_level: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_filter(log_level).to_string()));

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}
