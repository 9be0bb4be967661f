use log::{info, log_enabled, Level};

/// Initializes the logger with the `env_logger` crate.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logger() {
    let _ = env_logger::try_init();
}

/// Initializes the logger with a default filter when `RUST_LOG` is unset.
///
/// # Examples
/// ```rust,no_run
/// use rfm69_link::logging::init_logger_with_default;
///
/// init_logger_with_default("info");
/// log::info!("radio up");
/// ```
pub fn init_logger_with_default(filter: &str) {
    let env = env_logger::Env::default().default_filter_or(filter);
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}
