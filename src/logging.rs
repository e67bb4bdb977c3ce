//! Logger bootstrap for the binary and tests.
use env_logger::{Builder, Env};
use log::LevelFilter;

/// Initializes the global logger.
///
/// When `verbose` is `true`, debug messages (rejected connections, chain
/// validity checks) are printed. Otherwise only info level and above are
/// shown. `RUST_LOG` takes precedence over both.
pub fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let env = Env::default().default_filter_or(level.to_string());
    let mut builder = Builder::from_env(env);
    builder.format_timestamp(None);

    // `try_init` only fails if a logger was already set; tests call `init`
    // repeatedly.
    if builder.try_init().is_err() {
        log::debug!("logger already initialised; keeping the existing one");
    }
}
