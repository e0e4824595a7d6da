//! Logger bootstrap shared by programs embedding zpull.

use env_logger::{Builder, Env};

/// Initialise `env_logger`, honouring `RUST_LOG` and falling back to `default_level`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(default_level: &str) {
    let _ = Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init();
}
