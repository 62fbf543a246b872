//! Log output setup
//!
//! Filter with `SPORTSHOT_LOG` using the usual `EnvFilter` syntax, e.g.
//! `SPORTSHOT_LOG=sportshot=debug`.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "SPORTSHOT_LOG";
const DEFAULT_FILTER: &str = "sportshot=info,warn";

/// Install the global subscriber; later calls are no-ops
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
