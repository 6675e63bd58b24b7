//! Tracing initialization (fmt subscriber with env-filter).
//!
//! Log levels are controlled via the standard `RUST_LOG` environment variable,
//! defaulting to `info` when unset:
//!
//! ```bash
//! RUST_LOG=larder=debug,tower_http=debug larder
//! ```

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// Safe to call more than once; subsequent calls are no-ops (relevant for tests
/// where several cases may try to install a subscriber).
pub fn init_telemetry() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
