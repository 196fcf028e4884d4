// logging.rs - Process-wide tracing subscriber

use std::sync::OnceLock;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

static INIT_GUARD: OnceLock<bool> = OnceLock::new();

/// Install an fmt subscriber filtered by `RUST_LOG` (default `info`).
/// Later calls are no-ops; returns whether this process's subscriber is ours.
pub fn init_tracing() -> bool {
    *INIT_GUARD.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        Registry::default().with(filter).with(fmt_layer).try_init().is_ok()
    })
}
