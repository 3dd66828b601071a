//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::constants::LOG_ENV_VAR;

static INIT: Once = Once::new();

/// Initialize the fixloop tracing/logging system.
///
/// Reads `FIXLOOP_LOG` for per-subsystem levels, e.g.
/// `FIXLOOP_LOG=fixloop_analysis=debug,fixloop_storage=warn`.
/// Falls back to `fixloop=info` when unset or invalid.
///
/// Idempotent; later calls are no-ops.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new("fixloop=info"));

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter)
            .try_init();
    });
}
