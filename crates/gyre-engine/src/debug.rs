//! Diagnostic tracing
//!
//! Resolution and conversion decisions are traced through `tracing` only when
//! the process-wide debug flag is on. The flag starts from `GYRE_DEBUG` and
//! can be flipped at any time with [`set_debug`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

use once_cell::sync::Lazy;
use tracing_subscriber::{fmt, EnvFilter};

use crate::options::{env_flag, DEBUG_ENV, DEFAULT_LOG_FILTER};

static DEBUG: Lazy<AtomicBool> = Lazy::new(|| AtomicBool::new(env_flag(DEBUG_ENV, false)));

static INIT: Once = Once::new();

/// Whether diagnostic tracing is on
#[inline]
pub fn debug_enabled() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

/// Turn diagnostic tracing on or off, returning the previous state
pub fn set_debug(enabled: bool) -> bool {
    DEBUG.swap(enabled, Ordering::Relaxed)
}

/// Install a formatting subscriber once per process.
///
/// The filter comes from `RUST_LOG` and falls back to warnings only. Does
/// nothing if the embedding application already installed a subscriber.
pub fn init_logging() {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

        if let Err(e) = fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .try_init()
        {
            tracing::debug!(error = %e, "subscriber already set, keeping it");
        }
    });
}

/// `tracing::debug!` gated by the bridge debug flag.
#[macro_export]
macro_rules! bridge_trace {
    ($($arg:tt)*) => {
        if $crate::debug::debug_enabled() {
            ::tracing::debug!($($arg)*);
        }
    };
}
