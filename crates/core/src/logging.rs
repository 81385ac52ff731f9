//! Tracing subscriber setup for binaries.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "notekit=info,nk_core=info";
const VERBOSE_FILTER: &str = "notekit=debug,nk_core=debug,info";

/// Install a compact stderr subscriber.
///
/// `RUST_LOG` wins over both defaults. With `verbose` the default filter
/// is raised to debug and span close events are logged with their timing.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), TryInitError> {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let span_events = if verbose { FmtSpan::CLOSE } else { FmtSpan::NONE };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_span_events(span_events)
                .compact(),
        )
        .try_init()
}
