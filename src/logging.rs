//! Structured logging setup.
//!
//! Pipeline stages log structured fields (chunk counts, retrieval hits,
//! provider statuses) through `tracing`. Stdout gets a compact formatter;
//! setting `RAGSERVE_LOG_FILE` appends a second, ANSI-free copy to that path
//! through a non-blocking writer so disk writes never stall a request.

use std::fs::OpenOptions;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Keeps the non-blocking writer flushing for the process lifetime.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Default filter when `RUST_LOG` is unset: the service at `info`, with the
/// HTTP client internals kept quiet so provider calls don't flood the log.
const DEFAULT_DIRECTIVES: &str = "info,hyper=warn,reqwest=warn";

/// Install the process-wide tracing subscriber.
///
/// `RUST_LOG` overrides [`DEFAULT_DIRECTIVES`]. File logging is opt-in via
/// `RAGSERVE_LOG_FILE`; when the file cannot be opened the service still
/// starts and says so on stderr, since losing a log copy should not take
/// down the HTTP surface.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let file_layer = std::env::var("RAGSERVE_LOG_FILE").ok().and_then(|path| {
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(err) => {
                eprintln!("Failed to open log file {path}: {err}");
                return None;
            }
        };
        let (writer, guard) = tracing_appender::non_blocking(file);
        let _ = FILE_GUARD.set(guard);
        Some(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact(),
        )
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .with(file_layer)
        .init();
}
