use std::io;
use std::sync::Once;

use ::tracing::subscriber::{SetGlobalDefaultError, set_global_default};
use config::Environment;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_log::log::SetLoggerError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Env variable that turns on log output in tests.
const ENABLE_TEST_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

static INIT_TEST_TRACING: Once = Once::new();

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to determine the runtime environment: {0}")]
    Environment(#[source] io::Error),

    #[error("failed to redirect `log` records into tracing: {0}")]
    LogTracer(#[from] SetLoggerError),

    #[error("failed to install the global tracing subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Keeps the non-blocking log writer alive.
///
/// Buffered log lines are flushed when this value is dropped, so it must be held until the
/// process exits.
#[must_use = "dropping the flusher stops log output"]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Installs the global subscriber for a relay process.
///
/// Logs are written to stdout through a non-blocking writer. In [`Environment::Prod`] every
/// line is a JSON object carrying the current span; in [`Environment::Dev`] lines are
/// human-readable. `RUST_LOG` overrides the default `<app_name>=info,relay=info` filter.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    let environment = Environment::load().map_err(TracingError::Environment)?;

    LogTracer::init()?;

    let (writer, guard) = tracing_appender::non_blocking(io::stdout());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{app_name}=info,relay=info")));

    match environment {
        Environment::Prod => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(writer),
            );
            set_global_default(subscriber)?;
        }
        Environment::Dev => {
            let subscriber = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty().with_writer(writer));
            set_global_default(subscriber)?;
        }
    }

    Ok(LogFlusher { _guard: guard })
}

/// Installs a test subscriber once per process when `ENABLE_TRACING` is set.
///
/// Safe to call at the start of every test.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var(ENABLE_TEST_TRACING_ENV_NAME).is_err() {
            return;
        }

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("relay=debug"));
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer());

        // Another test harness may already own the global subscriber.
        let _ = set_global_default(subscriber);
    });
}
