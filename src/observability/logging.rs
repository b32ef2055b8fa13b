//! Tracing subscriber setup and failure logging.

use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;
use crate::error::RelayError;

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Fails if a subscriber
/// is already installed.
pub fn init_logging(format: LogFormat, default_filter: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_current_span(true);
            subscriber.with(fmt_layer).try_init()?;
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().pretty().with_target(true);
            subscriber.with(fmt_layer).try_init()?;
        }
    }

    Ok(())
}

/// Logs a failed request with its code and internal detail.
///
/// Caller faults are warnings; service faults are errors.
pub fn record_failure(err: &RelayError, correlation_id: &str) {
    let code = err.code().as_str();
    let status = err.status().as_u16();

    if err.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            error_code = code,
            status,
            detail = %err,
            "request rejected"
        );
    } else {
        error!(
            correlation_id = %correlation_id,
            error_code = code,
            status,
            detail = %err,
            "request failed"
        );
    }
}
