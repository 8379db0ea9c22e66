//! Host log subscriber.
//!
//! The subscriber is installed once per process. Findings recorded while the
//! settings were bound only reach the log through
//! [`DiagnosticsAggregator::replay`](crate::DiagnosticsAggregator::replay), so
//! the diagnostics target is always admitted at `info` unless the configured
//! filter names it.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::Span;
use tracing_subscriber::filter::{Directive, EnvFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use kindling_config::{Config, LogFormat};

use crate::diagnostics::DIAGNOSTICS_TARGET;

const LOGGING_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::host");

static LOGGING: OnceCell<LoggingHandle> = OnceCell::new();

/// Handle returned once logging has been initialised.
#[derive(Debug, Clone)]
pub struct LoggingHandle {
    format: LogFormat,
    root: Span,
}

impl LoggingHandle {
    /// Format the subscriber writes.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }

    /// Span carrying the application name and hosting environment. Enter it
    /// for the lifetime of the host so every event is tagged with both.
    #[must_use]
    pub const fn root_span(&self) -> &Span {
        &self.root
    }
}

/// Errors encountered while configuring logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The configured filter expression did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Another global subscriber was already installed.
    #[error("failed to install log subscriber: {0}")]
    Subscriber(#[source] TryInitError),
}

/// Installs the global subscriber on first use and returns its handle.
///
/// Later calls return the handle of the first installation, whatever
/// configuration they pass.
pub fn initialise(config: &Config) -> Result<LoggingHandle, LoggingError> {
    LOGGING
        .get_or_try_init(|| install_subscriber(config))
        .cloned()
}

/// Builds the filter for `config`.
///
/// The diagnostics target is pinned to `info` so replayed findings survive a
/// terse filter such as `warn`.
pub fn filter_for(config: &Config) -> Result<EnvFilter, LoggingError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| LoggingError::Filter(error.to_string()))?;
    if config.log_filter().contains(DIAGNOSTICS_TARGET) {
        return Ok(filter);
    }
    let directive = format!("{DIAGNOSTICS_TARGET}=info")
        .parse::<Directive>()
        .map_err(|error| LoggingError::Filter(error.to_string()))?;
    Ok(filter.add_directive(directive))
}

fn install_subscriber(config: &Config) -> Result<LoggingHandle, LoggingError> {
    let filter = filter_for(config)?;
    let format = config.log_format();

    let layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(io::stderr)
        // Colour only on interactive terminals.
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());
    let layer = match format {
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(LoggingError::Subscriber)?;

    let root = tracing::info_span!(
        target: LOGGING_TARGET,
        "host",
        application = %config.application_name(),
        environment = %config.environment(),
    );
    tracing::info!(
        target: LOGGING_TARGET,
        event = "logging_initialised",
        format = %format,
        filter = %config.log_filter(),
        "log subscriber installed"
    );
    Ok(LoggingHandle { format, root })
}
