use camino::Utf8PathBuf;

use crate::environment::HostEnvironment;
use crate::logging::LogFormat;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default application name reported when none is configured.
pub const DEFAULT_APPLICATION_NAME: &str = "kindling";

/// Default location of the base settings document.
pub const DEFAULT_SETTINGS_PATH: &str = "appsettings.json";

/// Base path under which the health endpoints are mounted.
pub const DEFAULT_HEALTH_BASE_PATH: &str = "/health";

/// Service namespace attached to the telemetry resource.
pub const DEFAULT_SERVICE_NAMESPACE: &str = "app.backend";

/// Environment variable consulted before the configured OTLP endpoint.
pub const DEFAULT_OTLP_ENDPOINT_VARIABLE: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Environment variable consulted before any configured Azure Monitor
/// connection string.
pub const DEFAULT_AZURE_MONITOR_CONNECTION_STRING_VARIABLE: &str =
    "APPLICATIONINSIGHTS_CONNECTION_STRING";

/// Default log filter expression used by the binary.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Logging format used when the host configuration leaves it unset.
pub fn default_log_format(environment: HostEnvironment) -> LogFormat {
    LogFormat::for_environment(environment)
}

/// Hosts start in production unless told otherwise.
pub fn default_environment() -> HostEnvironment {
    HostEnvironment::Production
}

/// Owned application name used by serde defaults.
pub fn default_application_name() -> String {
    DEFAULT_APPLICATION_NAME.to_string()
}

/// Default settings document path.
pub fn default_settings_path() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_SETTINGS_PATH)
}

pub(crate) fn default_otlp_endpoint_variable() -> String {
    DEFAULT_OTLP_ENDPOINT_VARIABLE.to_string()
}

pub(crate) fn default_azure_monitor_connection_string_variable() -> String {
    DEFAULT_AZURE_MONITOR_CONNECTION_STRING_VARIABLE.to_string()
}
