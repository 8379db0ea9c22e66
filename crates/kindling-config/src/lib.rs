//! Shared configuration for the Kindling bootstrap engine.
//!
//! Two layers of configuration live here. The host [`Config`] is small and
//! flat: it names the hosting environment, the log filter and format, and the
//! location of the settings document. It is loaded with `ortho_config`, so
//! defaults, configuration files, `KINDLING_*` environment variables and CLI
//! flags are merged with the usual precedence.
//!
//! The settings document is the declarative description of the service
//! itself. It is read into a [`ConfigurationTree`], a read-only view with
//! case-insensitive, path-style key lookup, and typed option sections such as
//! [`TelemetryOptions`] are bound from it on demand.

mod defaults;
mod environment;
mod logging;
mod options;
mod tree;
mod variables;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_APPLICATION_NAME, DEFAULT_AZURE_MONITOR_CONNECTION_STRING_VARIABLE,
    DEFAULT_HEALTH_BASE_PATH, DEFAULT_LOG_FILTER, DEFAULT_OTLP_ENDPOINT_VARIABLE,
    DEFAULT_SERVICE_NAMESPACE, DEFAULT_SETTINGS_PATH, default_application_name,
    default_environment, default_log_filter, default_log_filter_string, default_log_format,
    default_settings_path,
};
pub use environment::{HostEnvironment, HostEnvironmentParseError};
pub use logging::{LogFormat, LogFormatParseError};
pub use options::{
    AzureMonitorOptions, CorsOptions, ExporterOverrides, HealthOptions, OtlpOptions,
    ServerOptions, ServicesOptions, TelemetryOptions,
};
pub use ortho_config::{OrthoConfig, OrthoError};
pub use tree::{BindError, ConfigurationTree, SettingsError};
pub use variables::{EnvironmentVariables, ProcessEnvironment, StaticEnvironment};

/// Host-level configuration shared by the binary and the bootstrap engine.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "KINDLING")]
pub struct Config {
    /// Hosting environment the service is started in.
    #[serde(default = "default_environment")]
    pub environment: HostEnvironment,
    /// Logical application name reported to telemetry exporters.
    #[serde(default = "default_application_name")]
    pub application_name: String,
    /// `tracing` filter directive applied to the log subscriber.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Output format of the log subscriber. Unset follows the environment.
    #[serde(default)]
    pub log_format: Option<LogFormat>,
    /// Location of the base settings document.
    #[serde(default = "default_settings_path")]
    pub settings_path: Utf8PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            application_name: default_application_name(),
            log_filter: default_log_filter_string(),
            log_format: None,
            settings_path: default_settings_path(),
        }
    }
}

impl Config {
    /// Hosting environment the service is started in.
    #[must_use]
    pub fn environment(&self) -> HostEnvironment {
        self.environment
    }

    /// Logical application name.
    #[must_use]
    pub fn application_name(&self) -> &str {
        self.application_name.as_str()
    }

    /// Log filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format, falling back to the environment's default.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
            .unwrap_or_else(|| default_log_format(self.environment))
    }

    /// Path to the base settings document.
    #[must_use]
    pub fn settings_path(&self) -> &camino::Utf8Path {
        self.settings_path.as_path()
    }

    /// Loads the layered settings document described by this configuration.
    ///
    /// The base document at [`Config::settings_path`] is read first and the
    /// environment-specific overlay (`appsettings.Production.json` for
    /// `appsettings.json`) is merged over it when present.
    pub fn load_settings(&self) -> Result<ConfigurationTree, SettingsError> {
        ConfigurationTree::load_layered(self.settings_path(), self.environment)
    }
}
