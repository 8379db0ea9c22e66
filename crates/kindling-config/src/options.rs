//! Typed option sections bound from the settings tree.

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_SERVICE_NAMESPACE, default_azure_monitor_connection_string_variable,
    default_otlp_endpoint_variable,
};

/// `telemetry` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetryOptions {
    /// Skips telemetry pipeline registration entirely.
    pub disabled: bool,
    /// Namespace attached to the telemetry resource.
    pub service_namespace: Option<String>,
    /// Explicit trace sampling ratio in `[0, 1]`.
    pub trace_sampling_ratio: Option<f64>,
    /// OTLP exporter settings.
    pub otlp: OtlpOptions,
    /// Azure Monitor exporter settings.
    pub azure_monitor: AzureMonitorOptions,
    /// Environment variables consulted before configured exporter values.
    pub overrides: ExporterOverrides,
}

impl TelemetryOptions {
    /// Namespace attached to the telemetry resource.
    #[must_use]
    pub fn service_namespace(&self) -> &str {
        self.service_namespace
            .as_deref()
            .map(str::trim)
            .filter(|namespace| !namespace.is_empty())
            .unwrap_or(DEFAULT_SERVICE_NAMESPACE)
    }
}

/// `telemetry.otlp` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct OtlpOptions {
    /// Keeps the OTLP exporter off even when an endpoint resolves.
    pub disabled: bool,
    /// Collector endpoint used when no override variable is set.
    pub endpoint: Option<String>,
    /// Transport marker; `HttpProtobuf` selects HTTP, anything else gRPC.
    pub protocol: Option<String>,
}

/// `telemetry.azureMonitor` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AzureMonitorOptions {
    /// Keeps the Azure Monitor exporter off even when a connection string
    /// resolves.
    pub disabled: bool,
    /// Authenticates the exporter with the ambient default credential chain.
    pub enable_default_credentials: bool,
    /// Enables distributed-tracing activity correlation.
    pub is_distributed_tracing_enabled: bool,
    /// Last-resort connection string.
    pub connection_string: Option<String>,
}

/// Names of the environment variables that override exporter settings.
///
/// Deployment platforms disagree on naming, so both names are configurable
/// under `telemetry.overrides`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExporterOverrides {
    /// Variable holding the OTLP collector endpoint.
    pub otlp_endpoint: String,
    /// Variable holding the Azure Monitor connection string.
    pub azure_monitor_connection_string: String,
}

impl Default for ExporterOverrides {
    fn default() -> Self {
        Self {
            otlp_endpoint: default_otlp_endpoint_variable(),
            azure_monitor_connection_string: default_azure_monitor_connection_string_variable(),
        }
    }
}

/// `health` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthOptions {
    /// Mounts the health endpoints.
    pub enabled: bool,
    /// Base path of the health endpoints.
    pub base_uri: Option<String>,
}

/// `server` section: transport-level settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerOptions {
    /// Idle keep-alive timeout in seconds.
    pub keep_alive_timeout_seconds: u64,
    /// Time allowed for a client to send request headers, in seconds.
    pub request_headers_timeout_seconds: u64,
    /// Grace period granted to in-flight requests during shutdown, in seconds.
    pub shutdown_grace_period_seconds: u64,
    /// Honours `X-Forwarded-*` headers from a fronting proxy.
    pub forward_headers: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            keep_alive_timeout_seconds: 120,
            request_headers_timeout_seconds: 30,
            shutdown_grace_period_seconds: 30,
            forward_headers: true,
        }
    }
}

/// `services` section: host-wide services.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServicesOptions {
    /// Registers the output cache.
    pub output_cache: bool,
    /// Default request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl Default for ServicesOptions {
    fn default() -> Self {
        Self {
            output_cache: true,
            request_timeout_seconds: 100,
        }
    }
}

/// `cors` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CorsOptions {
    /// Origins allowed to call the service; `*` allows any origin.
    pub allowed_origins: Vec<String>,
    /// Allows credentialed cross-origin requests.
    pub allow_credentials: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ConfigurationTree;

    #[test]
    fn telemetry_section_binds_camel_case_keys() {
        let tree = ConfigurationTree::from_value(json!({
            "telemetry": {
                "serviceNamespace": "orders",
                "traceSamplingRatio": 0.25,
                "otlp": { "endpoint": "http://collector:4317", "protocol": "HttpProtobuf" },
                "azureMonitor": {
                    "enableDefaultCredentials": true,
                    "isDistributedTracingEnabled": true
                },
                "overrides": { "otlpEndpoint": "COLLECTOR_URL" }
            }
        }));

        let options: TelemetryOptions = tree.bind("telemetry").expect("telemetry binds");
        assert_eq!(options.service_namespace(), "orders");
        assert_eq!(options.trace_sampling_ratio, Some(0.25));
        assert_eq!(options.otlp.protocol.as_deref(), Some("HttpProtobuf"));
        assert!(options.azure_monitor.enable_default_credentials);
        assert!(options.azure_monitor.is_distributed_tracing_enabled);
        assert_eq!(options.overrides.otlp_endpoint, "COLLECTOR_URL");
        assert_eq!(
            options.overrides.azure_monitor_connection_string,
            "APPLICATIONINSIGHTS_CONNECTION_STRING"
        );
    }

    #[test]
    fn blank_namespace_falls_back_to_default() {
        let options = TelemetryOptions {
            service_namespace: Some("  ".to_owned()),
            ..TelemetryOptions::default()
        };
        assert_eq!(options.service_namespace(), DEFAULT_SERVICE_NAMESPACE);
    }

    #[test]
    fn server_defaults_survive_partial_sections() {
        let tree = ConfigurationTree::from_value(json!({
            "server": { "shutdownGracePeriodSeconds": 5 }
        }));
        let server: ServerOptions = tree.bind("server").expect("server binds");
        assert_eq!(server.shutdown_grace_period_seconds, 5);
        assert_eq!(server.keep_alive_timeout_seconds, 120);
        assert!(server.forward_headers);
    }
}
