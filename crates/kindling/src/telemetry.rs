//! Telemetry pipeline decisions.
//!
//! [`assemble`] decides which exporters the host should register and with
//! which parameters. It never wires an exporter itself: the returned
//! [`TelemetryDecision`] is handed to whatever exporter registration the host
//! uses. Malformed inputs become findings in the [`DiagnosticsAggregator`]
//! instead of errors, so every telemetry misconfiguration is reported in the
//! same failed start.

use std::fmt;

use serde::Serialize;
use strum::Display;
use url::Url;

use kindling_config::{ConfigurationTree, EnvironmentVariables, TelemetryOptions};

use crate::diagnostics::DiagnosticsAggregator;
use crate::resolver::ResolutionChain;

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

/// Trace sampling ratio used in development when none is configured.
pub const DEVELOPMENT_SAMPLING_RATIO: f64 = 1.0;

/// Trace sampling ratio used outside development when none is configured.
pub const DEFAULT_SAMPLING_RATIO: f64 = 0.2;

/// Fixed sampling override applied to the Azure Monitor exporter outside
/// development. Independent of the trace sampling ratio.
pub const AZURE_MONITOR_SAMPLING_RATIO: f64 = 0.5;

const HTTP_PROTOBUF_MARKER: &str = "HttpProtobuf";
const APPLICATION_INSIGHTS_KEY: &str = "ApplicationInsights:ConnectionString";
const AZURE_MONITOR_CONNECTION_NAME: &str = "AzureMonitor";

/// OTLP transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Display)]
pub enum OtlpProtocol {
    /// OTLP over gRPC.
    #[default]
    Grpc,
    /// OTLP over HTTP with protobuf payloads.
    HttpProtobuf,
}

impl OtlpProtocol {
    /// Maps a configured protocol string to a transport.
    ///
    /// Only a case-insensitive `HttpProtobuf` selects HTTP; every other value
    /// falls back to gRPC.
    #[must_use]
    pub fn from_marker(marker: &str) -> Self {
        if marker.trim().eq_ignore_ascii_case(HTTP_PROTOBUF_MARKER) {
            Self::HttpProtobuf
        } else {
            Self::Grpc
        }
    }
}

/// How the OTLP exporter is activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtlpActivation {
    /// No OTLP exporter.
    Disabled,
    /// Exporter constructed with an explicit endpoint and protocol.
    Explicit {
        /// Collector endpoint.
        endpoint: Url,
        /// Transport.
        protocol: OtlpProtocol,
    },
    /// Exporter left to read its endpoint and protocol from the ambient
    /// `OTEL_EXPORTER_OTLP_*` variables.
    Ambient {
        /// Endpoint that was resolved and validated.
        endpoint: Url,
    },
}

impl OtlpActivation {
    /// Returns true for both explicit and ambient activation.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Endpoint the exporter will talk to, when enabled.
    #[must_use]
    pub const fn endpoint(&self) -> Option<&Url> {
        match self {
            Self::Disabled => None,
            Self::Explicit { endpoint, .. } | Self::Ambient { endpoint } => Some(endpoint),
        }
    }
}

/// Azure Monitor exporter parameters.
#[derive(Clone, PartialEq)]
pub struct AzureMonitorDecision {
    connection_string: String,
    use_default_credentials: bool,
    sampling_override: Option<f64>,
    distributed_tracing: bool,
}

impl AzureMonitorDecision {
    /// Connection string the exporter authenticates with.
    #[must_use]
    pub fn connection_string(&self) -> &str {
        self.connection_string.as_str()
    }

    /// Attach the default credential chain.
    #[must_use]
    pub const fn use_default_credentials(&self) -> bool {
        self.use_default_credentials
    }

    /// Exporter-level sampling ratio, when forced.
    #[must_use]
    pub const fn sampling_override(&self) -> Option<f64> {
        self.sampling_override
    }

    /// Enable distributed-tracing activity correlation.
    #[must_use]
    pub const fn distributed_tracing(&self) -> bool {
        self.distributed_tracing
    }
}

// Connection strings carry secrets.
impl fmt::Debug for AzureMonitorDecision {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AzureMonitorDecision")
            .field("connection_string", &"<redacted>")
            .field("use_default_credentials", &self.use_default_credentials)
            .field("sampling_override", &self.sampling_override)
            .field("distributed_tracing", &self.distributed_tracing)
            .finish()
    }
}

/// Resource attributes attached to every exported signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceIdentity {
    /// `service.name`
    pub service_name: String,
    /// `service.namespace`
    pub service_namespace: String,
    /// `service.version`
    pub service_version: String,
    /// `service.instance.id`
    pub service_instance_id: String,
}

/// Everything the host needs to register the telemetry pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryDecision {
    pipeline_enabled: bool,
    otlp: OtlpActivation,
    otlp_protocol: OtlpProtocol,
    azure_monitor: Option<AzureMonitorDecision>,
    sampling_ratio: f64,
    resource: ResourceIdentity,
}

impl TelemetryDecision {
    fn disabled(sampling_ratio: f64, resource: ResourceIdentity) -> Self {
        Self {
            pipeline_enabled: false,
            otlp: OtlpActivation::Disabled,
            otlp_protocol: OtlpProtocol::default(),
            azure_monitor: None,
            sampling_ratio,
            resource,
        }
    }

    /// False when telemetry is switched off and no pipeline should be
    /// registered at all.
    #[must_use]
    pub const fn pipeline_enabled(&self) -> bool {
        self.pipeline_enabled
    }

    /// OTLP activation mode.
    #[must_use]
    pub const fn otlp(&self) -> &OtlpActivation {
        &self.otlp
    }

    /// Returns true when an OTLP exporter should be registered.
    #[must_use]
    pub const fn otlp_enabled(&self) -> bool {
        self.otlp.is_enabled()
    }

    /// Resolved OTLP endpoint.
    #[must_use]
    pub const fn otlp_endpoint(&self) -> Option<&Url> {
        self.otlp.endpoint()
    }

    /// OTLP transport; gRPC unless explicitly switched to HTTP.
    #[must_use]
    pub const fn otlp_protocol(&self) -> OtlpProtocol {
        self.otlp_protocol
    }

    /// Azure Monitor parameters, when the exporter is active.
    #[must_use]
    pub const fn azure_monitor(&self) -> Option<&AzureMonitorDecision> {
        self.azure_monitor.as_ref()
    }

    /// Returns true when an Azure Monitor exporter should be registered.
    #[must_use]
    pub const fn azure_monitor_enabled(&self) -> bool {
        self.azure_monitor.is_some()
    }

    /// Ratio for the trace-id ratio sampler, in `[0, 1]`.
    #[must_use]
    pub const fn sampling_ratio(&self) -> f64 {
        self.sampling_ratio
    }

    /// Resource attributes.
    #[must_use]
    pub const fn resource(&self) -> &ResourceIdentity {
        &self.resource
    }
}

/// Host facts the assembler decides from.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryInputs<'a> {
    /// Bound `telemetry` section.
    pub options: &'a TelemetryOptions,
    /// Development environments sample everything by default.
    pub is_development: bool,
    /// Version of the entry binary.
    pub entry_version: &'a str,
    /// Logical application name.
    pub application_name: &'a str,
    /// Stable identity of the machine or instance.
    pub machine_identity: &'a str,
}

/// Places exporter settings are read from besides the bound options.
#[derive(Clone, Copy)]
pub struct TelemetrySources<'a> {
    /// Environment-variable lookup for exporter overrides.
    pub environment: &'a dyn EnvironmentVariables,
    /// Raw settings tree.
    pub settings: &'a ConfigurationTree,
}

/// Decides the telemetry pipeline for one bootstrap.
///
/// Pure apart from the findings appended to `diagnostics`: identical inputs
/// always produce identical decisions.
pub fn assemble(
    inputs: &TelemetryInputs<'_>,
    sources: &TelemetrySources<'_>,
    diagnostics: &DiagnosticsAggregator,
) -> TelemetryDecision {
    let options = inputs.options;
    let resource = resource_identity(inputs);

    if options.disabled {
        diagnostics.notice("telemetry is disabled; no exporters will be registered");
        return TelemetryDecision::disabled(default_sampling_ratio(inputs.is_development), resource);
    }

    let sampling_ratio = sampling_ratio(options.trace_sampling_ratio, inputs.is_development, diagnostics);
    let (otlp, otlp_protocol) = otlp_activation(options, sources, diagnostics);
    let azure_monitor = azure_monitor_decision(options, inputs.is_development, sources);

    tracing::debug!(
        target: TELEMETRY_TARGET,
        event = "telemetry_assembled",
        otlp_enabled = otlp.is_enabled(),
        otlp_protocol = %otlp_protocol,
        azure_monitor_enabled = azure_monitor.is_some(),
        sampling_ratio,
        "telemetry pipeline decided"
    );

    TelemetryDecision {
        pipeline_enabled: true,
        otlp,
        otlp_protocol,
        azure_monitor,
        sampling_ratio,
        resource,
    }
}

fn resource_identity(inputs: &TelemetryInputs<'_>) -> ResourceIdentity {
    ResourceIdentity {
        service_name: inputs.application_name.to_owned(),
        service_namespace: inputs.options.service_namespace().to_owned(),
        service_version: inputs.entry_version.to_owned(),
        service_instance_id: inputs.machine_identity.to_owned(),
    }
}

const fn default_sampling_ratio(is_development: bool) -> f64 {
    if is_development {
        DEVELOPMENT_SAMPLING_RATIO
    } else {
        DEFAULT_SAMPLING_RATIO
    }
}

fn sampling_ratio(
    explicit: Option<f64>,
    is_development: bool,
    diagnostics: &DiagnosticsAggregator,
) -> f64 {
    match explicit {
        Some(ratio) if (0.0..=1.0).contains(&ratio) => ratio,
        Some(ratio) => {
            diagnostics.error(format!(
                "telemetry.traceSamplingRatio must be between 0.0 and 1.0, got {ratio}"
            ));
            default_sampling_ratio(is_development)
        }
        None => default_sampling_ratio(is_development),
    }
}

fn otlp_activation(
    options: &TelemetryOptions,
    sources: &TelemetrySources<'_>,
    diagnostics: &DiagnosticsAggregator,
) -> (OtlpActivation, OtlpProtocol) {
    let chain = ResolutionChain::new()
        .env(sources.environment, options.overrides.otlp_endpoint.as_str())
        .fallback("telemetry.otlp.endpoint", options.otlp.endpoint.as_deref());
    let resolved = chain.resolve();
    let protocol_marker = options
        .otlp
        .protocol
        .as_deref()
        .map(str::trim)
        .filter(|marker| !marker.is_empty());
    let protocol = protocol_marker.map_or_else(OtlpProtocol::default, OtlpProtocol::from_marker);

    let Some(raw_endpoint) = resolved.value() else {
        return (OtlpActivation::Disabled, protocol);
    };
    if options.otlp.disabled {
        diagnostics.notice("OTLP exporter is disabled although an endpoint is configured");
        return (OtlpActivation::Disabled, protocol);
    }

    let source = resolved
        .source_index()
        .and_then(|index| chain.label(index))
        .unwrap_or("unknown");
    let Some(endpoint) = parse_endpoint(raw_endpoint) else {
        diagnostics.critical(format!(
            "OTLP endpoint '{}' from {source} is not a valid absolute URI",
            raw_endpoint.trim()
        ));
        return (OtlpActivation::Disabled, protocol);
    };

    let activation = match protocol_marker {
        Some(_) => OtlpActivation::Explicit { endpoint, protocol },
        None => OtlpActivation::Ambient { endpoint },
    };
    (activation, protocol)
}

fn parse_endpoint(raw: &str) -> Option<Url> {
    Url::parse(raw.trim())
        .ok()
        .filter(|url| url.has_host() && !url.cannot_be_a_base())
}

fn azure_monitor_decision(
    options: &TelemetryOptions,
    is_development: bool,
    sources: &TelemetrySources<'_>,
) -> Option<AzureMonitorDecision> {
    let variable = options.overrides.azure_monitor_connection_string.as_str();
    let connection_string = ResolutionChain::new()
        .env(sources.environment, variable)
        .setting(sources.settings, variable)
        .setting(sources.settings, APPLICATION_INSIGHTS_KEY)
        .connection_string(sources.settings, AZURE_MONITOR_CONNECTION_NAME)
        .fallback(
            "telemetry.azureMonitor.connectionString",
            options.azure_monitor.connection_string.as_deref(),
        )
        .resolve()
        .into_value()?;

    let azure = &options.azure_monitor;
    if azure.disabled {
        return None;
    }

    Some(AzureMonitorDecision {
        connection_string: connection_string.trim().to_owned(),
        use_default_credentials: azure.enable_default_credentials,
        sampling_override: (!is_development).then_some(AZURE_MONITOR_SAMPLING_RATIO),
        distributed_tracing: azure.is_distributed_tracing_enabled,
    })
}
