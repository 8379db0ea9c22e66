//! Configuration resolution and staged bootstrap for HTTP services.
//!
//! Kindling turns a layered settings document into a [`ServicePlan`]: the
//! listener settings, host-wide services, CORS policy, telemetry exporter
//! decisions, health endpoints and routes a host must wire before it starts
//! serving. It does not bind sockets or export telemetry itself.
//!
//! The bootstrap is driven by an [`ApplicationBuilder`]. Configuration phases
//! run in a fixed order and never abort on the first problem; they append
//! findings to a [`DiagnosticsAggregator`] instead. Once every phase has run,
//! the bootstrap gate turns all blocking findings into a single
//! [`ConfigurationError`], so an operator sees every independent
//! misconfiguration from one failed start.
//!
//! Settings values that can come from several places (an environment
//! variable, a settings key, a connection string, a built-in default) are
//! looked up through a [`ResolutionChain`], which stops at the first
//! non-blank source.

mod diagnostics;
mod lifecycle;
pub mod logging;
mod plan;
mod probes;
mod reporter;
mod resolver;
mod routes;
mod telemetry;

pub use diagnostics::{
    ConfigurationError, DiagnosticFinding, DiagnosticsAggregator, DiagnosticsReport,
    FindingLevel,
};
pub use lifecycle::{
    Application, ApplicationBuilder, HostDescriptor, LifecycleError, LifecycleState, Phase,
    ServiceContext,
};
pub use logging::{LoggingError, LoggingHandle};
pub use plan::{CorsPolicy, GlobalServicesPlan, InfrastructurePlan, ServicePlan};
pub use probes::{
    HealthCheckRegistration, HealthEndpoint, HealthEndpointScheme, ProbeKind, READY_TAG,
    ResponseWriter, STARTUP_TAG, classify as classify_health, normalise_base_path,
};
pub use reporter::{LifecycleReporter, StructuredLifecycleReporter};
pub use resolver::{ResolutionChain, ResolvedValue, resolve};
pub use routes::{Route, RouteTable, RouteTarget, landing_redirect};
pub use telemetry::{
    AZURE_MONITOR_SAMPLING_RATIO, AzureMonitorDecision, DEFAULT_SAMPLING_RATIO,
    DEVELOPMENT_SAMPLING_RATIO, OtlpActivation, OtlpProtocol, ResourceIdentity,
    TelemetryDecision, TelemetryInputs, TelemetrySources, assemble as assemble_telemetry,
};

#[cfg(test)]
mod tests;
