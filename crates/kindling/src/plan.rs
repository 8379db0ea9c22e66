//! The service plan produced by a successful bootstrap.
//!
//! Each configuration phase contributes one part of the plan. Phases read
//! typed sections from the settings tree and record recoverable problems as
//! findings; they fall back to safe values so later phases still run and
//! every problem is reported together.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use kindling_config::{ConfigurationTree, CorsOptions, ServerOptions, ServicesOptions};

use crate::diagnostics::DiagnosticsAggregator;
use crate::probes::{HealthCheckRegistration, HealthEndpointScheme};
use crate::routes::RouteTable;
use crate::telemetry::TelemetryDecision;

const WILDCARD_ORIGIN: &str = "*";

/// Transport-level settings for the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfrastructurePlan {
    /// Idle keep-alive timeout.
    pub keep_alive_timeout: Duration,
    /// Time allowed for request headers to arrive.
    pub request_headers_timeout: Duration,
    /// Grace period for in-flight requests during shutdown.
    pub shutdown_grace_period: Duration,
    /// Honour `X-Forwarded-*` headers.
    pub forward_headers: bool,
}

/// Host-wide services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalServicesPlan {
    /// Register the output cache.
    pub output_cache: bool,
    /// Default request timeout.
    pub request_timeout: Duration,
}

/// Cross-origin policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    /// Explicitly allowed origins.
    pub allowed_origins: Vec<String>,
    /// `*` was configured.
    pub allow_any_origin: bool,
    /// Credentialed requests are allowed.
    pub allow_credentials: bool,
}

/// Everything the host needs to wire the service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServicePlan {
    pub(crate) infrastructure: InfrastructurePlan,
    pub(crate) services: GlobalServicesPlan,
    pub(crate) cors: Option<CorsPolicy>,
    pub(crate) telemetry: TelemetryDecision,
    pub(crate) health: Option<HealthEndpointScheme>,
    pub(crate) health_checks: Vec<HealthCheckRegistration>,
    pub(crate) routes: RouteTable,
    pub(crate) domain_services: Vec<String>,
}

impl ServicePlan {
    /// Listener settings.
    #[must_use]
    pub const fn infrastructure(&self) -> &InfrastructurePlan {
        &self.infrastructure
    }

    /// Host-wide services.
    #[must_use]
    pub const fn services(&self) -> &GlobalServicesPlan {
        &self.services
    }

    /// CORS policy; `None` when no origin is configured.
    #[must_use]
    pub const fn cors(&self) -> Option<&CorsPolicy> {
        self.cors.as_ref()
    }

    /// Telemetry pipeline decision.
    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryDecision {
        &self.telemetry
    }

    /// Health endpoints; `None` when health is disabled.
    #[must_use]
    pub const fn health(&self) -> Option<&HealthEndpointScheme> {
        self.health.as_ref()
    }

    /// Health checks registered by domain callbacks.
    #[must_use]
    pub fn health_checks(&self) -> &[HealthCheckRegistration] {
        &self.health_checks
    }

    /// Routes to mount.
    #[must_use]
    pub const fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Services registered by domain callbacks, in registration order.
    #[must_use]
    pub fn domain_services(&self) -> &[String] {
        &self.domain_services
    }
}

/// Binds `key`, recording a binding failure as an error and using defaults.
pub(crate) fn bind_section<T>(
    settings: &ConfigurationTree,
    key: &str,
    diagnostics: &DiagnosticsAggregator,
) -> T
where
    T: DeserializeOwned + Serialize + Default,
{
    settings.bind(key).unwrap_or_else(|error| {
        diagnostics.error(error.to_string());
        T::default()
    })
}

fn positive_seconds(
    seconds: u64,
    fallback: u64,
    key: &str,
    diagnostics: &DiagnosticsAggregator,
) -> Duration {
    if seconds == 0 {
        diagnostics.error(format!("{key} must be greater than zero"));
        return Duration::from_secs(fallback);
    }
    Duration::from_secs(seconds)
}

/// Reads `server.*`.
pub(crate) fn infrastructure(
    settings: &ConfigurationTree,
    diagnostics: &DiagnosticsAggregator,
) -> InfrastructurePlan {
    let options: ServerOptions = bind_section(settings, "server", diagnostics);
    let defaults = ServerOptions::default();
    InfrastructurePlan {
        keep_alive_timeout: positive_seconds(
            options.keep_alive_timeout_seconds,
            defaults.keep_alive_timeout_seconds,
            "server.keepAliveTimeoutSeconds",
            diagnostics,
        ),
        request_headers_timeout: positive_seconds(
            options.request_headers_timeout_seconds,
            defaults.request_headers_timeout_seconds,
            "server.requestHeadersTimeoutSeconds",
            diagnostics,
        ),
        shutdown_grace_period: Duration::from_secs(options.shutdown_grace_period_seconds),
        forward_headers: options.forward_headers,
    }
}

/// Reads `services.*`.
pub(crate) fn global_services(
    settings: &ConfigurationTree,
    diagnostics: &DiagnosticsAggregator,
) -> GlobalServicesPlan {
    let options: ServicesOptions = bind_section(settings, "services", diagnostics);
    GlobalServicesPlan {
        output_cache: options.output_cache,
        request_timeout: positive_seconds(
            options.request_timeout_seconds,
            ServicesOptions::default().request_timeout_seconds,
            "services.requestTimeoutSeconds",
            diagnostics,
        ),
    }
}

/// Reads `cors.*`.
pub(crate) fn cors(
    settings: &ConfigurationTree,
    diagnostics: &DiagnosticsAggregator,
) -> Option<CorsPolicy> {
    let options: CorsOptions = bind_section(settings, "cors", diagnostics);
    let mut allow_any_origin = false;
    let mut allowed_origins = Vec::new();

    for origin in options.allowed_origins.iter().map(|origin| origin.trim()) {
        if origin.is_empty() {
            continue;
        }
        if origin == WILDCARD_ORIGIN {
            allow_any_origin = true;
            continue;
        }
        match Url::parse(origin) {
            Ok(url) if url.has_host() => {
                allowed_origins.push(origin.trim_end_matches('/').to_owned());
            }
            _ => diagnostics.error(format!("cors.allowedOrigins entry '{origin}' is not an origin")),
        }
    }

    if allow_any_origin && options.allow_credentials {
        diagnostics.error("cors.allowCredentials cannot be combined with the '*' origin");
    }
    if !allow_any_origin && allowed_origins.is_empty() {
        return None;
    }

    Some(CorsPolicy {
        allowed_origins,
        allow_any_origin,
        allow_credentials: options.allow_credentials && !allow_any_origin,
    })
}
