//! Health endpoint classification.
//!
//! Four fixed endpoints are mounted under a common base path. Each one
//! selects the registered health checks it runs through a predicate over the
//! check's tags. Executing the checks is left to the host.

use std::collections::BTreeSet;

use serde::Serialize;
use strum::{Display, EnumString};

use kindling_config::{
    ConfigurationTree, DEFAULT_HEALTH_BASE_PATH, HealthOptions, HostEnvironment,
};

use crate::diagnostics::DiagnosticsAggregator;
use crate::resolver::ResolutionChain;

/// Tag that opts a check into the startup probe.
pub const STARTUP_TAG: &str = "startup";

/// Tag that opts a check into the readiness probe.
pub const READY_TAG: &str = "ready";

const BASE_URI_KEY: &str = "health:baseUri";

/// The fixed set of health endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// Checks tagged `startup`.
    Startup,
    /// No checks: answers healthy while the process can serve requests.
    Liveness,
    /// Checks tagged `ready`.
    Readiness,
    /// Every registered check.
    Internal,
}

impl ProbeKind {
    /// Every probe, in mount order.
    pub const ALL: [Self; 4] = [Self::Startup, Self::Liveness, Self::Readiness, Self::Internal];

    /// Path segment appended to the base path.
    #[must_use]
    pub const fn relative_path(self) -> &'static str {
        match self {
            Self::Startup => "/startup",
            Self::Liveness => "/liveness",
            Self::Readiness => "/readiness",
            Self::Internal => "/internal",
        }
    }

    /// Returns true when `check` runs as part of this probe.
    #[must_use]
    pub fn admits(self, check: &HealthCheckRegistration) -> bool {
        match self {
            Self::Startup => check.has_tag(STARTUP_TAG),
            Self::Liveness => false,
            Self::Readiness => check.has_tag(READY_TAG),
            Self::Internal => true,
        }
    }
}

/// A health check as registered by the domain, identified by name and tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckRegistration {
    name: String,
    tags: BTreeSet<String>,
}

impl HealthCheckRegistration {
    /// Registers an untagged check.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeSet::new(),
        }
    }

    /// Adds a tag. Tags match exactly.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Check name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns true when the check carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// How health reports are written back to callers. Shared by every probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ResponseWriter {
    /// JSON document with the overall status and one entry per check.
    #[default]
    DetailedJson,
}

/// A mounted health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthEndpoint {
    kind: ProbeKind,
    path: String,
}

impl HealthEndpoint {
    /// Probe served by this endpoint.
    #[must_use]
    pub const fn kind(&self) -> ProbeKind {
        self.kind
    }

    /// Absolute request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    /// Filters `checks` down to the ones this endpoint runs.
    pub fn select<'a>(
        &self,
        checks: &'a [HealthCheckRegistration],
    ) -> impl Iterator<Item = &'a HealthCheckRegistration> + use<'a> {
        let kind = self.kind;
        checks.iter().filter(move |check| kind.admits(check))
    }
}

/// The four health endpoints mounted under one base path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthEndpointScheme {
    base_path: String,
    endpoints: Vec<HealthEndpoint>,
    response_writer: ResponseWriter,
}

impl HealthEndpointScheme {
    /// Mounts every probe under `base_path` after normalising it.
    #[must_use]
    pub fn mount(base_path: &str) -> Self {
        let base_path = normalise_base_path(base_path);
        let endpoints = ProbeKind::ALL
            .into_iter()
            .map(|kind| HealthEndpoint {
                kind,
                path: format!("{base_path}{}", kind.relative_path()),
            })
            .collect();
        Self {
            base_path,
            endpoints,
            response_writer: ResponseWriter::default(),
        }
    }

    /// Normalised base path; empty when mounted at the root.
    #[must_use]
    pub fn base_path(&self) -> &str {
        self.base_path.as_str()
    }

    /// Mounted endpoints in probe order.
    #[must_use]
    pub fn endpoints(&self) -> &[HealthEndpoint] {
        &self.endpoints
    }

    /// Endpoint serving `kind`.
    #[must_use]
    pub fn endpoint(&self, kind: ProbeKind) -> Option<&HealthEndpoint> {
        self.endpoints.iter().find(|endpoint| endpoint.kind == kind)
    }

    /// Response writer shared by every endpoint.
    #[must_use]
    pub const fn response_writer(&self) -> ResponseWriter {
        self.response_writer
    }
}

/// Normalises a base path to a leading slash and no trailing slash.
///
/// The root path normalises to the empty string so endpoints mount at
/// `/startup` rather than `//startup`.
#[must_use]
pub fn normalise_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Decides whether and where the health endpoints are mounted.
///
/// Returns `None` when health is disabled. Disabling health in production
/// records a warning, which fails the bootstrap gate.
pub fn classify(
    options: &HealthOptions,
    settings: &ConfigurationTree,
    environment: HostEnvironment,
    diagnostics: &DiagnosticsAggregator,
) -> Option<HealthEndpointScheme> {
    if !options.enabled {
        if environment.is_production() {
            diagnostics.warning(
                "health endpoints are disabled in production; set health.enabled to true",
            );
        }
        return None;
    }

    let resolved = ResolutionChain::new()
        .setting(settings, BASE_URI_KEY)
        .default_value(DEFAULT_HEALTH_BASE_PATH)
        .resolve()
        .into_value();
    let raw = resolved.as_deref().unwrap_or(DEFAULT_HEALTH_BASE_PATH);

    if raw.contains("://") || raw.trim_start().starts_with("//") {
        diagnostics.error(format!(
            "health.baseUri '{}' must be a path, not an absolute URI",
            raw.trim()
        ));
        return Some(HealthEndpointScheme::mount(DEFAULT_HEALTH_BASE_PATH));
    }

    Some(HealthEndpointScheme::mount(raw))
}
