//! Staged service bootstrap.
//!
//! An [`ApplicationBuilder`] moves through `Created → Configuring →
//! Validated → Built`. Configuring runs the fixed phases in order, then every
//! domain callback in registration order. Problems found along the way are
//! appended to the builder's [`DiagnosticsAggregator`]; the gate runs once
//! configuring is done and decides whether an [`Application`] is produced.

use std::fmt;
use std::mem;
use std::sync::Arc;

use strum::Display;
use thiserror::Error;

use kindling_config::{
    Config, ConfigurationTree, EnvironmentVariables, HealthOptions, HostEnvironment,
    ProcessEnvironment, SettingsError, TelemetryOptions,
};

use crate::diagnostics::{ConfigurationError, DiagnosticsAggregator, DiagnosticsReport};
use crate::plan::{self, ServicePlan};
use crate::probes::{self, HealthCheckRegistration};
use crate::reporter::{LifecycleReporter, StructuredLifecycleReporter};
use crate::resolver::ResolutionChain;
use crate::routes::{self, Route, RouteTable};
use crate::telemetry::{self, TelemetryInputs, TelemetrySources};

const LANDING_PAGE_KEY: &str = "landingPage";
const FALLBACK_MACHINE_IDENTITY: &str = "localhost";

/// Errors surfaced by the builder.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The builder already attempted a build.
    #[error("the application builder has already been built")]
    AlreadyBuilt,
    /// The bootstrap gate rejected the configuration.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Builder state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleState {
    /// Accepting domain callbacks.
    Created,
    /// Running configuration phases.
    Configuring,
    /// Running the gate.
    Validated,
    /// The application was produced.
    Built,
    /// The gate rejected the configuration.
    Failed,
}

/// Configuration phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Listener timeouts and forwarded headers.
    Infrastructure,
    /// Output caching and the default request timeout.
    GlobalServices,
    /// Cross-origin policy.
    Cors,
    /// Exporter decisions.
    Telemetry,
    /// Health endpoints and the landing redirect.
    Health,
    /// Domain callbacks.
    DomainServices,
}

impl Phase {
    /// Every phase, in execution order.
    pub const ALL: [Self; 6] = [
        Self::Infrastructure,
        Self::GlobalServices,
        Self::Cors,
        Self::Telemetry,
        Self::Health,
        Self::DomainServices,
    ];
}

/// Facts about the running host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDescriptor {
    environment: HostEnvironment,
    application_name: String,
    entry_version: String,
    machine_identity: String,
}

impl HostDescriptor {
    /// Describes a host running this crate's version on an unnamed machine.
    #[must_use]
    pub fn new(environment: HostEnvironment, application_name: impl Into<String>) -> Self {
        Self {
            environment,
            application_name: application_name.into(),
            entry_version: env!("CARGO_PKG_VERSION").to_owned(),
            machine_identity: FALLBACK_MACHINE_IDENTITY.to_owned(),
        }
    }

    /// Describes the host from its configuration, reading the machine
    /// identity from `HOSTNAME` or `COMPUTERNAME`.
    #[must_use]
    pub fn from_config(config: &Config, environment: &dyn EnvironmentVariables) -> Self {
        let machine_identity = ResolutionChain::new()
            .env(environment, "HOSTNAME")
            .env(environment, "COMPUTERNAME")
            .default_value(FALLBACK_MACHINE_IDENTITY)
            .resolve()
            .into_value()
            .unwrap_or_else(|| FALLBACK_MACHINE_IDENTITY.to_owned());
        Self::new(config.environment(), config.application_name())
            .with_machine_identity(machine_identity)
    }

    /// Overrides the entry version.
    #[must_use]
    pub fn with_entry_version(mut self, version: impl Into<String>) -> Self {
        self.entry_version = version.into();
        self
    }

    /// Overrides the machine identity.
    #[must_use]
    pub fn with_machine_identity(mut self, identity: impl Into<String>) -> Self {
        self.machine_identity = identity.into();
        self
    }

    /// Hosting environment.
    #[must_use]
    pub const fn environment(&self) -> HostEnvironment {
        self.environment
    }

    /// Logical application name.
    #[must_use]
    pub fn application_name(&self) -> &str {
        self.application_name.as_str()
    }

    /// Version of the entry binary.
    #[must_use]
    pub fn entry_version(&self) -> &str {
        self.entry_version.as_str()
    }

    /// Machine or instance identity.
    #[must_use]
    pub fn machine_identity(&self) -> &str {
        self.machine_identity.as_str()
    }
}

/// What a domain callback can see and register.
pub struct ServiceContext<'a> {
    host: &'a HostDescriptor,
    settings: &'a ConfigurationTree,
    diagnostics: &'a DiagnosticsAggregator,
    routes: &'a mut RouteTable,
    services: &'a mut Vec<String>,
    health_checks: &'a mut Vec<HealthCheckRegistration>,
}

impl ServiceContext<'_> {
    /// Host facts.
    #[must_use]
    pub fn host(&self) -> &HostDescriptor {
        self.host
    }

    /// Settings tree.
    #[must_use]
    pub fn settings(&self) -> &ConfigurationTree {
        self.settings
    }

    /// Aggregator for recoverable problems.
    #[must_use]
    pub fn diagnostics(&self) -> &DiagnosticsAggregator {
        self.diagnostics
    }

    /// Registers a named service.
    pub fn add_service(&mut self, name: impl Into<String>) {
        self.services.push(name.into());
    }

    /// Mounts a domain route.
    pub fn add_route(&mut self, path: impl Into<String>, handler: impl Into<String>) {
        self.routes.push(Route::domain(path, handler));
    }

    /// Registers a health check for the probes to select from.
    pub fn add_health_check(&mut self, check: HealthCheckRegistration) {
        self.health_checks.push(check);
    }
}

type DomainCallback = Box<dyn FnOnce(&mut ServiceContext<'_>) + Send>;

/// The built application: an immutable plan plus the sealed findings.
#[derive(Debug, Clone)]
pub struct Application {
    host: HostDescriptor,
    plan: ServicePlan,
    diagnostics: DiagnosticsReport,
}

impl Application {
    /// Host facts.
    #[must_use]
    pub const fn host(&self) -> &HostDescriptor {
        &self.host
    }

    /// What the host must wire.
    #[must_use]
    pub const fn plan(&self) -> &ServicePlan {
        &self.plan
    }

    /// Every finding recorded during the bootstrap, including notices.
    #[must_use]
    pub const fn diagnostics(&self) -> &DiagnosticsReport {
        &self.diagnostics
    }
}

/// Drives one bootstrap.
pub struct ApplicationBuilder {
    host: HostDescriptor,
    settings: ConfigurationTree,
    environment: Box<dyn EnvironmentVariables + Send + Sync>,
    diagnostics: DiagnosticsAggregator,
    callbacks: Vec<DomainCallback>,
    reporter: Arc<dyn LifecycleReporter>,
    state: LifecycleState,
}

impl ApplicationBuilder {
    /// Creates a builder over an already loaded settings tree.
    ///
    /// Environment lookups go to the process environment and lifecycle events
    /// to [`StructuredLifecycleReporter`] until replaced.
    #[must_use]
    pub fn new(host: HostDescriptor, settings: ConfigurationTree) -> Self {
        Self {
            host,
            settings,
            environment: Box::new(ProcessEnvironment),
            diagnostics: DiagnosticsAggregator::new(),
            callbacks: Vec::new(),
            reporter: Arc::new(StructuredLifecycleReporter::new()),
            state: LifecycleState::Created,
        }
    }

    /// Loads the layered settings named by `config` and describes the host.
    pub fn from_config(config: &Config) -> Result<Self, SettingsError> {
        let settings = config.load_settings()?;
        let host = HostDescriptor::from_config(config, &ProcessEnvironment);
        Ok(Self::new(host, settings))
    }

    /// Replaces the environment-variable lookup.
    #[must_use]
    pub fn with_environment(
        mut self,
        environment: impl EnvironmentVariables + Send + Sync + 'static,
    ) -> Self {
        self.environment = Box::new(environment);
        self
    }

    /// Replaces the lifecycle reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn LifecycleReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Findings recorded so far. Still readable after a failed build.
    #[must_use]
    pub const fn diagnostics(&self) -> &DiagnosticsAggregator {
        &self.diagnostics
    }

    /// Registers a domain callback. Callbacks run in registration order
    /// after every built-in phase.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::AlreadyBuilt`] once a build was attempted.
    pub fn configure_services<F>(&mut self, callback: F) -> Result<&mut Self, LifecycleError>
    where
        F: FnOnce(&mut ServiceContext<'_>) + Send + 'static,
    {
        if self.state != LifecycleState::Created {
            return Err(LifecycleError::AlreadyBuilt);
        }
        self.callbacks.push(Box::new(callback));
        Ok(self)
    }

    /// Runs every phase, then the gate.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Configuration`] with every blocking finding
    /// when the gate fails, and [`LifecycleError::AlreadyBuilt`] on any call
    /// after the first.
    pub fn build(&mut self) -> Result<Application, LifecycleError> {
        if self.state != LifecycleState::Created {
            return Err(LifecycleError::AlreadyBuilt);
        }

        self.reporter.bootstrap_starting(&self.host);
        self.state = LifecycleState::Configuring;
        let plan = self.configure();

        self.state = LifecycleState::Validated;
        if let Err(source) = self.diagnostics.validate() {
            self.state = LifecycleState::Failed;
            let error = LifecycleError::Configuration(source);
            self.reporter.bootstrap_failed(&error);
            return Err(error);
        }

        self.state = LifecycleState::Built;
        self.reporter.bootstrap_succeeded(&plan);
        Ok(Application {
            host: self.host.clone(),
            plan,
            diagnostics: self.diagnostics.report(),
        })
    }

    fn configure(&mut self) -> ServicePlan {
        let callbacks = mem::take(&mut self.callbacks);
        let settings = &self.settings;
        let diagnostics = &self.diagnostics;

        let infrastructure = plan::infrastructure(settings, diagnostics);
        self.reporter.phase_completed(Phase::Infrastructure);

        let services = plan::global_services(settings, diagnostics);
        self.reporter.phase_completed(Phase::GlobalServices);

        let cors = plan::cors(settings, diagnostics);
        self.reporter.phase_completed(Phase::Cors);

        let telemetry_options: TelemetryOptions =
            plan::bind_section(settings, "telemetry", diagnostics);
        let inputs = TelemetryInputs {
            options: &telemetry_options,
            is_development: self.host.environment.is_development(),
            entry_version: &self.host.entry_version,
            application_name: &self.host.application_name,
            machine_identity: &self.host.machine_identity,
        };
        let sources = TelemetrySources {
            environment: &*self.environment,
            settings,
        };
        let telemetry = telemetry::assemble(&inputs, &sources, diagnostics);
        self.reporter.phase_completed(Phase::Telemetry);

        let mut routes = RouteTable::new();
        let health_options: HealthOptions = plan::bind_section(settings, "health", diagnostics);
        let health = probes::classify(
            &health_options,
            settings,
            self.host.environment,
            diagnostics,
        );
        if let Some(scheme) = &health {
            routes.mount_health(scheme);
        }
        let landing_page = settings.get_str(LANDING_PAGE_KEY);
        if let Some(redirect) = routes::landing_redirect(landing_page.as_deref(), diagnostics) {
            routes.push(redirect);
        }
        self.reporter.phase_completed(Phase::Health);

        let mut domain_services = Vec::new();
        let mut health_checks = Vec::new();
        {
            let mut context = ServiceContext {
                host: &self.host,
                settings,
                diagnostics,
                routes: &mut routes,
                services: &mut domain_services,
                health_checks: &mut health_checks,
            };
            for callback in callbacks {
                callback(&mut context);
            }
        }
        self.reporter.phase_completed(Phase::DomainServices);

        ServicePlan {
            infrastructure,
            services,
            cors,
            telemetry,
            health,
            health_checks,
            routes,
            domain_services,
        }
    }
}

impl fmt::Debug for ApplicationBuilder {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ApplicationBuilder")
            .field("host", &self.host)
            .field("state", &self.state)
            .field("callbacks", &self.callbacks.len())
            .field("findings", &self.diagnostics.len())
            .finish_non_exhaustive()
    }
}
