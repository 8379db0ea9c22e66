//! Structured reporting for bootstrap lifecycle events.

use std::sync::Arc;

use crate::lifecycle::{HostDescriptor, LifecycleError, Phase};
use crate::plan::ServicePlan;

const REPORTER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Observer trait used to surface lifecycle events to telemetry sinks.
#[cfg_attr(test, mockall::automock)]
pub trait LifecycleReporter: Send + Sync {
    /// Invoked when the builder starts configuring.
    fn bootstrap_starting(&self, host: &HostDescriptor);

    /// Invoked after each configuration phase.
    fn phase_completed(&self, phase: Phase);

    /// Invoked once the gate passes and the application is built.
    fn bootstrap_succeeded(&self, plan: &ServicePlan);

    /// Invoked when the build attempt fails.
    fn bootstrap_failed(&self, error: &LifecycleError);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter,
{
    fn bootstrap_starting(&self, host: &HostDescriptor) {
        (**self).bootstrap_starting(host);
    }

    fn phase_completed(&self, phase: Phase) {
        (**self).phase_completed(phase);
    }

    fn bootstrap_succeeded(&self, plan: &ServicePlan) {
        (**self).bootstrap_succeeded(plan);
    }

    fn bootstrap_failed(&self, error: &LifecycleError) {
        (**self).bootstrap_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn bootstrap_starting(&self, host: &HostDescriptor) {
        tracing::info!(
            target: REPORTER_TARGET,
            event = "bootstrap_starting",
            environment = %host.environment(),
            application = %host.application_name(),
            version = %host.entry_version(),
            "starting service bootstrap"
        );
    }

    fn phase_completed(&self, phase: Phase) {
        tracing::debug!(
            target: REPORTER_TARGET,
            event = "phase_completed",
            phase = %phase,
            "configuration phase completed"
        );
    }

    fn bootstrap_succeeded(&self, plan: &ServicePlan) {
        let telemetry = plan.telemetry();
        tracing::info!(
            target: REPORTER_TARGET,
            event = "bootstrap_succeeded",
            routes = plan.routes().len(),
            health = plan.health().is_some(),
            otlp = telemetry.otlp_enabled(),
            azure_monitor = telemetry.azure_monitor_enabled(),
            sampling_ratio = telemetry.sampling_ratio(),
            domain_services = plan.domain_services().len(),
            "service bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &LifecycleError) {
        tracing::error!(
            target: REPORTER_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "service bootstrap failed"
        );
    }
}
