//! Recording reporter used to observe the bootstrap lifecycle.

use std::sync::Mutex;

use crate::lifecycle::{HostDescriptor, LifecycleError, Phase};
use crate::plan::ServicePlan;
use crate::reporter::LifecycleReporter;

/// Lifecycle events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Configuring started.
    BootstrapStarting,
    /// A phase completed.
    PhaseCompleted(Phase),
    /// The application was built.
    BootstrapSucceeded,
    /// The build failed with an error description.
    BootstrapFailed(String),
}

/// Records lifecycle events for assertions.
#[derive(Debug, Default)]
pub struct RecordingLifecycleReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingLifecycleReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .clone()
    }

    /// Phases in completion order.
    #[must_use]
    pub fn phases(&self) -> Vec<Phase> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LifecycleEvent::PhaseCompleted(phase) => Some(phase),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .push(event);
    }
}

impl LifecycleReporter for RecordingLifecycleReporter {
    fn bootstrap_starting(&self, _host: &HostDescriptor) {
        self.record(LifecycleEvent::BootstrapStarting);
    }

    fn phase_completed(&self, phase: Phase) {
        self.record(LifecycleEvent::PhaseCompleted(phase));
    }

    fn bootstrap_succeeded(&self, _plan: &ServicePlan) {
        self.record(LifecycleEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &LifecycleError) {
        self.record(LifecycleEvent::BootstrapFailed(error.to_string()));
    }
}
