//! BDD test world: settings, environment, reporter and build outcome for
//! step functions.

use std::cell::RefCell;
use std::sync::Arc;

use serde_json::{Map, Value};

use kindling_config::{ConfigurationTree, HostEnvironment, StaticEnvironment};

use crate::lifecycle::{Application, ApplicationBuilder, HostDescriptor, LifecycleError};

use super::reporter::RecordingLifecycleReporter;

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    environment: HostEnvironment,
    settings: Value,
    variables: StaticEnvironment,
    domain_services: Vec<String>,
    pub reporter: Arc<RecordingLifecycleReporter>,
    builder: Option<ApplicationBuilder>,
    application: Option<Application>,
    build_error: Option<LifecycleError>,
    pub misuse_result: Option<Result<(), LifecycleError>>,
}

impl TestWorld {
    /// Builds a world for a production host with an empty settings document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            environment: HostEnvironment::Production,
            settings: Value::Object(Map::new()),
            variables: StaticEnvironment::new(),
            domain_services: Vec::new(),
            reporter: Arc::new(RecordingLifecycleReporter::default()),
            builder: None,
            application: None,
            build_error: None,
            misuse_result: None,
        }
    }

    /// Selects the hosting environment.
    pub fn use_environment(&mut self, environment: HostEnvironment) {
        self.environment = environment;
    }

    /// Sets a dotted settings key, creating intermediate sections.
    pub fn set_setting(&mut self, key: &str, value: Value) {
        let mut segments: Vec<&str> = key.split('.').collect();
        let Some(leaf) = segments.pop() else {
            return;
        };
        let mut cursor = &mut self.settings;
        for segment in segments {
            let Value::Object(map) = cursor else {
                panic!("settings key '{key}' crosses a scalar");
            };
            cursor = map
                .entry(segment.to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        let Value::Object(map) = cursor else {
            panic!("settings key '{key}' crosses a scalar");
        };
        map.insert(leaf.to_owned(), value);
    }

    /// Sets an environment variable visible to the builder.
    pub fn set_variable(&mut self, name: &str, value: &str) {
        self.variables.set(name, value);
    }

    /// Queues a domain callback that registers `name` as a service.
    pub fn register_domain_service(&mut self, name: &str) {
        self.domain_services.push(name.to_owned());
    }

    fn builder(&mut self) -> &mut ApplicationBuilder {
        if self.builder.is_none() {
            let host = HostDescriptor::new(self.environment, "orders")
                .with_entry_version("1.0.0")
                .with_machine_identity("test-host");
            let settings = ConfigurationTree::from_value(self.settings.clone());
            let mut builder = ApplicationBuilder::new(host, settings)
                .with_environment(self.variables.clone())
                .with_reporter(self.reporter.clone());
            for name in self.domain_services.drain(..) {
                builder
                    .configure_services(move |context| context.add_service(name))
                    .expect("callbacks register before the build");
            }
            self.builder = Some(builder);
        }
        self.builder
            .as_mut()
            .expect("builder was initialised above")
    }

    /// Runs the build once.
    pub fn build(&mut self) {
        if self.application.is_some() || self.build_error.is_some() {
            return;
        }
        match self.builder().build() {
            Ok(application) => self.application = Some(application),
            Err(error) => self.build_error = Some(error),
        }
    }

    /// Registers a callback on the existing builder and keeps the outcome.
    pub fn register_after_build(&mut self) {
        let result = self
            .builder()
            .configure_services(|context| context.add_service("late"))
            .map(|_| ());
        self.misuse_result = Some(result);
    }

    /// Built application, when the gate passed.
    #[must_use]
    pub fn application(&self) -> Option<&Application> {
        self.application.as_ref()
    }

    /// Build error, when the gate failed.
    #[must_use]
    pub fn build_error(&self) -> Option<&LifecycleError> {
        self.build_error.as_ref()
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture constructor for the scenario world.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
