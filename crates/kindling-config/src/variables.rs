//! Injectable environment-variable lookup.

use std::collections::BTreeMap;
use std::env;

/// Capability to read environment variables.
///
/// Bootstrap code never touches the process environment directly; it reads
/// through this trait so tests can supply a fixed map.
#[cfg_attr(test, mockall::automock)]
pub trait EnvironmentVariables {
    /// Returns the value of `name`, or `None` when unset or not valid UTF-8.
    fn var(&self, name: &str) -> Option<String>;
}

impl<T> EnvironmentVariables for &T
where
    T: EnvironmentVariables + ?Sized,
{
    fn var(&self, name: &str) -> Option<String> {
        (**self).var(name)
    }
}

/// Reads the real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl EnvironmentVariables for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

/// Fixed set of variables, used by tests and embedded hosts.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StaticEnvironment {
    variables: BTreeMap<String, String>,
}

impl StaticEnvironment {
    /// Builds an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a variable.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Adds or replaces a variable in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }
}

impl EnvironmentVariables for StaticEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.variables.get(name).cloned()
    }
}

impl<K, V> FromIterator<(K, V)> for StaticEnvironment
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            variables: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;

    fn read<E: EnvironmentVariables>(environment: E, name: &str) -> Option<String> {
        environment.var(name)
    }

    #[test]
    fn static_environment_returns_configured_values() {
        let environment = StaticEnvironment::new().with("OTEL_EXPORTER_OTLP_ENDPOINT", "http://x");
        assert_eq!(
            environment.var("OTEL_EXPORTER_OTLP_ENDPOINT").as_deref(),
            Some("http://x")
        );
        assert_eq!(environment.var("UNSET"), None);
    }

    #[test]
    fn references_delegate_to_the_underlying_lookup() {
        let mut mock = MockEnvironmentVariables::new();
        mock.expect_var()
            .with(eq("APP_NAME"))
            .times(1)
            .returning(|_| Some("orders".to_owned()));

        assert_eq!(read(&mock, "APP_NAME").as_deref(), Some("orders"));
    }

    #[test]
    fn collects_from_pairs() {
        let environment: StaticEnvironment = [("A", "1"), ("B", "2")].into_iter().collect();
        assert_eq!(environment.var("B").as_deref(), Some("2"));
    }
}
