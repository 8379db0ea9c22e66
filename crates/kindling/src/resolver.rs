//! Ordered lookup over candidate value sources.
//!
//! A resolution chain lists the places a setting may come from, highest
//! precedence first. Sources are evaluated lazily, left to right, and the
//! first one yielding a non-blank string wins. A missing source, an empty
//! string and a whitespace-only string are all treated as absent.

use std::fmt;

use kindling_config::{ConfigurationTree, EnvironmentVariables};

/// Outcome of a resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue<T> {
    value: Option<T>,
    source_index: Option<usize>,
}

impl<T> ResolvedValue<T> {
    /// A resolution that exhausted every source.
    #[must_use]
    pub const fn missing() -> Self {
        Self {
            value: None,
            source_index: None,
        }
    }

    /// A resolution satisfied by the source at `source_index`.
    #[must_use]
    pub const fn found_at(value: T, source_index: usize) -> Self {
        Self {
            value: Some(value),
            source_index: Some(source_index),
        }
    }

    /// Returns true when some source produced a value.
    #[must_use]
    pub const fn found(&self) -> bool {
        self.value.is_some()
    }

    /// Borrow of the resolved value.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Zero-based index of the satisfying source.
    #[must_use]
    pub const fn source_index(&self) -> Option<usize> {
        self.source_index
    }

    /// Consumes the resolution, returning the value.
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        self.value
    }
}

/// Evaluates `sources` in order and returns the first non-blank value.
///
/// Sources after the satisfying one are never invoked.
pub fn resolve<I, F>(sources: I) -> ResolvedValue<String>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Option<String>,
{
    sources
        .into_iter()
        .enumerate()
        .find_map(|(index, source)| {
            source()
                .filter(|candidate| !candidate.trim().is_empty())
                .map(|value| ResolvedValue::found_at(value, index))
        })
        .unwrap_or_else(ResolvedValue::missing)
}

type Lookup<'a> = Box<dyn Fn() -> Option<String> + 'a>;

struct Source<'a> {
    label: String,
    lookup: Lookup<'a>,
}

/// Builder for a resolution chain with labelled sources.
///
/// Labels only serve diagnostics: they let log lines say which source won
/// without exposing the value itself.
#[derive(Default)]
pub struct ResolutionChain<'a> {
    sources: Vec<Source<'a>>,
}

impl<'a> ResolutionChain<'a> {
    /// Starts an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Appends an arbitrary source.
    #[must_use]
    pub fn source(
        mut self,
        label: impl Into<String>,
        lookup: impl Fn() -> Option<String> + 'a,
    ) -> Self {
        self.sources.push(Source {
            label: label.into(),
            lookup: Box::new(lookup),
        });
        self
    }

    /// Appends an environment-variable lookup.
    #[must_use]
    pub fn env(self, environment: &'a dyn EnvironmentVariables, name: &'a str) -> Self {
        self.source(format!("env:{name}"), move || environment.var(name))
    }

    /// Appends a settings-tree key lookup.
    #[must_use]
    pub fn setting(self, tree: &'a ConfigurationTree, key: &'a str) -> Self {
        self.source(format!("setting:{key}"), move || tree.get_str(key))
    }

    /// Appends a `ConnectionStrings:<name>` lookup.
    #[must_use]
    pub fn connection_string(self, tree: &'a ConfigurationTree, name: &'a str) -> Self {
        self.source(format!("connection-string:{name}"), move || {
            tree.connection_string(name)
        })
    }

    /// Appends an in-memory value, typically a bound options field.
    #[must_use]
    pub fn fallback(self, label: &str, value: Option<&'a str>) -> Self {
        self.source(format!("fallback:{label}"), move || value.map(str::to_owned))
    }

    /// Appends a built-in default that always resolves.
    #[must_use]
    pub fn default_value(self, value: &'a str) -> Self {
        self.source("default", move || Some(value.to_owned()))
    }

    /// Number of sources in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns true when the chain has no sources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Label of the source at `index`.
    #[must_use]
    pub fn label(&self, index: usize) -> Option<&str> {
        self.sources.get(index).map(|source| source.label.as_str())
    }

    /// Runs the chain.
    #[must_use]
    pub fn resolve(&self) -> ResolvedValue<String> {
        resolve(self.sources.iter().map(|source| &source.lookup))
    }
}

impl fmt::Debug for ResolutionChain<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_list()
            .entries(self.sources.iter().map(|source| source.label.as_str()))
            .finish()
    }
}
