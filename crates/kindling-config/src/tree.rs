//! Read-only view over the layered settings document.
//!
//! Keys are paths whose segments are separated by `:` or `.`, and segment
//! matching is ASCII case-insensitive, so `telemetry.otlp.endpoint`,
//! `Telemetry:Otlp:Endpoint` and `TELEMETRY.OTLP.ENDPOINT` address the same
//! value. Typed sections are bound with serde; keys in a bound section are
//! folded onto the option type's field names, so PascalCase documents bind
//! the same way as camelCase ones.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::environment::HostEnvironment;

/// Hierarchical settings document with path-style lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationTree {
    root: Value,
}

impl Default for ConfigurationTree {
    fn default() -> Self {
        Self::empty()
    }
}

impl ConfigurationTree {
    /// Builds a tree without any keys.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Wraps an existing JSON value. Non-object roots yield an empty tree.
    #[must_use]
    pub fn from_value(root: Value) -> Self {
        match root {
            Value::Object(_) => Self { root },
            _ => Self::empty(),
        }
    }

    /// Reads a single settings document from disk.
    ///
    /// A missing file is reported as `Ok(None)` so callers can decide whether
    /// the layer is optional.
    pub fn read_file(path: &Utf8Path) -> Result<Option<Self>, SettingsError> {
        match fs::read_to_string(path) {
            Ok(text) => parse_document(&text, path).map(Some),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Loads the base document and merges the environment overlay over it.
    ///
    /// Both layers are optional: a host without any settings file starts from
    /// an empty tree and relies on defaults and environment overrides.
    pub fn load_layered(
        base: &Utf8Path,
        environment: HostEnvironment,
    ) -> Result<Self, SettingsError> {
        let mut tree = Self::read_file(base)?.unwrap_or_default();
        if let Some(overlay_path) = overlay_path(base, environment)
            && let Some(overlay) = Self::read_file(&overlay_path)?
        {
            tree.merge(overlay);
        }
        Ok(tree)
    }

    /// Deep-merges `overlay` into this tree. Objects merge key by key; any
    /// other value in the overlay replaces the existing one.
    pub fn merge(&mut self, overlay: Self) {
        merge_values(&mut self.root, overlay.root);
    }

    /// Returns the raw value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        segments(key).try_fold(&self.root, |value, segment| lookup(value, segment))
    }

    /// Returns the scalar under `key` rendered as text.
    ///
    /// Numbers and booleans are rendered with their JSON spelling; objects,
    /// arrays and nulls are treated as absent.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Looks up `ConnectionStrings:<name>`.
    #[must_use]
    pub fn connection_string(&self, name: &str) -> Option<String> {
        self.get_str(&format!("ConnectionStrings:{name}"))
    }

    /// Binds the section under `key` to a typed options value.
    ///
    /// Absent and `null` sections bind to `T::default()`. Object keys are
    /// matched against the serialised field names of `T::default()` ignoring
    /// ASCII case, at every nesting level.
    pub fn bind<T>(&self, key: &str) -> Result<T, BindError>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        let value = match self.get(key) {
            None | Some(Value::Null) => return Ok(T::default()),
            Some(value) => value.clone(),
        };
        let bind_error = |source| BindError {
            section: key.to_owned(),
            source,
        };
        let shape = serde_json::to_value(T::default()).map_err(bind_error)?;
        serde_json::from_value(fold_keys(value, &shape)).map_err(bind_error)
    }
}

fn fold_keys(value: Value, shape: &Value) -> Value {
    match (value, shape) {
        (Value::Object(entries), Value::Object(fields)) => entries
            .into_iter()
            .map(|(name, child)| {
                match fields.iter().find(|(field, _)| field.eq_ignore_ascii_case(&name)) {
                    Some((field, nested)) => (field.clone(), fold_keys(child, nested)),
                    None => (name, child),
                }
            })
            .collect::<Map<_, _>>()
            .into(),
        (value, _) => value,
    }
}

fn parse_document(text: &str, path: &Utf8Path) -> Result<ConfigurationTree, SettingsError> {
    let root: Value = serde_json::from_str(text).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if !root.is_object() {
        return Err(SettingsError::NotAnObject {
            path: path.to_path_buf(),
        });
    }
    Ok(ConfigurationTree { root })
}

fn overlay_path(base: &Utf8Path, environment: HostEnvironment) -> Option<Utf8PathBuf> {
    let stem = base.file_stem()?;
    let name = match base.extension() {
        Some(extension) => format!("{stem}.{}.{extension}", environment.as_str()),
        None => format!("{stem}.{}", environment.as_str()),
    };
    Some(base.with_file_name(name))
}

fn segments(key: &str) -> impl Iterator<Item = &str> {
    key.split([':', '.'])
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
}

fn lookup<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    let Value::Object(map) = value else {
        return None;
    };
    map.get(segment).or_else(|| {
        map.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(segment))
            .map(|(_, child)| child)
    })
}

fn merge_values(target: &mut Value, overlay: Value) {
    match (target, overlay) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                let slot = existing
                    .iter_mut()
                    .find(|(name, _)| name.eq_ignore_ascii_case(&key))
                    .map(|(_, child)| child);
                match slot {
                    Some(child) => merge_values(child, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Errors raised while reading settings documents.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read settings file '{path}': {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// The settings file is not valid JSON.
    #[error("failed to parse settings file '{path}': {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The document root is not a JSON object.
    #[error("settings document '{path}' must contain a JSON object at the root")]
    NotAnObject { path: Utf8PathBuf },
}

/// A settings section could not be bound to its typed options.
#[derive(Debug, Error)]
#[error("invalid settings section '{section}': {source}")]
pub struct BindError {
    section: String,
    #[source]
    source: serde_json::Error,
}

impl BindError {
    /// Key of the section that failed to bind.
    #[must_use]
    pub fn section(&self) -> &str {
        self.section.as_str()
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::options::{HealthOptions, TelemetryOptions};

    #[fixture]
    fn tree() -> ConfigurationTree {
        ConfigurationTree::from_value(json!({
            "Telemetry": {
                "Otlp": { "Endpoint": "http://collector:4317" },
                "traceSamplingRatio": 0.5,
                "disabled": "true"
            },
            "ConnectionStrings": { "AzureMonitor": "InstrumentationKey=abc" },
            "health": { "enabled": true, "baseUri": "/status" }
        }))
    }

    #[rstest]
    #[case("telemetry.otlp.endpoint")]
    #[case("Telemetry:Otlp:Endpoint")]
    #[case("TELEMETRY:otlp.ENDPOINT")]
    fn lookups_ignore_case_and_separator(tree: ConfigurationTree, #[case] key: &str) {
        assert_eq!(tree.get_str(key).as_deref(), Some("http://collector:4317"));
    }

    #[rstest]
    fn scalars_render_as_text(tree: ConfigurationTree) {
        assert_eq!(
            tree.get_str("telemetry.traceSamplingRatio").as_deref(),
            Some("0.5")
        );
        assert_eq!(tree.get_str("telemetry.otlp"), None);
        assert_eq!(tree.get_str("telemetry.disabled").as_deref(), Some("true"));
        assert_eq!(tree.get_str("health.enabled").as_deref(), Some("true"));
    }

    #[rstest]
    fn reads_named_connection_strings(tree: ConfigurationTree) {
        assert_eq!(
            tree.connection_string("azuremonitor").as_deref(),
            Some("InstrumentationKey=abc")
        );
        assert_eq!(tree.connection_string("Database"), None);
    }

    #[rstest]
    fn binds_sections_and_defaults_missing_ones(tree: ConfigurationTree) {
        let health: HealthOptions = tree.bind("health").expect("health binds");
        assert!(health.enabled);
        assert_eq!(health.base_uri.as_deref(), Some("/status"));

        let missing: HealthOptions = tree.bind("nowhere").expect("absent binds to default");
        assert_eq!(missing, HealthOptions::default());
    }

    #[test]
    fn binds_pascal_case_sections() {
        let tree = ConfigurationTree::from_value(json!({
            "Telemetry": {
                "Otlp": { "Endpoint": "http://collector:4318", "Protocol": "HttpProtobuf" },
                "TraceSamplingRatio": 0.5,
                "AzureMonitor": { "ConnectionString": "InstrumentationKey=abc" }
            },
            "Health": { "Enabled": true, "BaseUri": "/status" }
        }));

        let telemetry: TelemetryOptions = tree.bind("telemetry").expect("telemetry binds");
        assert_eq!(telemetry.otlp.endpoint.as_deref(), Some("http://collector:4318"));
        assert_eq!(telemetry.otlp.protocol.as_deref(), Some("HttpProtobuf"));
        assert_eq!(telemetry.trace_sampling_ratio, Some(0.5));
        assert_eq!(
            telemetry.azure_monitor.connection_string.as_deref(),
            Some("InstrumentationKey=abc")
        );

        let health: HealthOptions = tree.bind("Health").expect("health binds");
        assert!(health.enabled);
        assert_eq!(health.base_uri.as_deref(), Some("/status"));
    }

    #[test]
    fn bind_errors_name_the_section() {
        let tree = ConfigurationTree::from_value(json!({ "health": { "enabled": "sometimes" } }));
        let error = tree
            .bind::<HealthOptions>("health")
            .expect_err("string flag should not bind");
        assert_eq!(error.section(), "health");
    }

    #[test]
    fn merge_overrides_nested_values_case_insensitively() {
        let mut base = ConfigurationTree::from_value(json!({
            "Telemetry": { "Otlp": { "Endpoint": "http://a", "Protocol": "grpc" } }
        }));
        base.merge(ConfigurationTree::from_value(json!({
            "telemetry": { "otlp": { "endpoint": "http://b" } }
        })));

        assert_eq!(base.get_str("telemetry.otlp.endpoint").as_deref(), Some("http://b"));
        assert_eq!(base.get_str("telemetry.otlp.protocol").as_deref(), Some("grpc"));
    }

    #[test]
    fn rejects_non_object_documents() {
        let dir = TempDir::new().expect("create temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("appsettings.json"))
            .expect("temp path is UTF-8");
        fs::write(&path, "[1, 2]").expect("write array settings");

        let error = ConfigurationTree::read_file(&path).expect_err("arrays are rejected");
        assert!(matches!(error, SettingsError::NotAnObject { .. }));
    }

    #[test]
    fn layered_load_applies_environment_overlay() {
        let dir = TempDir::new().expect("create temp dir");
        let base = Utf8PathBuf::from_path_buf(dir.path().join("appsettings.json"))
            .expect("temp path is UTF-8");
        fs::write(&base, r#"{ "health": { "enabled": false, "baseUri": "/h" } }"#)
            .expect("write base settings");
        fs::write(
            dir.path().join("appsettings.Development.json"),
            r#"{ "health": { "enabled": true } }"#,
        )
        .expect("write overlay settings");

        let development = ConfigurationTree::load_layered(&base, HostEnvironment::Development)
            .expect("layered load succeeds");
        assert_eq!(development.get("health.enabled"), Some(&json!(true)));
        assert_eq!(development.get_str("health.baseUri").as_deref(), Some("/h"));

        let production = ConfigurationTree::load_layered(&base, HostEnvironment::Production)
            .expect("missing overlay is skipped");
        assert_eq!(production.get("health.enabled"), Some(&json!(false)));
    }

    #[test]
    fn missing_base_document_yields_empty_tree() {
        let dir = TempDir::new().expect("create temp dir");
        let base = Utf8PathBuf::from_path_buf(dir.path().join("absent.json"))
            .expect("temp path is UTF-8");
        let tree = ConfigurationTree::load_layered(&base, HostEnvironment::Staging)
            .expect("absent settings are not an error");
        assert_eq!(tree, ConfigurationTree::empty());
    }

    #[test]
    fn malformed_documents_report_their_path() {
        let dir = TempDir::new().expect("create temp dir");
        let base = Utf8PathBuf::from_path_buf(dir.path().join("appsettings.json"))
            .expect("temp path is UTF-8");
        fs::write(&base, "{ not json").expect("write malformed settings");

        let error = ConfigurationTree::load_layered(&base, HostEnvironment::Production)
            .expect_err("malformed settings fail");
        match error {
            SettingsError::Parse { path, .. } => assert_eq!(path, base),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
