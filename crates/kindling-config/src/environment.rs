use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Hosting environment a service is started in.
///
/// The environment selects defaults (trace sampling, Azure Monitor sampling)
/// and decides whether advisory checks such as "health endpoints disabled"
/// apply.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(try_from = "String")]
#[strum(ascii_case_insensitive)]
pub enum HostEnvironment {
    /// Local development.
    Development,
    /// Pre-production deployment.
    Staging,
    /// Production deployment.
    #[default]
    Production,
}

impl HostEnvironment {
    /// Returns true for [`HostEnvironment::Development`].
    #[must_use]
    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns true for [`HostEnvironment::Production`].
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Name used for environment-specific settings overlays.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "Development",
            Self::Staging => "Staging",
            Self::Production => "Production",
        }
    }
}

/// Errors encountered while parsing a [`HostEnvironment`] from text.
pub type HostEnvironmentParseError = strum::ParseError;

// Serde goes through the same parser as the CLI and environment layers.
impl TryFrom<String> for HostEnvironment {
    type Error = HostEnvironmentParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case("development", HostEnvironment::Development)]
    #[case("Staging", HostEnvironment::Staging)]
    #[case("PRODUCTION", HostEnvironment::Production)]
    fn parses_names_case_insensitively(#[case] input: &str, #[case] expected: HostEnvironment) {
        assert_eq!(input.parse::<HostEnvironment>().ok(), Some(expected));
    }

    #[rstest]
    #[case("PRODUCTION", HostEnvironment::Production)]
    #[case("staging", HostEnvironment::Staging)]
    #[case("Development", HostEnvironment::Development)]
    fn deserialises_names_case_insensitively(
        #[case] input: &str,
        #[case] expected: HostEnvironment,
    ) {
        let parsed: HostEnvironment =
            serde_json::from_value(json!(input)).expect("environment deserialises");
        assert_eq!(parsed, expected);
    }

    #[test]
    fn deserialising_unknown_environment_fails() {
        assert!(serde_json::from_value::<HostEnvironment>(json!("qa")).is_err());
    }

    #[test]
    fn rejects_unknown_environment() {
        assert!("qa".parse::<HostEnvironment>().is_err());
    }

    #[test]
    fn display_matches_overlay_name() {
        for environment in [
            HostEnvironment::Development,
            HostEnvironment::Staging,
            HostEnvironment::Production,
        ] {
            assert_eq!(environment.to_string(), environment.as_str());
        }
    }
}
