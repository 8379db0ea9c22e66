use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::environment::HostEnvironment;

/// Output format of the host log subscriber.
///
/// When the host configuration leaves the format unset it follows the hosting
/// environment; see [`LogFormat::for_environment`].
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, EnumString, Display)]
#[serde(try_from = "String", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, flattened for log shippers.
    Json,
    /// Single-line human-readable output.
    Compact,
}

impl LogFormat {
    /// Format used when none is configured: compact lines on a developer
    /// machine, JSON everywhere else.
    #[must_use]
    pub const fn for_environment(environment: HostEnvironment) -> Self {
        if environment.is_development() {
            Self::Compact
        } else {
            Self::Json
        }
    }
}

impl TryFrom<String> for LogFormat {
    type Error = LogFormatParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(HostEnvironment::Development, LogFormat::Compact)]
    #[case(HostEnvironment::Staging, LogFormat::Json)]
    #[case(HostEnvironment::Production, LogFormat::Json)]
    fn unset_format_follows_the_environment(
        #[case] environment: HostEnvironment,
        #[case] expected: LogFormat,
    ) {
        assert_eq!(LogFormat::for_environment(environment), expected);
    }

    #[test]
    fn settings_values_ignore_case() {
        let parsed: LogFormat = serde_json::from_value(json!("COMPACT")).expect("format parses");
        assert_eq!(parsed, LogFormat::Compact);
        assert_eq!(LogFormat::Json.to_string(), "json");
    }
}
