//! Provider configuration
//!
//! Settings arrive in the Configure request. `url` and `token` fall back to
//! the `OPENCTI_URL` and `OPENCTI_TOKEN` environment variables; a value set in
//! configuration always wins.

use declarative::schema::REDACTED;
use declarative::{Attribute, AttributeType, Diagnostic, Diagnostics, Schema, UnresolvedPolicy};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::time::Duration;

pub const URL_ENV: &str = "OPENCTI_URL";
pub const TOKEN_ENV: &str = "OPENCTI_TOKEN";

/// Per-call timeout when none is configured
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Longest accepted timeout, one day
pub const MAX_TIMEOUT_SECONDS: u64 = 86_400;

/// A configuration value as planned by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Setting<T> {
    /// Not set
    #[default]
    Null,
    /// Set, but not resolvable until apply
    Unknown,
    Known(T),
}

/// Wire form: `null`, `{"unknown": true}` or the value itself
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSetting<T> {
    Unknown { unknown: bool },
    Known(T),
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Setting<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<RawSetting<T>>::deserialize(deserializer)? {
            None | Some(RawSetting::Unknown { unknown: false }) => Self::Null,
            Some(RawSetting::Unknown { unknown: true }) => Self::Unknown,
            Some(RawSetting::Known(value)) => Self::Known(value),
        })
    }
}

impl<T> Setting<T> {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// The known value, if any
    pub fn known(self) -> Option<T> {
        match self {
            Self::Known(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for Setting<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Known)
    }
}

/// A secret that never shows up in Debug or Display output
#[derive(Clone, PartialEq, Eq)]
pub struct Sensitive(String);

impl Sensitive {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The secret itself; only for handing to the API client
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Sensitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sensitive({REDACTED})")
    }
}

impl fmt::Display for Sensitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

/// Provider settings from the Configure request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub url: Setting<String>,
    pub token: Setting<String>,
    pub timeout_seconds: Setting<u64>,
    pub strict_references: Setting<bool>,
}

/// Settings after environment fallback and validation
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub url: String,
    pub token: Sensitive,
    pub timeout: Duration,
    pub policy: UnresolvedPolicy,
}

impl ProviderConfig {
    /// Schema of the provider block
    pub fn schema() -> Schema {
        Schema::new()
            .with_description("Manage OpenCTI platform administration entities.")
            .attribute(
                "url",
                Attribute::optional(AttributeType::String).with_description(format!(
                    "URL of the OpenCTI platform. May also be provided via the {URL_ENV} environment variable."
                )),
            )
            .attribute(
                "token",
                Attribute::optional(AttributeType::String)
                    .sensitive()
                    .with_description(format!(
                        "API token of an administrator. May also be provided via the {TOKEN_ENV} environment variable."
                    )),
            )
            .attribute(
                "timeout_seconds",
                Attribute::optional(AttributeType::Number).with_description(format!(
                    "Timeout of a single API call in seconds. Defaults to {DEFAULT_TIMEOUT_SECONDS}."
                )),
            )
            .attribute(
                "strict_references",
                Attribute::optional(AttributeType::Bool).with_description(
                    "Fail when a role, group, capability or marking named in a resource does not \
                     exist. When false, unknown names are skipped with a warning. Defaults to true.",
                ),
            )
    }

    /// Resolve settings against the environment
    ///
    /// Unknown values are reported first; missing values are only checked
    /// once everything is known. All problems of one stage are reported
    /// together.
    pub fn resolve<E>(self, env: E) -> Result<ResolvedConfig, Diagnostics>
    where
        E: Fn(&str) -> Option<String>,
    {
        let mut diagnostics = Diagnostics::new();

        if self.url.is_unknown() {
            diagnostics.push(unknown("url", "Unknown OpenCTI URL", "URL", URL_ENV));
        }
        if self.token.is_unknown() {
            diagnostics.push(unknown("token", "Unknown OpenCTI token", "token", TOKEN_ENV));
        }
        if self.timeout_seconds.is_unknown() {
            diagnostics.push(
                Diagnostic::error(
                    "Unknown OpenCTI timeout",
                    "The provider cannot create the OpenCTI API client as there is an unknown \
                     configuration value for timeout_seconds. Set the value statically in the \
                     configuration or remove it.",
                )
                .with_attribute("timeout_seconds"),
            );
        }
        if diagnostics.has_error() {
            return Err(diagnostics);
        }

        let url = self.url.known().or_else(|| env(URL_ENV)).unwrap_or_default();
        let token = self.token.known().or_else(|| env(TOKEN_ENV)).unwrap_or_default();

        if url.trim().is_empty() {
            diagnostics.push(missing("url", "Missing OpenCTI URL", "URL", URL_ENV));
        }
        if token.trim().is_empty() {
            diagnostics.push(missing("token", "Missing OpenCTI token", "token", TOKEN_ENV));
        }

        let timeout_seconds = self
            .timeout_seconds
            .known()
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        if !(1..=MAX_TIMEOUT_SECONDS).contains(&timeout_seconds) {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid OpenCTI timeout",
                    format!("timeout_seconds must be between 1 and {MAX_TIMEOUT_SECONDS}."),
                )
                .with_attribute("timeout_seconds"),
            );
        }

        if diagnostics.has_error() {
            return Err(diagnostics);
        }

        // Unknown strictness keeps the safe default
        let policy = match self.strict_references.known() {
            Some(false) => UnresolvedPolicy::Ignore,
            _ => UnresolvedPolicy::Fail,
        };

        Ok(ResolvedConfig {
            url: url.trim().trim_end_matches('/').to_string(),
            token: Sensitive::new(token.trim()),
            timeout: Duration::from_secs(timeout_seconds),
            policy,
        })
    }
}

/// Read a variable from the process environment
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn unknown(attribute: &str, summary: &str, what: &str, env: &str) -> Diagnostic {
    Diagnostic::error(
        summary,
        format!(
            "The provider cannot create the OpenCTI API client as there is an unknown \
             configuration value for the OpenCTI {what}. Either apply the source of the value \
             first, set the value statically in the configuration, or use the {env} \
             environment variable."
        ),
    )
    .with_attribute(attribute)
}

fn missing(attribute: &str, summary: &str, what: &str, env: &str) -> Diagnostic {
    Diagnostic::error(
        summary,
        format!(
            "The provider cannot create the OpenCTI API client as there is a missing or empty \
             value for the OpenCTI {what}. Set the {attribute} value in the configuration or \
             use the {env} environment variable. If either is already set, ensure the value is \
             not empty."
        ),
    )
    .with_attribute(attribute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn parse(value: serde_json::Value) -> ProviderConfig {
        serde_json::from_value(value).unwrap()
    }

    fn summaries(diagnostics: &Diagnostics) -> Vec<String> {
        diagnostics.iter().map(|d| d.summary.clone()).collect()
    }

    #[test]
    fn test_setting_wire_forms() {
        let config = parse(json!({
            "url": "https://cti.example.com",
            "token": {"unknown": true},
            "timeout_seconds": null
        }));
        assert_eq!(config.url, Setting::Known("https://cti.example.com".to_string()));
        assert_eq!(config.token, Setting::Unknown);
        assert_eq!(config.timeout_seconds, Setting::Null);
        assert_eq!(config.strict_references, Setting::Null);
    }

    #[test]
    fn test_explicit_values_win_over_env() {
        let config = parse(json!({"url": "https://explicit/", "token": "explicit-token"}));
        let resolved = config
            .resolve(env(&[(URL_ENV, "https://env"), (TOKEN_ENV, "env-token")]))
            .unwrap();

        assert_eq!(resolved.url, "https://explicit");
        assert_eq!(resolved.token.expose(), "explicit-token");
        assert_eq!(resolved.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECONDS));
        assert_eq!(resolved.policy, UnresolvedPolicy::Fail);
    }

    #[test]
    fn test_env_fallback() {
        let resolved = ProviderConfig::default()
            .resolve(env(&[(URL_ENV, "https://env"), (TOKEN_ENV, "env-token")]))
            .unwrap();
        assert_eq!(resolved.url, "https://env");
        assert_eq!(resolved.token.expose(), "env-token");
    }

    #[test]
    fn test_unknown_values_reported_together() {
        let config = parse(json!({"url": {"unknown": true}, "token": {"unknown": true}}));
        let diagnostics = config.resolve(env(&[])).unwrap_err();

        assert_eq!(
            summaries(&diagnostics),
            vec!["Unknown OpenCTI URL", "Unknown OpenCTI token"]
        );
        let attributes: Vec<_> = diagnostics
            .iter()
            .map(|d| d.attribute.clone().unwrap())
            .collect();
        assert_eq!(attributes, vec!["url", "token"]);
    }

    #[test]
    fn test_missing_values_reported_together() {
        let config = parse(json!({"url": "", "token": "  "}));
        let diagnostics = config.resolve(env(&[])).unwrap_err();
        assert_eq!(
            summaries(&diagnostics),
            vec!["Missing OpenCTI URL", "Missing OpenCTI token"]
        );
    }

    #[test]
    fn test_missing_token_only() {
        let config = parse(json!({"url": "https://cti"}));
        let diagnostics = config.resolve(env(&[])).unwrap_err();
        assert_eq!(summaries(&diagnostics), vec!["Missing OpenCTI token"]);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = parse(json!({"url": "https://cti", "token": "t", "timeout_seconds": 0}));
        let diagnostics = config.resolve(env(&[])).unwrap_err();
        assert_eq!(summaries(&diagnostics), vec!["Invalid OpenCTI timeout"]);
    }

    #[test]
    fn test_oversized_timeout_rejected() {
        let config = parse(json!({
            "url": "https://cti",
            "token": "t",
            "timeout_seconds": u64::MAX
        }));
        let diagnostics = config.resolve(env(&[])).unwrap_err();
        assert_eq!(summaries(&diagnostics), vec!["Invalid OpenCTI timeout"]);

        let config = parse(json!({
            "url": "https://cti",
            "token": "t",
            "timeout_seconds": MAX_TIMEOUT_SECONDS
        }));
        assert!(config.resolve(env(&[])).is_ok());
    }

    #[test]
    fn test_lenient_references() {
        let config = parse(json!({"url": "https://cti", "token": "t", "strict_references": false}));
        let resolved = config.resolve(env(&[])).unwrap();
        assert_eq!(resolved.policy, UnresolvedPolicy::Ignore);
    }

    #[test]
    fn test_sensitive_is_masked() {
        let token = Sensitive::new("super-secret");
        assert!(!format!("{token}").contains("super-secret"));
        assert!(!format!("{token:?}").contains("super-secret"));

        let resolved = parse(json!({"url": "https://cti", "token": "super-secret"}))
            .resolve(env(&[]))
            .unwrap();
        assert!(!format!("{resolved:?}").contains("super-secret"));
    }

    #[test]
    fn test_schema_marks_token_sensitive() {
        let schema = ProviderConfig::schema();
        assert!(schema.attributes["token"].sensitive);
        assert!(schema.attributes["url"].optional);
    }
}
