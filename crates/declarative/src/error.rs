//! Error types for provider operations
//!
//! Errors fall into three classes that map onto how they are reported:
//! configuration problems the practitioner can fix, failures of the remote
//! API collaborator, and internal provider bugs.

use crate::types::Diagnostic;
use std::fmt;
use thiserror::Error;

/// Boxed error from a collaborator (usually the API client)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, Error>;

/// Class of a provider error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing, unknown or invalid configuration
    Configuration,
    /// A call to the remote API failed
    Remote,
    /// Provider bug or protocol misuse
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Remote => write!(f, "remote"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Errors that abort a provider operation
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing configuration
    #[error("{summary}: {detail}")]
    Config {
        summary: String,
        detail: String,
        attribute: Option<String>,
    },

    /// A remote call failed
    #[error("{summary}: {detail}, unexpected error: {source}")]
    Remote {
        /// Static title, e.g. "Error creating role"
        summary: String,
        /// Static detail prefix, e.g. "Could not create role"
        detail: String,
        #[source]
        source: BoxError,
    },

    /// Desired relation names that match no remote entity
    #[error("unresolved {relation} reference(s): {}", names.join(", "))]
    UnresolvedReference {
        relation: String,
        names: Vec<String>,
    },

    /// Attributes changed that cannot be updated in place
    #[error("{resource_type} cannot be updated in place, changed: {}", attributes.join(", "))]
    RequiresReplace {
        resource_type: String,
        attributes: Vec<String>,
    },

    /// Provider bug or lifecycle misuse
    #[error("{summary}: {detail}")]
    Internal { summary: String, detail: String },

    /// A state or plan record could not be decoded
    #[error("invalid resource record: {0}")]
    Record(#[from] serde_json::Error),

    /// Failed after the remote side was already changed
    #[error("{source}")]
    Incomplete {
        /// Record describing what now exists remotely
        state: Box<serde_json::Value>,
        source: Box<Error>,
    },
}

impl Error {
    /// Create a configuration error bound to an attribute
    pub fn config(
        attribute: impl Into<String>,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Config {
            summary: summary.into(),
            detail: detail.into(),
            attribute: Some(attribute.into()),
        }
    }

    /// Create an internal error
    pub fn internal(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Internal {
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    /// Attach the state reached so far to an error
    ///
    /// The orchestrator keeps tracking that state, so an entity created before
    /// the failure is not orphaned.
    pub fn incomplete<M: serde::Serialize>(state: &M, source: Self) -> Self {
        match serde_json::to_value(state) {
            Ok(state) => Self::Incomplete {
                state: Box::new(state),
                source: Box::new(source),
            },
            Err(_) => source,
        }
    }

    /// State reached before an incomplete operation failed
    pub fn partial_state(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Incomplete { state, .. } => Some(&**state),
            _ => None,
        }
    }

    /// Get the class of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Incomplete { source, .. } => source.class(),
            Self::Config { .. } | Self::UnresolvedReference { .. } | Self::RequiresReplace { .. } => {
                ErrorClass::Configuration
            }
            Self::Remote { .. } => ErrorClass::Remote,
            Self::Internal { .. } | Self::Record(_) => ErrorClass::Internal,
        }
    }

    /// Convert into a user-facing diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Incomplete { source, .. } => source.to_diagnostic(),
            Self::Config {
                summary,
                detail,
                attribute,
            } => {
                let diag = Diagnostic::error(summary, detail);
                match attribute {
                    Some(attr) => diag.with_attribute(attr),
                    None => diag,
                }
            }
            Self::Remote {
                summary,
                detail,
                source,
            } => Diagnostic::error(summary, format!("{detail}, unexpected error: {source}")),
            Self::UnresolvedReference { relation, names } => Diagnostic::error(
                "Unresolved reference",
                format!(
                    "No {relation} named {} exists on the platform. \
                     Create it first or remove it from the configuration.",
                    names
                        .iter()
                        .map(|n| format!("\"{n}\""))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ),
            Self::RequiresReplace {
                resource_type,
                attributes,
            } => Diagnostic::error(
                "Resource requires replacement",
                format!(
                    "{resource_type} does not support in-place update of: {}. \
                     The resource must be replaced.",
                    attributes.join(", ")
                ),
            ),
            Self::Internal { summary, detail } => Diagnostic::error(
                summary,
                format!("{detail}. Please report this issue to the provider developers."),
            ),
            Self::Record(err) => Diagnostic::error(
                "Invalid resource record",
                format!("The resource record could not be decoded: {err}"),
            ),
        }
    }
}

/// Attach a static title and detail to a failed remote call
///
/// Mirrors `anyhow::Context` for the remote error class:
///
/// ```ignore
/// let role = api.create_role(ctx, &input).remote("Error creating role", "Could not create role")?;
/// ```
pub trait RemoteContext<T> {
    fn remote(self, summary: &str, detail: &str) -> Result<T>;
}

impl<T, E> RemoteContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn remote(self, summary: &str, detail: &str) -> Result<T> {
        self.map_err(|e| Error::Remote {
            summary: summary.to_string(),
            detail: detail.to_string(),
            source: Box::new(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_remote_context_wraps_cause() {
        let result: std::result::Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::Other, "connection reset"));
        let err = result
            .remote("Error creating role", "Could not create role")
            .unwrap_err();

        assert_eq!(err.class(), ErrorClass::Remote);
        let diag = err.to_diagnostic();
        assert_eq!(diag.summary, "Error creating role");
        assert_eq!(
            diag.detail,
            "Could not create role, unexpected error: connection reset"
        );
    }

    #[test]
    fn test_config_error_has_attribute() {
        let err = Error::config("url", "Missing OpenCTI URL", "set it");
        assert_eq!(err.class(), ErrorClass::Configuration);
        assert_eq!(err.to_diagnostic().attribute.as_deref(), Some("url"));
    }

    #[test]
    fn test_unresolved_reference_lists_names() {
        let err = Error::UnresolvedReference {
            relation: "group".to_string(),
            names: vec!["Ghosts".to_string(), "Phantoms".to_string()],
        };
        assert_eq!(err.class(), ErrorClass::Configuration);
        let diag = err.to_diagnostic();
        assert!(diag.detail.contains("\"Ghosts\", \"Phantoms\""));
    }

    #[test]
    fn test_incomplete_keeps_state_and_cause() {
        let cause = Error::internal("Assign failed", "boom");
        let err = Error::incomplete(&serde_json::json!({"id": "role-1"}), cause);

        assert_eq!(err.partial_state().unwrap()["id"], "role-1");
        assert_eq!(err.class(), ErrorClass::Internal);
        assert_eq!(err.to_diagnostic().summary, "Assign failed");
    }

    #[test]
    fn test_internal_error_class() {
        let err = Error::internal("Unconfigured provider", "no client");
        assert_eq!(err.class(), ErrorClass::Internal);
        assert!(err.to_diagnostic().detail.contains("report this issue"));
    }
}
