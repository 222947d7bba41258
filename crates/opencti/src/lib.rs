//! # OpenCTI
//!
//! Blocking client for the administration API of an OpenCTI platform: roles,
//! groups, users, marking definitions, case/task/status templates and
//! vocabularies.
//!
//! ## Overview
//!
//! All calls go through the [`Api`] trait so that callers can swap the live
//! [`GraphqlClient`] for the in-memory [`MockApi`] in tests.
//!
//! ## Example
//!
//! ```no_run
//! use declarative::ApplyContext;
//! use opencti::{Api, GraphqlClient, RoleInput};
//!
//! let client = GraphqlClient::new("https://opencti.example.com", "token");
//! let ctx = ApplyContext::new();
//!
//! let role = client.create_role(&ctx, &RoleInput {
//!     name: "Analyst".to_string(),
//!     description: None,
//! })?;
//! println!("Created role {}", role.id);
//! # Ok::<(), opencti::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`]. Errors carry an
//! [`ErrorCategory`] describing what went wrong and what to do about it.

pub mod api;
pub mod error;
pub mod types;

pub use api::graphql::GraphqlClient;
pub use api::{Api, MockApi, MockCall};
pub use error::{Error, ErrorCategory, Result};
pub use types::{
    CaseTemplate, CaseTemplateInput, ConfidenceLevel, ConfidenceOverride, DEFAULT_MAX_CONFIDENCE,
    EditInput, EntityKind, EntityRef, Group, GroupInput, MarkingDefinition,
    MarkingDefinitionInput, Relation, Role, RoleInput, StatusTemplate, StatusTemplateInput,
    TaskTemplate, TaskTemplateInput, User, UserInput, Vocabulary, VocabularyInput,
};
