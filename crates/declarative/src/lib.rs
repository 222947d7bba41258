//! # Declarative
//!
//! A framework for declarative resource providers.
//!
//! An orchestrator owns the plan and the recorded state; a provider built on
//! this crate answers its lifecycle requests by driving a remote system into
//! the desired state and reporting the new state back.
//!
//! ## Core Concepts
//!
//! - **Reconciler**: typed create/read/update/delete for one resource type
//! - **Resource**: a reconciler with its model erased to JSON records
//! - **Schema**: attributes of a resource, with replace-on-change and
//!   sensitivity markers
//! - **Association**: set reconciliation for many-to-many relations
//! - **ApplyContext**: cancellation and deadline passed into every remote call
//! - **Diagnostic**: user-facing error or warning with title and detail
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     execute, ApplyContext, LifecycleRequest, ResourceRegistry, Typed,
//! };
//!
//! let mut registry = ResourceRegistry::new("opencti");
//! registry.register(Typed::boxed("opencti", RoleReconciler::new(api.clone())));
//!
//! let response = execute(
//!     &registry,
//!     &ApplyContext::new(),
//!     LifecycleRequest::ImportState { type_name: "opencti_role".into(), id: role_id },
//! );
//! ```

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod types;

// Re-export main types at crate root
pub use context::{ApplyContext, CancelToken, Interrupted};
pub use diff::{Association, Linked, NameDiff, Reconciled, UnresolvedPolicy, sorted_names};
pub use error::{BoxError, Error, ErrorClass, RemoteContext, Result};
pub use executor::{LifecycleRequest, LifecycleResponse, execute};
pub use registry::ResourceRegistry;
pub use resource::{BoxedResource, Reconciler, Resource, Typed, require_id};
pub use schema::{Attribute, AttributeType, Schema};
pub use types::{Diagnostic, Diagnostics, Severity};
