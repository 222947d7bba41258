//! Lifecycle dispatch - routes resource RPCs to registered resources
//!
//! The orchestrator decides the order of operations. Each request here runs
//! one operation to completion and reports the resulting state record and
//! diagnostics; nothing is retried or rolled back.

use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::registry::ResourceRegistry;
use crate::resource::Resource;
use crate::types::Diagnostics;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A resource lifecycle request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LifecycleRequest {
    Create {
        type_name: String,
        planned: Value,
    },
    Read {
        type_name: String,
        state: Value,
    },
    Update {
        type_name: String,
        prior: Value,
        planned: Value,
    },
    Delete {
        type_name: String,
        state: Value,
    },
    ImportState {
        type_name: String,
        id: String,
    },
}

impl LifecycleRequest {
    /// Name of the operation, for logging
    pub fn op(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Read { .. } => "read",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::ImportState { .. } => "import_state",
        }
    }

    /// Resource type the request targets
    pub fn type_name(&self) -> &str {
        match self {
            Self::Create { type_name, .. }
            | Self::Read { type_name, .. }
            | Self::Update { type_name, .. }
            | Self::Delete { type_name, .. }
            | Self::ImportState { type_name, .. } => type_name,
        }
    }
}

/// Result of a lifecycle request
///
/// `state` is the record the orchestrator should persist. `None` means the
/// resource is not (or no longer) tracked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    #[serde(default, skip_serializing_if = "Diagnostics::is_empty")]
    pub diagnostics: Diagnostics,
}

impl LifecycleResponse {
    /// Successful response carrying a state record
    pub fn with_state(state: Value) -> Self {
        Self {
            state: Some(state),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Failed response; `state` is what the orchestrator keeps tracking
    pub fn failed(state: Option<Value>, err: &Error) -> Self {
        Self {
            state,
            diagnostics: err.to_diagnostic().into(),
        }
    }

    /// Check if the request failed
    pub fn has_error(&self) -> bool {
        self.diagnostics.has_error()
    }
}

/// Execute one lifecycle request against the registry
///
/// On failure the prior record is handed back unchanged (for read, update and
/// delete) so the orchestrator keeps tracking the resource. A failed create or
/// import tracks nothing, unless the error carries the partial state reached
/// before the failure.
pub fn execute(
    registry: &ResourceRegistry,
    ctx: &ApplyContext,
    request: LifecycleRequest,
) -> LifecycleResponse {
    let op = request.op();
    let Some(resource) = registry.get(request.type_name()) else {
        let err = Error::internal(
            "Unknown resource type",
            format!("The provider does not implement resource type {}", request.type_name()),
        );
        return LifecycleResponse::failed(None, &err);
    };

    log::info!("{} {}", op, resource.type_name());

    let (prior, outcome) = match request {
        LifecycleRequest::Create { planned, .. } => (None, resource.create(ctx, planned).map(Some)),
        LifecycleRequest::Read { state, .. } => {
            (Some(state.clone()), resource.read(ctx, state).map(Some))
        }
        LifecycleRequest::Update { prior, planned, .. } => (
            Some(prior.clone()),
            resource.update(ctx, prior, planned).map(Some),
        ),
        LifecycleRequest::Delete { state, .. } => {
            (Some(state.clone()), resource.delete(ctx, state).map(|()| None))
        }
        LifecycleRequest::ImportState { id, .. } => (None, import(resource, ctx, &id).map(Some)),
    };

    match outcome {
        Ok(state) => {
            if let Some(state) = &state {
                log::debug!(
                    "{} {} state: {}",
                    op,
                    resource.type_name(),
                    resource.schema().redact(state)
                );
            }
            LifecycleResponse {
                state,
                diagnostics: Diagnostics::new(),
            }
        }
        Err(err) => {
            log::error!("{} {} failed: {}", op, resource.type_name(), err);
            let state = err.partial_state().cloned().or(prior);
            LifecycleResponse::failed(state, &err)
        }
    }
}

/// Adopt an existing entity: pass the id through, then read the full record
fn import(resource: &dyn Resource, ctx: &ApplyContext, id: &str) -> Result<Value> {
    let seed = resource.import_state(id)?;
    resource.read(ctx, seed)
}
