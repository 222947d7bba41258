//! API trait and implementations for talking to OpenCTI.
//!
//! This module provides the [`Api`] trait and two implementations:
//! [`graphql::GraphqlClient`] for a live platform and [`MockApi`] for tests.
//!
//! Every call takes the caller's [`ApplyContext`]. Implementations check it
//! before doing any work, so a cancelled or expired operation fails fast with
//! [`crate::Error::Interrupted`].
//!
//! # Testing
//!
//! Use [`MockApi`] for testing without network access:
//!
//! ```
//! use declarative::ApplyContext;
//! use opencti::api::{Api, MockApi};
//!
//! let mock = MockApi::new();
//! mock.add_capability("KNOWLEDGE");
//!
//! let capabilities = mock.list_capabilities(&ApplyContext::new()).unwrap();
//! assert_eq!(capabilities.len(), 1);
//! ```

pub mod graphql;
mod mock;

pub use mock::{MockApi, MockCall};

use crate::error::Result;
use crate::types::{
    CaseTemplate, CaseTemplateInput, EditInput, EntityKind, EntityRef, Group, GroupInput,
    MarkingDefinition, MarkingDefinitionInput, Relation, Role, RoleInput, StatusTemplate,
    StatusTemplateInput, TaskTemplate, TaskTemplateInput, User, UserInput, Vocabulary,
    VocabularyInput,
};
use declarative::ApplyContext;

/// Administration API of an OpenCTI platform.
///
/// Reads of a missing entity return [`crate::Error::NotFound`]. Listings
/// return every entity, following pagination to the end. Nothing is retried.
pub trait Api: Send + Sync {
    /// Check reachability and credentials; returns the platform version.
    fn health_check(&self, ctx: &ApplyContext) -> Result<String>;

    // Roles
    fn create_role(&self, ctx: &ApplyContext, input: &RoleInput) -> Result<Role>;
    fn read_role(&self, ctx: &ApplyContext, id: &str) -> Result<Role>;
    fn list_roles(&self, ctx: &ApplyContext) -> Result<Vec<EntityRef>>;
    fn list_capabilities(&self, ctx: &ApplyContext) -> Result<Vec<EntityRef>>;

    // Groups
    fn create_group(&self, ctx: &ApplyContext, input: &GroupInput) -> Result<Group>;
    fn read_group(&self, ctx: &ApplyContext, id: &str) -> Result<Group>;
    fn list_groups(&self, ctx: &ApplyContext) -> Result<Vec<EntityRef>>;

    // Users
    fn create_user(&self, ctx: &ApplyContext, input: &UserInput) -> Result<User>;
    fn read_user(&self, ctx: &ApplyContext, id: &str) -> Result<User>;
    fn list_users(&self, ctx: &ApplyContext) -> Result<Vec<EntityRef>>;

    // Marking definitions
    fn create_marking_definition(
        &self,
        ctx: &ApplyContext,
        input: &MarkingDefinitionInput,
    ) -> Result<MarkingDefinition>;
    fn read_marking_definition(&self, ctx: &ApplyContext, id: &str) -> Result<MarkingDefinition>;
    fn list_marking_definitions(&self, ctx: &ApplyContext) -> Result<Vec<MarkingDefinition>>;

    // Case and task templates
    fn create_case_template(
        &self,
        ctx: &ApplyContext,
        input: &CaseTemplateInput,
    ) -> Result<CaseTemplate>;
    fn read_case_template(&self, ctx: &ApplyContext, id: &str) -> Result<CaseTemplate>;
    fn create_task_template(
        &self,
        ctx: &ApplyContext,
        input: &TaskTemplateInput,
    ) -> Result<TaskTemplate>;
    fn read_task_template(&self, ctx: &ApplyContext, id: &str) -> Result<TaskTemplate>;

    // Status templates
    fn create_status_template(
        &self,
        ctx: &ApplyContext,
        input: &StatusTemplateInput,
    ) -> Result<StatusTemplate>;
    fn read_status_template(&self, ctx: &ApplyContext, id: &str) -> Result<StatusTemplate>;

    /// Add a status template to the workflow of an entity type.
    fn set_status_in_workflow(
        &self,
        ctx: &ApplyContext,
        entity_type: &str,
        template_id: &str,
        order: i64,
    ) -> Result<()>;

    // Vocabularies
    fn create_vocabulary(&self, ctx: &ApplyContext, input: &VocabularyInput) -> Result<Vocabulary>;
    fn read_vocabulary(&self, ctx: &ApplyContext, id: &str) -> Result<Vocabulary>;

    /// Link `from_id` to `to_id`.
    fn add_relation(
        &self,
        ctx: &ApplyContext,
        relation: Relation,
        from_id: &str,
        to_id: &str,
    ) -> Result<()>;

    /// Unlink `from_id` from `to_id`.
    fn remove_relation(
        &self,
        ctx: &ApplyContext,
        relation: Relation,
        from_id: &str,
        to_id: &str,
    ) -> Result<()>;

    /// Replace scalar fields of an entity in place.
    fn patch_fields(
        &self,
        ctx: &ApplyContext,
        kind: EntityKind,
        id: &str,
        edits: &[EditInput],
    ) -> Result<()>;

    /// Delete an entity.
    fn delete(&self, ctx: &ApplyContext, kind: EntityKind, id: &str) -> Result<()>;
}
