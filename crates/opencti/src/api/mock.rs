//! In-memory [`Api`] for testing without network access.

use super::Api;
use crate::error::{Error, Result};
use crate::types::{
    CaseTemplate, CaseTemplateInput, ConfidenceLevel, EditInput, EntityKind, EntityRef, Group,
    GroupInput, MarkingDefinition, MarkingDefinitionInput, Relation, Role, RoleInput,
    StatusTemplate, StatusTemplateInput, TaskTemplate, TaskTemplateInput, User, UserInput,
    Vocabulary, VocabularyInput,
};
use declarative::ApplyContext;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One recorded API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// Trait method name, e.g. "add_relation".
    pub method: &'static str,
    /// Method-specific arguments, e.g. `["has-capability", "role--1", "capability--2"]`.
    pub args: Vec<String>,
}

#[derive(Debug, Default)]
struct Store {
    next_id: u64,
    version: String,
    capabilities: Vec<EntityRef>,
    roles: BTreeMap<String, Role>,
    groups: BTreeMap<String, Group>,
    users: BTreeMap<String, User>,
    markings: BTreeMap<String, MarkingDefinition>,
    case_templates: BTreeMap<String, CaseTemplate>,
    task_templates: BTreeMap<String, TaskTemplate>,
    status_templates: BTreeMap<String, StatusTemplate>,
    vocabularies: BTreeMap<String, Vocabulary>,
    /// (entity type, status template id, order)
    workflows: Vec<(String, String, i64)>,
    calls: Vec<MockCall>,
    failing: HashSet<&'static str>,
}

impl Store {
    fn issue_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}--{}", prefix, self.next_id)
    }

    fn usages(&self, template_id: &str) -> i64 {
        self.workflows
            .iter()
            .filter(|(_, id, _)| id == template_id)
            .count() as i64
    }
}

/// Mock API backed by in-memory maps.
///
/// Clones share the same store, so a test can hand one clone to the code
/// under test and inspect the call log through another.
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    store: Arc<Mutex<Store>>,
}

impl MockApi {
    /// Create a new empty mock platform.
    #[must_use]
    pub fn new() -> Self {
        let mock = Self::default();
        mock.store().version = "6.0.0-mock".to_string();
        mock
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a call and fail it if failure was injected for the method.
    fn enter(&self, ctx: &ApplyContext, method: &'static str, args: &[&str]) -> Result<MutexGuard<'_, Store>> {
        ctx.check()?;
        let mut store = self.store();
        store.calls.push(MockCall {
            method,
            args: args.iter().map(|a| (*a).to_string()).collect(),
        });
        if store.failing.contains(method) {
            return Err(Error::GraphQl {
                operation: method.to_string(),
                messages: vec!["injected failure".to_string()],
            });
        }
        Ok(store)
    }

    /// Make every later call to `method` fail.
    pub fn fail_on(&self, method: &'static str) {
        self.store().failing.insert(method);
    }

    /// Stop failing calls to `method`.
    pub fn heal(&self, method: &'static str) {
        self.store().failing.remove(method);
    }

    /// All calls recorded so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.store().calls.clone()
    }

    /// Number of recorded calls to `method`.
    pub fn count(&self, method: &str) -> usize {
        self.store().calls.iter().filter(|c| c.method == method).count()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.store().calls.clear();
    }

    // -------------------------------------------------------------------------
    // Seeding (not recorded)
    // -------------------------------------------------------------------------

    /// Add a capability; returns its id.
    pub fn add_capability(&self, name: &str) -> String {
        let mut store = self.store();
        let id = store.issue_id("capability");
        store.capabilities.push(EntityRef::new(&id, name));
        id
    }

    /// Add a bare role; returns its id.
    pub fn add_role(&self, name: &str) -> String {
        let mut store = self.store();
        let id = store.issue_id("role");
        store.roles.insert(
            id.clone(),
            Role {
                id: id.clone(),
                name: name.to_string(),
                description: None,
                capabilities: Vec::new(),
            },
        );
        id
    }

    /// Add a bare group; returns its id.
    pub fn add_group(&self, name: &str) -> String {
        let mut store = self.store();
        let id = store.issue_id("group");
        store.groups.insert(
            id.clone(),
            Group {
                id: id.clone(),
                name: name.to_string(),
                description: None,
                default_assignation: false,
                auto_new_marking: false,
                max_confidence: crate::types::DEFAULT_MAX_CONFIDENCE,
                roles: Vec::new(),
                allowed_marking: Vec::new(),
            },
        );
        id
    }

    /// Add a bare user; returns its id.
    pub fn add_user(&self, name: &str, email: &str) -> String {
        let mut store = self.store();
        let id = store.issue_id("user");
        store.users.insert(
            id.clone(),
            User {
                id: id.clone(),
                name: name.to_string(),
                user_email: email.to_string(),
                api_token: Some(format!("token-{id}")),
                user_confidence_level: Some(ConfidenceLevel::default()),
                groups: Vec::new(),
            },
        );
        id
    }

    /// Add a marking definition; returns its id.
    pub fn add_marking(&self, definition_type: &str, definition: &str) -> String {
        let mut store = self.store();
        let id = store.issue_id("marking-definition");
        store.markings.insert(
            id.clone(),
            MarkingDefinition {
                id: id.clone(),
                definition_type: definition_type.to_string(),
                definition: definition.to_string(),
                x_opencti_order: 0,
                x_opencti_color: None,
            },
        );
        id
    }

    /// Add a task template; returns its id.
    pub fn add_task_template(&self, name: &str) -> String {
        let mut store = self.store();
        let id = store.issue_id("task-template");
        store.task_templates.insert(
            id.clone(),
            TaskTemplate {
                id: id.clone(),
                name: name.to_string(),
                description: None,
            },
        );
        id
    }

    /// Link two entities directly.
    pub fn link(&self, relation: Relation, from_id: &str, to_id: &str) -> Result<()> {
        let mut store = self.store();
        link(&mut store, relation, from_id, to_id)
    }

    /// Drop all workflow usages of a status template.
    pub fn clear_workflows(&self, template_id: &str) {
        self.store().workflows.retain(|(_, id, _)| id != template_id);
    }

    /// Workflow entries as (entity type, template id, order).
    pub fn workflows(&self) -> Vec<(String, String, i64)> {
        self.store().workflows.clone()
    }

    /// Check whether an entity exists.
    pub fn exists(&self, kind: EntityKind, id: &str) -> bool {
        let store = self.store();
        match kind {
            EntityKind::Role => store.roles.contains_key(id),
            EntityKind::Group => store.groups.contains_key(id),
            EntityKind::User => store.users.contains_key(id),
            EntityKind::MarkingDefinition => store.markings.contains_key(id),
            EntityKind::CaseTemplate => store.case_templates.contains_key(id),
            EntityKind::TaskTemplate => store.task_templates.contains_key(id),
            EntityKind::StatusTemplate => store.status_templates.contains_key(id),
            EntityKind::Vocabulary => store.vocabularies.contains_key(id),
        }
    }
}

fn link(store: &mut Store, relation: Relation, from_id: &str, to_id: &str) -> Result<()> {
    let target = find_target(store, relation, to_id)?;
    let links = links_mut(store, relation, from_id)?;
    if !links.iter().any(|l| l.id == target.id) {
        links.push(target);
    }
    Ok(())
}

fn find_target(store: &Store, relation: Relation, to_id: &str) -> Result<EntityRef> {
    let found = match relation {
        Relation::RoleCapability => store.capabilities.iter().find(|c| c.id == to_id).cloned(),
        Relation::GroupRole => store.roles.get(to_id).map(|r| EntityRef::new(&r.id, &r.name)),
        Relation::GroupMarking => store.markings.get(to_id).map(MarkingDefinition::to_ref),
        Relation::UserGroup => store.groups.get(to_id).map(|g| EntityRef::new(&g.id, &g.name)),
    };
    found.ok_or_else(|| Error::not_found(relation.target_label(), to_id))
}

fn links_mut<'a>(store: &'a mut Store, relation: Relation, from_id: &str) -> Result<&'a mut Vec<EntityRef>> {
    let links = match relation {
        Relation::RoleCapability => store.roles.get_mut(from_id).map(|r| &mut r.capabilities),
        Relation::GroupRole => store.groups.get_mut(from_id).map(|g| &mut g.roles),
        Relation::GroupMarking => store.groups.get_mut(from_id).map(|g| &mut g.allowed_marking),
        Relation::UserGroup => store.users.get_mut(from_id).map(|u| &mut u.groups),
    };
    links.ok_or_else(|| Error::not_found(relation.owner().label(), from_id))
}

fn sorted(mut refs: Vec<EntityRef>) -> Vec<EntityRef> {
    refs.sort_by(|a, b| a.name.cmp(&b.name));
    refs
}

fn missing(kind: EntityKind, id: &str) -> Error {
    Error::not_found(kind.label(), id)
}

// Field patch value helpers

fn invalid(edit: &EditInput) -> Error {
    Error::GraphQl {
        operation: "fieldPatch".to_string(),
        messages: vec![format!("invalid value for {}", edit.key)],
    }
}

fn single(edit: &EditInput) -> Result<&Value> {
    edit.value.first().ok_or_else(|| invalid(edit))
}

fn as_string(edit: &EditInput) -> Result<String> {
    single(edit)?
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| invalid(edit))
}

fn as_optional_string(edit: &EditInput) -> Result<Option<String>> {
    match single(edit)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(invalid(edit)),
    }
}

fn as_i64(edit: &EditInput) -> Result<i64> {
    single(edit)?.as_i64().ok_or_else(|| invalid(edit))
}

fn as_bool(edit: &EditInput) -> Result<bool> {
    single(edit)?.as_bool().ok_or_else(|| invalid(edit))
}

fn as_confidence(edit: &EditInput) -> Result<ConfidenceLevel> {
    serde_json::from_value(single(edit)?.clone()).map_err(|_| invalid(edit))
}

fn unknown_field(kind: EntityKind, edit: &EditInput) -> Error {
    Error::GraphQl {
        operation: "fieldPatch".to_string(),
        messages: vec![format!("{} has no editable field {}", kind.label(), edit.key)],
    }
}

fn apply_edit(store: &mut Store, kind: EntityKind, id: &str, edit: &EditInput) -> Result<()> {
    match kind {
        EntityKind::Role => {
            let role = store.roles.get_mut(id).ok_or_else(|| missing(kind, id))?;
            match edit.key.as_str() {
                "name" => role.name = as_string(edit)?,
                "description" => role.description = as_optional_string(edit)?,
                _ => return Err(unknown_field(kind, edit)),
            }
        }
        EntityKind::Group => {
            let group = store.groups.get_mut(id).ok_or_else(|| missing(kind, id))?;
            match edit.key.as_str() {
                "name" => group.name = as_string(edit)?,
                "description" => group.description = as_optional_string(edit)?,
                "default_assignation" => group.default_assignation = as_bool(edit)?,
                "auto_new_marking" => group.auto_new_marking = as_bool(edit)?,
                "group_confidence_level" => {
                    group.max_confidence = as_confidence(edit)?.max_confidence;
                }
                _ => return Err(unknown_field(kind, edit)),
            }
        }
        EntityKind::User => {
            let user = store.users.get_mut(id).ok_or_else(|| missing(kind, id))?;
            match edit.key.as_str() {
                "name" => user.name = as_string(edit)?,
                "user_email" => user.user_email = as_string(edit)?,
                "user_confidence_level" => user.user_confidence_level = Some(as_confidence(edit)?),
                _ => return Err(unknown_field(kind, edit)),
            }
        }
        EntityKind::MarkingDefinition => {
            let marking = store.markings.get_mut(id).ok_or_else(|| missing(kind, id))?;
            match edit.key.as_str() {
                "definition_type" => marking.definition_type = as_string(edit)?,
                "definition" => marking.definition = as_string(edit)?,
                "x_opencti_order" => marking.x_opencti_order = as_i64(edit)?,
                "x_opencti_color" => marking.x_opencti_color = as_optional_string(edit)?,
                _ => return Err(unknown_field(kind, edit)),
            }
        }
        EntityKind::CaseTemplate => {
            let template = store.case_templates.get_mut(id).ok_or_else(|| missing(kind, id))?;
            match edit.key.as_str() {
                "name" => template.name = as_string(edit)?,
                "description" => template.description = as_optional_string(edit)?,
                _ => return Err(unknown_field(kind, edit)),
            }
        }
        EntityKind::TaskTemplate => {
            let template = store.task_templates.get_mut(id).ok_or_else(|| missing(kind, id))?;
            match edit.key.as_str() {
                "name" => template.name = as_string(edit)?,
                "description" => template.description = as_optional_string(edit)?,
                _ => return Err(unknown_field(kind, edit)),
            }
        }
        EntityKind::StatusTemplate => {
            let template = store.status_templates.get_mut(id).ok_or_else(|| missing(kind, id))?;
            match edit.key.as_str() {
                "name" => template.name = as_string(edit)?,
                "color" => template.color = as_string(edit)?,
                _ => return Err(unknown_field(kind, edit)),
            }
        }
        EntityKind::Vocabulary => {
            let vocabulary = store.vocabularies.get_mut(id).ok_or_else(|| missing(kind, id))?;
            match edit.key.as_str() {
                "name" => vocabulary.name = as_string(edit)?,
                "description" => vocabulary.description = as_optional_string(edit)?,
                _ => return Err(unknown_field(kind, edit)),
            }
        }
    }
    Ok(())
}

impl Api for MockApi {
    fn health_check(&self, ctx: &ApplyContext) -> Result<String> {
        let store = self.enter(ctx, "health_check", &[])?;
        Ok(store.version.clone())
    }

    fn create_role(&self, ctx: &ApplyContext, input: &RoleInput) -> Result<Role> {
        let mut store = self.enter(ctx, "create_role", &[&input.name])?;
        let id = store.issue_id("role");
        let role = Role {
            id: id.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
            capabilities: Vec::new(),
        };
        store.roles.insert(id, role.clone());
        Ok(role)
    }

    fn read_role(&self, ctx: &ApplyContext, id: &str) -> Result<Role> {
        let store = self.enter(ctx, "read_role", &[id])?;
        let mut role = store
            .roles
            .get(id)
            .cloned()
            .ok_or_else(|| missing(EntityKind::Role, id))?;
        role.capabilities = sorted(role.capabilities);
        Ok(role)
    }

    fn list_roles(&self, ctx: &ApplyContext) -> Result<Vec<EntityRef>> {
        let store = self.enter(ctx, "list_roles", &[])?;
        Ok(store
            .roles
            .values()
            .map(|r| EntityRef::new(&r.id, &r.name))
            .collect())
    }

    fn list_capabilities(&self, ctx: &ApplyContext) -> Result<Vec<EntityRef>> {
        let store = self.enter(ctx, "list_capabilities", &[])?;
        Ok(store.capabilities.clone())
    }

    fn create_group(&self, ctx: &ApplyContext, input: &GroupInput) -> Result<Group> {
        let mut store = self.enter(ctx, "create_group", &[&input.name])?;
        let id = store.issue_id("group");
        let group = Group {
            id: id.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
            default_assignation: input.default_assignation,
            auto_new_marking: input.auto_new_marking,
            max_confidence: input.group_confidence_level.max_confidence,
            roles: Vec::new(),
            allowed_marking: Vec::new(),
        };
        store.groups.insert(id, group.clone());
        Ok(group)
    }

    fn read_group(&self, ctx: &ApplyContext, id: &str) -> Result<Group> {
        let store = self.enter(ctx, "read_group", &[id])?;
        let mut group = store
            .groups
            .get(id)
            .cloned()
            .ok_or_else(|| missing(EntityKind::Group, id))?;
        group.roles = sorted(group.roles);
        group.allowed_marking = sorted(group.allowed_marking);
        Ok(group)
    }

    fn list_groups(&self, ctx: &ApplyContext) -> Result<Vec<EntityRef>> {
        let store = self.enter(ctx, "list_groups", &[])?;
        Ok(store
            .groups
            .values()
            .map(|g| EntityRef::new(&g.id, &g.name))
            .collect())
    }

    fn create_user(&self, ctx: &ApplyContext, input: &UserInput) -> Result<User> {
        let mut store = self.enter(ctx, "create_user", &[&input.name])?;
        if input.password.is_empty() {
            return Err(Error::GraphQl {
                operation: "userAdd".to_string(),
                messages: vec!["password is required".to_string()],
            });
        }
        let id = store.issue_id("user");
        let user = User {
            id: id.clone(),
            name: input.name.clone(),
            user_email: input.user_email.clone(),
            api_token: Some(format!("token-{id}")),
            user_confidence_level: Some(input.user_confidence_level.clone()),
            groups: Vec::new(),
        };
        store.users.insert(id, user.clone());
        Ok(user)
    }

    fn read_user(&self, ctx: &ApplyContext, id: &str) -> Result<User> {
        let store = self.enter(ctx, "read_user", &[id])?;
        let mut user = store
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| missing(EntityKind::User, id))?;
        user.groups = sorted(user.groups);
        Ok(user)
    }

    fn list_users(&self, ctx: &ApplyContext) -> Result<Vec<EntityRef>> {
        let store = self.enter(ctx, "list_users", &[])?;
        Ok(store
            .users
            .values()
            .map(|u| EntityRef::new(&u.id, &u.name))
            .collect())
    }

    fn create_marking_definition(
        &self,
        ctx: &ApplyContext,
        input: &MarkingDefinitionInput,
    ) -> Result<MarkingDefinition> {
        let mut store = self.enter(ctx, "create_marking_definition", &[&input.definition])?;
        let id = store.issue_id("marking-definition");
        let marking = MarkingDefinition {
            id: id.clone(),
            definition_type: input.definition_type.clone(),
            definition: input.definition.clone(),
            x_opencti_order: input.x_opencti_order,
            x_opencti_color: input.x_opencti_color.clone(),
        };
        store.markings.insert(id, marking.clone());
        Ok(marking)
    }

    fn read_marking_definition(&self, ctx: &ApplyContext, id: &str) -> Result<MarkingDefinition> {
        let store = self.enter(ctx, "read_marking_definition", &[id])?;
        store
            .markings
            .get(id)
            .cloned()
            .ok_or_else(|| missing(EntityKind::MarkingDefinition, id))
    }

    fn list_marking_definitions(&self, ctx: &ApplyContext) -> Result<Vec<MarkingDefinition>> {
        let store = self.enter(ctx, "list_marking_definitions", &[])?;
        Ok(store.markings.values().cloned().collect())
    }

    fn create_case_template(
        &self,
        ctx: &ApplyContext,
        input: &CaseTemplateInput,
    ) -> Result<CaseTemplate> {
        let mut store = self.enter(ctx, "create_case_template", &[&input.name])?;
        let tasks = input
            .tasks
            .iter()
            .map(|task_id| {
                store
                    .task_templates
                    .get(task_id)
                    .map(|t| EntityRef::new(&t.id, &t.name))
                    .ok_or_else(|| missing(EntityKind::TaskTemplate, task_id))
            })
            .collect::<Result<Vec<_>>>()?;
        let id = store.issue_id("case-template");
        let template = CaseTemplate {
            id: id.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
            tasks,
        };
        store.case_templates.insert(id, template.clone());
        Ok(template)
    }

    fn read_case_template(&self, ctx: &ApplyContext, id: &str) -> Result<CaseTemplate> {
        let store = self.enter(ctx, "read_case_template", &[id])?;
        store
            .case_templates
            .get(id)
            .cloned()
            .ok_or_else(|| missing(EntityKind::CaseTemplate, id))
    }

    fn create_task_template(
        &self,
        ctx: &ApplyContext,
        input: &TaskTemplateInput,
    ) -> Result<TaskTemplate> {
        let mut store = self.enter(ctx, "create_task_template", &[&input.name])?;
        let id = store.issue_id("task-template");
        let template = TaskTemplate {
            id: id.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
        };
        store.task_templates.insert(id, template.clone());
        Ok(template)
    }

    fn read_task_template(&self, ctx: &ApplyContext, id: &str) -> Result<TaskTemplate> {
        let store = self.enter(ctx, "read_task_template", &[id])?;
        store
            .task_templates
            .get(id)
            .cloned()
            .ok_or_else(|| missing(EntityKind::TaskTemplate, id))
    }

    fn create_status_template(
        &self,
        ctx: &ApplyContext,
        input: &StatusTemplateInput,
    ) -> Result<StatusTemplate> {
        let mut store = self.enter(ctx, "create_status_template", &[&input.name])?;
        let id = store.issue_id("status-template");
        let template = StatusTemplate {
            id: id.clone(),
            name: input.name.clone(),
            color: input.color.clone(),
            usages: 0,
        };
        store.status_templates.insert(id, template.clone());
        Ok(template)
    }

    fn read_status_template(&self, ctx: &ApplyContext, id: &str) -> Result<StatusTemplate> {
        let store = self.enter(ctx, "read_status_template", &[id])?;
        let mut template = store
            .status_templates
            .get(id)
            .cloned()
            .ok_or_else(|| missing(EntityKind::StatusTemplate, id))?;
        template.usages = store.usages(id);
        Ok(template)
    }

    fn set_status_in_workflow(
        &self,
        ctx: &ApplyContext,
        entity_type: &str,
        template_id: &str,
        order: i64,
    ) -> Result<()> {
        let order_arg = order.to_string();
        let mut store = self.enter(
            ctx,
            "set_status_in_workflow",
            &[entity_type, template_id, &order_arg],
        )?;
        if !store.status_templates.contains_key(template_id) {
            return Err(missing(EntityKind::StatusTemplate, template_id));
        }
        store
            .workflows
            .push((entity_type.to_string(), template_id.to_string(), order));
        Ok(())
    }

    fn create_vocabulary(&self, ctx: &ApplyContext, input: &VocabularyInput) -> Result<Vocabulary> {
        let mut store = self.enter(ctx, "create_vocabulary", &[&input.name, &input.category])?;
        let id = store.issue_id("vocabulary");
        let vocabulary = Vocabulary {
            id: id.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
            category: input.category.clone(),
        };
        store.vocabularies.insert(id, vocabulary.clone());
        Ok(vocabulary)
    }

    fn read_vocabulary(&self, ctx: &ApplyContext, id: &str) -> Result<Vocabulary> {
        let store = self.enter(ctx, "read_vocabulary", &[id])?;
        store
            .vocabularies
            .get(id)
            .cloned()
            .ok_or_else(|| missing(EntityKind::Vocabulary, id))
    }

    fn add_relation(
        &self,
        ctx: &ApplyContext,
        relation: Relation,
        from_id: &str,
        to_id: &str,
    ) -> Result<()> {
        let mut store = self.enter(
            ctx,
            "add_relation",
            &[relation.relationship_type(), from_id, to_id],
        )?;
        link(&mut store, relation, from_id, to_id)
    }

    fn remove_relation(
        &self,
        ctx: &ApplyContext,
        relation: Relation,
        from_id: &str,
        to_id: &str,
    ) -> Result<()> {
        let mut store = self.enter(
            ctx,
            "remove_relation",
            &[relation.relationship_type(), from_id, to_id],
        )?;
        let links = links_mut(&mut store, relation, from_id)?;
        let before = links.len();
        links.retain(|l| l.id != to_id);
        if links.len() == before {
            return Err(Error::not_found(relation.relationship_type(), to_id));
        }
        Ok(())
    }

    fn patch_fields(
        &self,
        ctx: &ApplyContext,
        kind: EntityKind,
        id: &str,
        edits: &[EditInput],
    ) -> Result<()> {
        let keys: Vec<&str> = edits.iter().map(|e| e.key.as_str()).collect();
        let keys = keys.join(",");
        let mut store = self.enter(ctx, "patch_fields", &[kind.label(), id, &keys])?;
        for edit in edits {
            apply_edit(&mut store, kind, id, edit)?;
        }
        Ok(())
    }

    fn delete(&self, ctx: &ApplyContext, kind: EntityKind, id: &str) -> Result<()> {
        let mut store = self.enter(ctx, "delete", &[kind.label(), id])?;
        let removed = match kind {
            EntityKind::Role => {
                for group in store.groups.values_mut() {
                    group.roles.retain(|r| r.id != id);
                }
                store.roles.remove(id).is_some()
            }
            EntityKind::Group => {
                for user in store.users.values_mut() {
                    user.groups.retain(|g| g.id != id);
                }
                store.groups.remove(id).is_some()
            }
            EntityKind::User => store.users.remove(id).is_some(),
            EntityKind::MarkingDefinition => {
                for group in store.groups.values_mut() {
                    group.allowed_marking.retain(|m| m.id != id);
                }
                store.markings.remove(id).is_some()
            }
            EntityKind::CaseTemplate => store.case_templates.remove(id).is_some(),
            EntityKind::TaskTemplate => {
                for template in store.case_templates.values_mut() {
                    template.tasks.retain(|t| t.id != id);
                }
                store.task_templates.remove(id).is_some()
            }
            EntityKind::StatusTemplate => {
                store.workflows.retain(|(_, template_id, _)| template_id != id);
                store.status_templates.remove(id).is_some()
            }
            EntityKind::Vocabulary => store.vocabularies.remove(id).is_some(),
        };
        if removed { Ok(()) } else { Err(missing(kind, id)) }
    }
}
