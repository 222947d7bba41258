//! Role resource: name, description and granted capabilities

use super::{Link, linked, listing, names, optional, timestamp};
use declarative::{
    ApplyContext, Attribute, AttributeType, Error, Reconciler, RemoteContext, Result, Schema,
    UnresolvedPolicy, require_id,
};
use opencti::{Api, EditInput, EntityKind, Relation, Role, RoleInput};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleModel {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    /// Capability names, sorted
    pub capabilities: Vec<String>,
    pub last_updated: Option<String>,
}

impl RoleModel {
    fn from_remote(role: &Role, last_updated: Option<String>) -> Self {
        Self {
            id: Some(role.id.clone()),
            name: role.name.clone(),
            description: optional(role.description.clone()),
            capabilities: names(&role.capabilities),
            last_updated,
        }
    }
}

pub struct RoleReconciler {
    api: Arc<dyn Api>,
    policy: UnresolvedPolicy,
}

impl RoleReconciler {
    pub fn new(api: Arc<dyn Api>, policy: UnresolvedPolicy) -> Self {
        Self { api, policy }
    }

    fn link<'a>(&'a self, ctx: &'a ApplyContext, id: &'a str, summary: &'a str) -> Link<'a> {
        Link {
            api: self.api.as_ref(),
            ctx,
            relation: Relation::RoleCapability,
            owner_id: id,
            policy: self.policy,
            summary,
        }
    }
}

impl Reconciler for RoleReconciler {
    type Model = RoleModel;
    const TYPE_SUFFIX: &'static str = "role";

    fn schema() -> Schema {
        Schema::resource()
            .with_description("A role grants a set of capabilities to the groups carrying it.")
            .attribute(
                "name",
                Attribute::required(AttributeType::String).with_description("Name of the role"),
            )
            .attribute("description", Attribute::optional(AttributeType::String))
            .attribute(
                "capabilities",
                Attribute::optional_computed(AttributeType::string_list())
                    .with_description("Names of the capabilities granted, e.g. KNOWLEDGE"),
            )
    }

    fn create(&self, ctx: &ApplyContext, plan: RoleModel) -> Result<RoleModel> {
        const SUMMARY: &str = "Error creating role";

        let available = listing(&[], &plan.capabilities, || {
            Ok(linked(
                self.api
                    .list_capabilities(ctx)
                    .remote(SUMMARY, "Could not list capabilities")?,
            ))
        })?;
        self.link(ctx, "", SUMMARY)
            .preflight(&[], &plan.capabilities, &available)?;

        let role = self
            .api
            .create_role(
                ctx,
                &RoleInput {
                    name: plan.name.clone(),
                    description: plan.description.clone(),
                },
            )
            .remote(SUMMARY, "Could not create role")?;
        log::info!("Created role {} ({})", role.name, role.id);

        let mut state = RoleModel::from_remote(&role, Some(timestamp()));
        match self
            .link(ctx, &role.id, SUMMARY)
            .sync(&[], &plan.capabilities, || Ok(available))
        {
            Ok(reconciled) => {
                state.capabilities = reconciled.names;
                Ok(state)
            }
            Err(err) => Err(Error::incomplete(&state, err)),
        }
    }

    fn read(&self, ctx: &ApplyContext, state: RoleModel) -> Result<RoleModel> {
        let id = require_id(state.id.as_deref())?;
        let role = self
            .api
            .read_role(ctx, id)
            .remote("Error reading role", "Could not read role")?;
        Ok(RoleModel::from_remote(&role, state.last_updated))
    }

    fn update(&self, ctx: &ApplyContext, prior: RoleModel, plan: RoleModel) -> Result<RoleModel> {
        const SUMMARY: &str = "Error updating role";

        let id = require_id(prior.id.as_deref())?;
        let current = self
            .api
            .read_role(ctx, id)
            .remote(SUMMARY, "Could not read role")?;

        let link = self.link(ctx, id, SUMMARY);
        let current_capabilities = linked(current.capabilities);
        let available = listing(&current_capabilities, &plan.capabilities, || {
            Ok(linked(
                self.api
                    .list_capabilities(ctx)
                    .remote(SUMMARY, "Could not list capabilities")?,
            ))
        })?;
        link.preflight(&current_capabilities, &plan.capabilities, &available)?;

        let mut edits = Vec::new();
        if current.name != plan.name {
            edits.push(EditInput::new("name", plan.name.clone()));
        }
        if optional(current.description.clone()) != plan.description {
            edits.push(EditInput::new("description", plan.description.clone()));
        }
        if !edits.is_empty() {
            self.api
                .patch_fields(ctx, EntityKind::Role, id, &edits)
                .remote(SUMMARY, "Could not update role")?;
        }

        let reconciled = link.sync(&current_capabilities, &plan.capabilities, || Ok(available))?;

        Ok(RoleModel {
            id: Some(id.to_string()),
            name: plan.name,
            description: plan.description,
            capabilities: reconciled.names,
            last_updated: Some(timestamp()),
        })
    }

    fn delete(&self, ctx: &ApplyContext, state: RoleModel) -> Result<()> {
        let id = require_id(state.id.as_deref())?;
        self.api
            .delete(ctx, EntityKind::Role, id)
            .remote("Error deleting role", "Could not delete role")?;
        log::info!("Deleted role {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{api, ctx, relation_calls, resources, strings};
    use super::*;
    use declarative::{ErrorClass, LifecycleRequest, execute};
    use opencti::MockApi;
    use serde_json::json;

    fn plan(name: &str, capabilities: &[&str]) -> RoleModel {
        RoleModel {
            name: name.to_string(),
            capabilities: strings(capabilities),
            ..RoleModel::default()
        }
    }

    fn seeded() -> MockApi {
        let mock = MockApi::new();
        for name in ["KNOWLEDGE", "EXPLORE", "SETTINGS", "BYPASS"] {
            mock.add_capability(name);
        }
        mock
    }

    #[test]
    fn test_create_then_read_round_trip() {
        let mock = seeded();
        let roles = RoleReconciler::new(api(&mock), UnresolvedPolicy::Fail);

        let mut desired = plan("Analyst", &["SETTINGS", "KNOWLEDGE"]);
        desired.description = Some("Reads knowledge".to_string());
        let created = roles.create(&ctx(), desired).unwrap();

        assert!(created.id.is_some());
        assert!(created.last_updated.is_some());
        assert_eq!(created.capabilities, vec!["KNOWLEDGE", "SETTINGS"]);

        let read = roles.read(&ctx(), created.clone()).unwrap();
        assert_eq!(read, created);
    }

    #[test]
    fn test_update_capabilities_scenario() {
        let mock = seeded();
        let roles = RoleReconciler::new(api(&mock), UnresolvedPolicy::Fail);
        let prior = roles
            .create(&ctx(), plan("Analyst", &["KNOWLEDGE", "SETTINGS"]))
            .unwrap();
        mock.clear_calls();

        let mut desired = prior.clone();
        desired.capabilities = strings(&["KNOWLEDGE", "EXPLORE"]);
        let updated = roles.update(&ctx(), prior, desired).unwrap();

        assert_eq!(updated.capabilities, vec!["EXPLORE", "KNOWLEDGE"]);
        assert_eq!(mock.count("remove_relation"), 1);
        assert_eq!(mock.count("add_relation"), 1);
        assert_eq!(mock.count("patch_fields"), 0);

        let read = roles.read(&ctx(), updated).unwrap();
        assert_eq!(read.capabilities, vec!["EXPLORE", "KNOWLEDGE"]);
    }

    #[test]
    fn test_second_update_is_idempotent() {
        let mock = seeded();
        let roles = RoleReconciler::new(api(&mock), UnresolvedPolicy::Fail);
        let prior = roles
            .create(&ctx(), plan("Analyst", &["KNOWLEDGE"]))
            .unwrap();

        let mut desired = prior.clone();
        desired.capabilities = strings(&["EXPLORE", "BYPASS"]);
        let first = roles.update(&ctx(), prior, desired.clone()).unwrap();

        mock.clear_calls();
        roles.update(&ctx(), first, desired).unwrap();
        assert_eq!(relation_calls(&mock), 0);
        assert_eq!(mock.count("list_capabilities"), 0);
    }

    #[test]
    fn test_empty_desired_removes_all() {
        let mock = seeded();
        let roles = RoleReconciler::new(api(&mock), UnresolvedPolicy::Fail);
        let prior = roles
            .create(&ctx(), plan("Analyst", &["KNOWLEDGE", "EXPLORE"]))
            .unwrap();
        mock.clear_calls();

        let updated = roles
            .update(&ctx(), prior.clone(), plan("Analyst", &[]))
            .unwrap();
        assert!(updated.capabilities.is_empty());
        assert_eq!(mock.count("remove_relation"), 2);
        assert_eq!(mock.count("add_relation"), 0);
    }

    #[test]
    fn test_scalar_change_patches_in_place() {
        let mock = seeded();
        let roles = RoleReconciler::new(api(&mock), UnresolvedPolicy::Fail);
        let prior = roles.create(&ctx(), plan("Analyst", &[])).unwrap();

        let mut desired = prior.clone();
        desired.name = "Senior Analyst".to_string();
        desired.description = Some("Leads".to_string());
        let updated = roles.update(&ctx(), prior.clone(), desired).unwrap();

        assert_eq!(updated.id, prior.id);
        let read = roles.read(&ctx(), updated).unwrap();
        assert_eq!(read.name, "Senior Analyst");
        assert_eq!(read.description.as_deref(), Some("Leads"));
        assert_eq!(mock.count("create_role"), 1);
    }

    #[test]
    fn test_unknown_capability_fails_before_create() {
        let mock = seeded();
        let roles = RoleReconciler::new(api(&mock), UnresolvedPolicy::Fail);

        let err = roles
            .create(&ctx(), plan("Analyst", &["KNOWLEDGE", "TELEPORT"]))
            .unwrap_err();
        match &err {
            Error::UnresolvedReference { relation, names } => {
                assert_eq!(relation, "capability");
                assert_eq!(names, &vec!["TELEPORT".to_string()]);
            }
            other => panic!("Expected UnresolvedReference, got {other:?}"),
        }
        assert_eq!(err.class(), ErrorClass::Configuration);
        assert_eq!(mock.count("create_role"), 0);
    }

    #[test]
    fn test_unknown_capability_on_update_changes_nothing() {
        let mock = seeded();
        let roles = RoleReconciler::new(api(&mock), UnresolvedPolicy::Fail);
        let prior = roles
            .create(&ctx(), plan("Analyst", &["KNOWLEDGE", "SETTINGS"]))
            .unwrap();
        mock.clear_calls();

        let mut desired = prior.clone();
        desired.name = "Senior Analyst".to_string();
        desired.capabilities = strings(&["EXPLOR"]);
        let err = roles.update(&ctx(), prior.clone(), desired).unwrap_err();

        assert!(matches!(err, Error::UnresolvedReference { .. }));
        assert_eq!(relation_calls(&mock), 0);
        assert_eq!(mock.count("patch_fields"), 0);
        let read = roles.read(&ctx(), prior).unwrap();
        assert_eq!(read.name, "Analyst");
        assert_eq!(read.capabilities, vec!["KNOWLEDGE", "SETTINGS"]);
    }

    #[test]
    fn test_unknown_capability_ignored_when_lenient() {
        let mock = seeded();
        let roles = RoleReconciler::new(api(&mock), UnresolvedPolicy::Ignore);

        let created = roles
            .create(&ctx(), plan("Analyst", &["KNOWLEDGE", "TELEPORT"]))
            .unwrap();
        assert_eq!(created.capabilities, vec!["KNOWLEDGE"]);
    }

    #[test]
    fn test_failed_assign_keeps_created_role_tracked() {
        let mock = seeded();
        mock.fail_on("add_relation");
        let roles = RoleReconciler::new(api(&mock), UnresolvedPolicy::Fail);

        let err = roles
            .create(&ctx(), plan("Analyst", &["KNOWLEDGE"]))
            .unwrap_err();
        let state = err.partial_state().unwrap();
        let id = state["id"].as_str().unwrap();
        assert!(mock.exists(EntityKind::Role, id));
        assert_eq!(err.to_diagnostic().summary, "Error creating role");
    }

    #[test]
    fn test_delete_missing_role() {
        let mock = seeded();
        let other = mock.add_role("Keeper");
        let roles = RoleReconciler::new(api(&mock), UnresolvedPolicy::Fail);

        let err = roles
            .delete(
                &ctx(),
                RoleModel {
                    id: Some("role--missing".to_string()),
                    ..RoleModel::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Remote);
        assert_eq!(err.to_diagnostic().summary, "Error deleting role");
        assert!(mock.exists(EntityKind::Role, &other));
    }

    #[test]
    fn test_import_through_registry() {
        let mock = seeded();
        let id = mock.add_role("Imported");
        let registry = resources(&mock);

        let response = execute(
            &registry,
            &ctx(),
            LifecycleRequest::ImportState {
                type_name: "opencti_role".to_string(),
                id: id.clone(),
            },
        );
        assert!(!response.has_error(), "{:?}", response.diagnostics);
        let state = response.state.unwrap();
        assert_eq!(state["id"], json!(id));
        assert_eq!(state["name"], "Imported");
        assert_eq!(state["capabilities"], json!([]));
    }
}
