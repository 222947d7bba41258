//! Group resource: scalar settings plus roles and allowed markings

use super::{Link, linked, listing, names, optional, timestamp};
use declarative::{
    ApplyContext, Attribute, AttributeType, Error, Linked, Reconciler, RemoteContext, Result,
    Schema, UnresolvedPolicy, require_id,
};
use opencti::{
    Api, ConfidenceLevel, DEFAULT_MAX_CONFIDENCE, EditInput, EntityKind, Group, GroupInput,
    Relation,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupModel {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub max_confidence_level: i64,
    pub auto_new_marking: bool,
    pub default_assignation: bool,
    /// Role names, sorted
    pub roles: Vec<String>,
    /// Marking definitions, sorted
    pub allowed_marking: Vec<String>,
    pub last_updated: Option<String>,
}

impl Default for GroupModel {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            description: None,
            max_confidence_level: DEFAULT_MAX_CONFIDENCE,
            auto_new_marking: false,
            default_assignation: false,
            roles: Vec::new(),
            allowed_marking: Vec::new(),
            last_updated: None,
        }
    }
}

impl GroupModel {
    fn from_remote(group: &Group, last_updated: Option<String>) -> Self {
        Self {
            id: Some(group.id.clone()),
            name: group.name.clone(),
            description: optional(group.description.clone()),
            max_confidence_level: group.max_confidence,
            auto_new_marking: group.auto_new_marking,
            default_assignation: group.default_assignation,
            roles: names(&group.roles),
            allowed_marking: names(&group.allowed_marking),
            last_updated,
        }
    }
}

pub struct GroupReconciler {
    api: Arc<dyn Api>,
    policy: UnresolvedPolicy,
}

impl GroupReconciler {
    pub fn new(api: Arc<dyn Api>, policy: UnresolvedPolicy) -> Self {
        Self { api, policy }
    }

    fn link<'a>(
        &'a self,
        ctx: &'a ApplyContext,
        relation: Relation,
        id: &'a str,
        summary: &'a str,
    ) -> Link<'a> {
        Link {
            api: self.api.as_ref(),
            ctx,
            relation,
            owner_id: id,
            policy: self.policy,
            summary,
        }
    }

    fn roles(&self, ctx: &ApplyContext, summary: &str) -> Result<Vec<Linked>> {
        Ok(linked(
            self.api
                .list_roles(ctx)
                .remote(summary, "Could not list roles")?,
        ))
    }

    /// Markings are matched by their definition
    fn markings(&self, ctx: &ApplyContext, summary: &str) -> Result<Vec<Linked>> {
        let markings = self
            .api
            .list_marking_definitions(ctx)
            .remote(summary, "Could not list marking definitions")?;
        Ok(markings.iter().map(|m| m.to_ref().into()).collect())
    }

    /// Listings for both relations, checked against the desired names
    ///
    /// Fails before anything changes when a desired name cannot be resolved.
    fn resolve(
        &self,
        ctx: &ApplyContext,
        current: (&[Linked], &[Linked]),
        plan: &GroupModel,
        summary: &str,
    ) -> Result<(Vec<Linked>, Vec<Linked>)> {
        let (current_roles, current_markings) = current;
        let roles = listing(current_roles, &plan.roles, || self.roles(ctx, summary))?;
        let markings = listing(current_markings, &plan.allowed_marking, || {
            self.markings(ctx, summary)
        })?;
        self.link(ctx, Relation::GroupRole, "", summary)
            .preflight(current_roles, &plan.roles, &roles)?;
        self.link(ctx, Relation::GroupMarking, "", summary)
            .preflight(current_markings, &plan.allowed_marking, &markings)?;
        Ok((roles, markings))
    }

    /// Converge both relations of an existing group
    fn sync_relations(
        &self,
        ctx: &ApplyContext,
        group: &Group,
        plan: &GroupModel,
        summary: &str,
        available: (Vec<Linked>, Vec<Linked>),
    ) -> Result<(Vec<String>, Vec<String>)> {
        let (roles_available, markings_available) = available;
        let roles = self
            .link(ctx, Relation::GroupRole, &group.id, summary)
            .sync(&linked(group.roles.clone()), &plan.roles, || Ok(roles_available))?;
        let markings = self
            .link(ctx, Relation::GroupMarking, &group.id, summary)
            .sync(
                &linked(group.allowed_marking.clone()),
                &plan.allowed_marking,
                || Ok(markings_available),
            )?;
        Ok((roles.names, markings.names))
    }
}

impl Reconciler for GroupReconciler {
    type Model = GroupModel;
    const TYPE_SUFFIX: &'static str = "group";

    fn schema() -> Schema {
        Schema::resource()
            .with_description("A group of users sharing roles and marking access.")
            .attribute("name", Attribute::required(AttributeType::String))
            .attribute("description", Attribute::optional(AttributeType::String))
            .attribute(
                "max_confidence_level",
                Attribute::optional_computed(AttributeType::Number)
                    .with_description("Maximum confidence level of members, 0 to 100. Defaults to 100."),
            )
            .attribute(
                "auto_new_marking",
                Attribute::optional_computed(AttributeType::Bool)
                    .with_description("Grant new marking definitions to this group automatically"),
            )
            .attribute(
                "default_assignation",
                Attribute::optional_computed(AttributeType::Bool)
                    .with_description("Assign new users to this group"),
            )
            .attribute(
                "roles",
                Attribute::optional_computed(AttributeType::string_list())
                    .with_description("Names of the roles carried by the group"),
            )
            .attribute(
                "allowed_marking",
                Attribute::optional_computed(AttributeType::string_list())
                    .with_description("Definitions of the markings the group may access, e.g. TLP:GREEN"),
            )
    }

    fn create(&self, ctx: &ApplyContext, plan: GroupModel) -> Result<GroupModel> {
        const SUMMARY: &str = "Error creating group";

        let available = self.resolve(ctx, (&[], &[]), &plan, SUMMARY)?;

        let group = self
            .api
            .create_group(
                ctx,
                &GroupInput {
                    name: plan.name.clone(),
                    description: plan.description.clone(),
                    default_assignation: plan.default_assignation,
                    auto_new_marking: plan.auto_new_marking,
                    group_confidence_level: ConfidenceLevel {
                        max_confidence: plan.max_confidence_level,
                        overrides: Vec::new(),
                    },
                },
            )
            .remote(SUMMARY, "Could not create group")?;
        log::info!("Created group {} ({})", group.name, group.id);

        let mut state = GroupModel::from_remote(&group, Some(timestamp()));
        match self.sync_relations(ctx, &group, &plan, SUMMARY, available) {
            Ok((roles, markings)) => {
                state.roles = roles;
                state.allowed_marking = markings;
                Ok(state)
            }
            Err(err) => Err(Error::incomplete(&state, err)),
        }
    }

    fn read(&self, ctx: &ApplyContext, state: GroupModel) -> Result<GroupModel> {
        let id = require_id(state.id.as_deref())?;
        let group = self
            .api
            .read_group(ctx, id)
            .remote("Error reading group", "Could not read group")?;
        Ok(GroupModel::from_remote(&group, state.last_updated))
    }

    fn update(&self, ctx: &ApplyContext, prior: GroupModel, plan: GroupModel) -> Result<GroupModel> {
        const SUMMARY: &str = "Error updating group";

        let id = require_id(prior.id.as_deref())?;
        let current = self
            .api
            .read_group(ctx, id)
            .remote(SUMMARY, "Could not read group")?;
        let available = self.resolve(
            ctx,
            (&linked(current.roles.clone()), &linked(current.allowed_marking.clone())),
            &plan,
            SUMMARY,
        )?;

        let mut edits = Vec::new();
        if current.name != plan.name {
            edits.push(EditInput::new("name", plan.name.clone()));
        }
        if optional(current.description.clone()) != plan.description {
            edits.push(EditInput::new("description", plan.description.clone()));
        }
        if current.default_assignation != plan.default_assignation {
            edits.push(EditInput::new("default_assignation", plan.default_assignation));
        }
        if current.auto_new_marking != plan.auto_new_marking {
            edits.push(EditInput::new("auto_new_marking", plan.auto_new_marking));
        }
        if current.max_confidence != plan.max_confidence_level {
            edits.push(EditInput::new(
                "group_confidence_level",
                json!({"max_confidence": plan.max_confidence_level, "overrides": []}),
            ));
        }
        if !edits.is_empty() {
            self.api
                .patch_fields(ctx, EntityKind::Group, id, &edits)
                .remote(SUMMARY, "Could not update group")?;
        }

        let (roles, allowed_marking) = self.sync_relations(ctx, &current, &plan, SUMMARY, available)?;
        Ok(GroupModel {
            id: Some(id.to_string()),
            roles,
            allowed_marking,
            last_updated: Some(timestamp()),
            ..plan
        })
    }

    fn delete(&self, ctx: &ApplyContext, state: GroupModel) -> Result<()> {
        let id = require_id(state.id.as_deref())?;
        self.api
            .delete(ctx, EntityKind::Group, id)
            .remote("Error deleting group", "Could not delete group")?;
        log::info!("Deleted group {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{api, ctx, relation_calls, strings};
    use super::*;
    use opencti::MockApi;

    fn seeded() -> MockApi {
        let mock = MockApi::new();
        mock.add_role("Analyst");
        mock.add_role("Administrator");
        mock.add_marking("TLP", "TLP:GREEN");
        mock.add_marking("TLP", "TLP:AMBER");
        mock
    }

    fn plan(roles: &[&str], markings: &[&str]) -> GroupModel {
        GroupModel {
            name: "Blue Team".to_string(),
            roles: strings(roles),
            allowed_marking: strings(markings),
            ..GroupModel::default()
        }
    }

    #[test]
    fn test_defaults() {
        let model: GroupModel = serde_json::from_value(serde_json::json!({"name": "x"})).unwrap();
        assert_eq!(model.max_confidence_level, 100);
        assert!(!model.auto_new_marking);
    }

    #[test]
    fn test_create_then_read_round_trip() {
        let mock = seeded();
        let groups = GroupReconciler::new(api(&mock), UnresolvedPolicy::Fail);

        let mut desired = plan(&["Analyst"], &["TLP:GREEN", "TLP:AMBER"]);
        desired.max_confidence_level = 80;
        desired.default_assignation = true;
        let created = groups.create(&ctx(), desired).unwrap();

        assert_eq!(created.roles, vec!["Analyst"]);
        assert_eq!(created.allowed_marking, vec!["TLP:AMBER", "TLP:GREEN"]);
        assert_eq!(created.max_confidence_level, 80);

        let read = groups.read(&ctx(), created.clone()).unwrap();
        assert_eq!(read, created);
    }

    #[test]
    fn test_update_relations_and_scalars() {
        let mock = seeded();
        let groups = GroupReconciler::new(api(&mock), UnresolvedPolicy::Fail);
        let prior = groups
            .create(&ctx(), plan(&["Analyst"], &["TLP:GREEN"]))
            .unwrap();
        mock.clear_calls();

        let mut desired = plan(&["Administrator"], &["TLP:GREEN", "TLP:AMBER"]);
        desired.auto_new_marking = true;
        desired.max_confidence_level = 50;
        let updated = groups.update(&ctx(), prior.clone(), desired).unwrap();

        assert_eq!(updated.id, prior.id);
        assert_eq!(updated.roles, vec!["Administrator"]);
        assert_eq!(updated.allowed_marking, vec!["TLP:AMBER", "TLP:GREEN"]);
        assert_eq!(mock.count("patch_fields"), 1);
        assert_eq!(relation_calls(&mock), 3);

        let read = groups.read(&ctx(), updated).unwrap();
        assert!(read.auto_new_marking);
        assert_eq!(read.max_confidence_level, 50);

        mock.clear_calls();
        let again = groups.update(&ctx(), read.clone(), read).unwrap();
        assert_eq!(relation_calls(&mock), 0);
        assert_eq!(mock.count("patch_fields"), 0);
        assert_eq!(again.roles, vec!["Administrator"]);
    }

    #[test]
    fn test_unknown_marking_fails_before_create() {
        let mock = seeded();
        let groups = GroupReconciler::new(api(&mock), UnresolvedPolicy::Fail);

        let err = groups
            .create(&ctx(), plan(&["Analyst"], &["TLP:RED"]))
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { .. }));
        assert_eq!(mock.count("create_group"), 0);
    }

    #[test]
    fn test_unknown_marking_on_update_changes_nothing() {
        let mock = seeded();
        let groups = GroupReconciler::new(api(&mock), UnresolvedPolicy::Fail);
        let prior = groups
            .create(&ctx(), plan(&["Analyst"], &["TLP:GREEN"]))
            .unwrap();
        mock.clear_calls();

        let mut desired = plan(&[], &["TLP:RED"]);
        desired.auto_new_marking = true;
        let err = groups.update(&ctx(), prior.clone(), desired).unwrap_err();

        assert!(matches!(err, Error::UnresolvedReference { .. }));
        assert_eq!(relation_calls(&mock), 0);
        assert_eq!(mock.count("patch_fields"), 0);
        let read = groups.read(&ctx(), prior).unwrap();
        assert_eq!(read.roles, vec!["Analyst"]);
        assert_eq!(read.allowed_marking, vec!["TLP:GREEN"]);
        assert!(!read.auto_new_marking);
    }

    #[test]
    fn test_unknown_role_dropped_when_lenient() {
        let mock = seeded();
        let groups = GroupReconciler::new(api(&mock), UnresolvedPolicy::Ignore);

        let created = groups
            .create(&ctx(), plan(&["Analyst", "Ghost"], &[]))
            .unwrap();
        assert_eq!(created.roles, vec!["Analyst"]);
    }

    #[test]
    fn test_failed_assign_is_incomplete() {
        let mock = seeded();
        let groups = GroupReconciler::new(api(&mock), UnresolvedPolicy::Fail);
        mock.fail_on("add_relation");

        let err = groups
            .create(&ctx(), plan(&["Analyst"], &[]))
            .unwrap_err();
        let id = err.partial_state().unwrap()["id"].as_str().unwrap().to_string();
        assert!(mock.exists(EntityKind::Group, &id));
    }

    #[test]
    fn test_read_reflects_remote_drift() {
        let mock = seeded();
        let groups = GroupReconciler::new(api(&mock), UnresolvedPolicy::Fail);
        let created = groups.create(&ctx(), plan(&[], &[])).unwrap();

        let role = mock.add_role("Auditor");
        mock.link(Relation::GroupRole, created.id.as_deref().unwrap(), &role)
            .unwrap();

        let read = groups.read(&ctx(), created).unwrap();
        assert_eq!(read.roles, vec!["Auditor"]);
    }
}
