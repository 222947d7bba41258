//! User resource
//!
//! Creating a user whose name already exists adopts the existing account
//! instead of failing, then converges it like an update. New accounts get a
//! random password; people sign in through SSO or reset it.

use super::{Link, linked, listing, names, timestamp};
use declarative::{
    ApplyContext, Attribute, AttributeType, Error, Linked, Reconciler, RemoteContext, Result,
    Schema, UnresolvedPolicy, require_id,
};
use opencti::{Api, ConfidenceLevel, EditInput, EntityKind, Relation, User, UserInput};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserModel {
    pub id: Option<String>,
    pub name: String,
    pub user_email: String,
    pub api_token: Option<String>,
    /// Group names, sorted
    pub groups: Vec<String>,
    pub user_confidence_level: ConfidenceLevel,
    pub last_updated: Option<String>,
}

impl UserModel {
    fn from_remote(user: User, prior: &Self) -> Self {
        Self {
            groups: names(&user.groups),
            id: Some(user.id),
            name: user.name,
            user_email: user.user_email,
            api_token: user.api_token.or_else(|| prior.api_token.clone()),
            user_confidence_level: user
                .user_confidence_level
                .unwrap_or_else(|| prior.user_confidence_level.clone()),
            last_updated: prior.last_updated.clone(),
        }
    }
}

pub struct UserReconciler {
    api: Arc<dyn Api>,
    policy: UnresolvedPolicy,
}

impl UserReconciler {
    pub fn new(api: Arc<dyn Api>, policy: UnresolvedPolicy) -> Self {
        Self { api, policy }
    }

    fn link<'a>(&'a self, ctx: &'a ApplyContext, id: &'a str, summary: &'a str) -> Link<'a> {
        Link {
            api: self.api.as_ref(),
            ctx,
            relation: Relation::UserGroup,
            owner_id: id,
            policy: self.policy,
            summary,
        }
    }

    fn groups(&self, ctx: &ApplyContext, summary: &str) -> Result<Vec<Linked>> {
        Ok(linked(
            self.api
                .list_groups(ctx)
                .remote(summary, "Could not list groups")?,
        ))
    }

    /// Existing account with the planned name, if any
    fn find_by_name(&self, ctx: &ApplyContext, name: &str) -> Result<Option<User>> {
        let users = self
            .api
            .list_users(ctx)
            .remote("Error creating user", "Could not list users")?;
        match users.into_iter().find(|u| u.name == name) {
            Some(existing) => Ok(Some(
                self.api
                    .read_user(ctx, &existing.id)
                    .remote("Error creating user", "Could not read existing user")?,
            )),
            None => Ok(None),
        }
    }

    /// Patch scalars that differ from the remote account
    fn patch(&self, ctx: &ApplyContext, current: &User, plan: &UserModel, summary: &str) -> Result<()> {
        let mut edits = Vec::new();
        if current.name != plan.name {
            edits.push(EditInput::new("name", plan.name.clone()));
        }
        if current.user_email != plan.user_email {
            edits.push(EditInput::new("user_email", plan.user_email.clone()));
        }
        if current.user_confidence_level.as_ref() != Some(&plan.user_confidence_level) {
            edits.push(EditInput::new(
                "user_confidence_level",
                serde_json::to_value(&plan.user_confidence_level)?,
            ));
        }
        if edits.is_empty() {
            return Ok(());
        }
        self.api
            .patch_fields(ctx, EntityKind::User, &current.id, &edits)
            .remote(summary, "Could not update user")
    }
}

impl Reconciler for UserReconciler {
    type Model = UserModel;
    const TYPE_SUFFIX: &'static str = "user";

    fn schema() -> Schema {
        let override_attributes = [
            ("entity_type", Attribute::required(AttributeType::String)),
            ("max_confidence", Attribute::required(AttributeType::Number)),
        ];
        let level = AttributeType::object([
            (
                "max_confidence",
                Attribute::optional_computed(AttributeType::Number)
                    .with_description("Defaults to 100"),
            ),
            (
                "overrides",
                Attribute::optional_computed(AttributeType::List(Box::new(
                    AttributeType::object(override_attributes),
                ))),
            ),
        ]);

        Schema::resource()
            .with_description("A platform user account.")
            .attribute("name", Attribute::required(AttributeType::String))
            .attribute("user_email", Attribute::required(AttributeType::String))
            .attribute(
                "api_token",
                Attribute::computed(AttributeType::String)
                    .sensitive()
                    .use_state_for_unknown()
                    .with_description("API token issued to the user"),
            )
            .attribute(
                "groups",
                Attribute::optional_computed(AttributeType::string_list())
                    .with_description("Names of the groups the user belongs to"),
            )
            .attribute("user_confidence_level", Attribute::optional_computed(level))
    }

    fn create(&self, ctx: &ApplyContext, plan: UserModel) -> Result<UserModel> {
        const SUMMARY: &str = "Error creating user";

        let available = listing(&[], &plan.groups, || self.groups(ctx, SUMMARY))?;
        self.link(ctx, "", SUMMARY)
            .preflight(&[], &plan.groups, &available)?;

        let user = match self.find_by_name(ctx, &plan.name)? {
            Some(existing) => {
                log::info!("Adopting existing user {} ({})", existing.name, existing.id);
                existing
            }
            None => {
                let user = self
                    .api
                    .create_user(
                        ctx,
                        &UserInput {
                            name: plan.name.clone(),
                            user_email: plan.user_email.clone(),
                            password: uuid::Uuid::new_v4().to_string(),
                            user_confidence_level: plan.user_confidence_level.clone(),
                        },
                    )
                    .remote(SUMMARY, "Could not create user")?;
                log::info!("Created user {} ({})", user.name, user.id);
                user
            }
        };

        let id = user.id.clone();
        let current_groups = linked(user.groups.clone());
        let mut state = UserModel::from_remote(
            user.clone(),
            &UserModel {
                last_updated: Some(timestamp()),
                ..plan.clone()
            },
        );

        let converged = self.patch(ctx, &user, &plan, SUMMARY).and_then(|()| {
            self.link(ctx, &id, SUMMARY)
                .sync(&current_groups, &plan.groups, || Ok(available))
        });
        match converged {
            Ok(reconciled) => {
                state.name = plan.name;
                state.user_email = plan.user_email;
                state.user_confidence_level = plan.user_confidence_level;
                state.groups = reconciled.names;
                Ok(state)
            }
            Err(err) => Err(Error::incomplete(&state, err)),
        }
    }

    fn read(&self, ctx: &ApplyContext, state: UserModel) -> Result<UserModel> {
        let id = require_id(state.id.as_deref())?;
        let user = self
            .api
            .read_user(ctx, id)
            .remote("Error reading user", "Could not read user")?;
        Ok(UserModel::from_remote(user, &state))
    }

    fn update(&self, ctx: &ApplyContext, prior: UserModel, plan: UserModel) -> Result<UserModel> {
        const SUMMARY: &str = "Error updating user";

        let id = require_id(prior.id.as_deref())?;
        let current = self
            .api
            .read_user(ctx, id)
            .remote(SUMMARY, "Could not read user")?;

        let link = self.link(ctx, id, SUMMARY);
        let current_groups = linked(current.groups.clone());
        let available = listing(&current_groups, &plan.groups, || self.groups(ctx, SUMMARY))?;
        link.preflight(&current_groups, &plan.groups, &available)?;

        self.patch(ctx, &current, &plan, SUMMARY)?;
        let reconciled = link.sync(&current_groups, &plan.groups, || Ok(available))?;

        Ok(UserModel {
            id: Some(id.to_string()),
            api_token: current.api_token.or(prior.api_token),
            groups: reconciled.names,
            last_updated: Some(timestamp()),
            ..plan
        })
    }

    fn delete(&self, ctx: &ApplyContext, state: UserModel) -> Result<()> {
        let id = require_id(state.id.as_deref())?;
        self.api
            .delete(ctx, EntityKind::User, id)
            .remote("Error deleting user", "Could not delete user")?;
        log::info!("Deleted user {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{api, ctx, relation_calls, resources, strings};
    use super::*;
    use declarative::{LifecycleRequest, execute, schema::REDACTED};
    use opencti::{ConfidenceOverride, MockApi};
    use serde_json::json;

    fn seeded() -> MockApi {
        let mock = MockApi::new();
        mock.add_group("Analysts");
        mock.add_group("Connectors");
        mock
    }

    fn plan(name: &str, groups: &[&str]) -> UserModel {
        UserModel {
            name: name.to_string(),
            user_email: format!("{}@example.com", name.to_lowercase()),
            groups: strings(groups),
            ..UserModel::default()
        }
    }

    #[test]
    fn test_create_then_read_round_trip() {
        let mock = seeded();
        let users = UserReconciler::new(api(&mock), UnresolvedPolicy::Fail);

        let mut desired = plan("Alice", &["Connectors", "Analysts"]);
        desired.user_confidence_level = ConfidenceLevel {
            max_confidence: 80,
            overrides: vec![ConfidenceOverride {
                entity_type: "Report".to_string(),
                max_confidence: 50,
            }],
        };
        let created = users.create(&ctx(), desired.clone()).unwrap();

        assert_eq!(created.groups, vec!["Analysts", "Connectors"]);
        assert!(created.api_token.is_some());
        assert_eq!(created.user_confidence_level, desired.user_confidence_level);
        assert_eq!(mock.count("create_user"), 1);

        let read = users.read(&ctx(), created.clone()).unwrap();
        assert_eq!(read, created);
    }

    #[test]
    fn test_create_adopts_existing_user() {
        let mock = seeded();
        let existing = mock.add_user("Bob", "old@example.com");
        let users = UserReconciler::new(api(&mock), UnresolvedPolicy::Fail);

        let created = users.create(&ctx(), plan("Bob", &["Analysts"])).unwrap();

        assert_eq!(created.id.as_deref(), Some(existing.as_str()));
        assert_eq!(mock.count("create_user"), 0);
        let read = users.read(&ctx(), created).unwrap();
        assert_eq!(read.user_email, "bob@example.com");
        assert_eq!(read.groups, vec!["Analysts"]);
    }

    #[test]
    fn test_update_groups_idempotent() {
        let mock = seeded();
        let users = UserReconciler::new(api(&mock), UnresolvedPolicy::Fail);
        let prior = users.create(&ctx(), plan("Carol", &["Analysts"])).unwrap();

        let desired = plan("Carol", &["Connectors"]);
        let first = users.update(&ctx(), prior, desired.clone()).unwrap();
        assert_eq!(first.groups, vec!["Connectors"]);
        assert!(first.api_token.is_some());

        mock.clear_calls();
        users.update(&ctx(), first, desired).unwrap();
        assert_eq!(relation_calls(&mock), 0);
        assert_eq!(mock.count("patch_fields"), 0);
    }

    #[test]
    fn test_unknown_group_fails_before_create() {
        let mock = seeded();
        let users = UserReconciler::new(api(&mock), UnresolvedPolicy::Fail);

        let err = users
            .create(&ctx(), plan("Dave", &["Analysts", "Ghosts"]))
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { .. }));
        assert_eq!(mock.count("create_user"), 0);
    }

    #[test]
    fn test_unknown_group_on_update_changes_nothing() {
        let mock = seeded();
        let users = UserReconciler::new(api(&mock), UnresolvedPolicy::Fail);
        let prior = users.create(&ctx(), plan("Erin", &["Analysts"])).unwrap();
        mock.clear_calls();

        let mut desired = plan("Erin", &["Ghosts"]);
        desired.user_email = "new@example.com".to_string();
        let err = users.update(&ctx(), prior.clone(), desired).unwrap_err();

        assert!(matches!(err, Error::UnresolvedReference { .. }));
        assert_eq!(relation_calls(&mock), 0);
        assert_eq!(mock.count("patch_fields"), 0);
        let read = users.read(&ctx(), prior).unwrap();
        assert_eq!(read.groups, vec!["Analysts"]);
        assert_eq!(read.user_email, "erin@example.com");
    }

    #[test]
    fn test_unknown_group_dropped_when_lenient() {
        let mock = seeded();
        let users = UserReconciler::new(api(&mock), UnresolvedPolicy::Ignore);

        let created = users
            .create(&ctx(), plan("Dave", &["Analysts", "Ghosts"]))
            .unwrap();
        assert_eq!(created.groups, vec!["Analysts"]);
    }

    #[test]
    fn test_token_redacted_from_logs_but_kept_in_state() {
        let mock = seeded();
        let registry = resources(&mock);
        let resource = registry.get("opencti_user").unwrap();

        let response = execute(
            &registry,
            &ctx(),
            LifecycleRequest::Create {
                type_name: "opencti_user".to_string(),
                planned: json!({"name": "Eve", "user_email": "eve@example.com"}),
            },
        );
        let state = response.state.unwrap();
        assert!(state["api_token"].as_str().unwrap().starts_with("token-"));
        assert_eq!(resource.schema().redact(&state)["api_token"], REDACTED);
    }
}
