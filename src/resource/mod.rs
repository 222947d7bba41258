//! Reconcilers for the OpenCTI entity kinds
//!
//! Each kind is a [`Reconciler`] over a flat state model. All of them share
//! one [`Api`] handle, injected when the provider is configured.

mod case_template;
mod group;
mod marking_definition;
mod role;
mod status_template;
mod task_template;
mod user;
mod vocabulary;

use case_template::CaseTemplateReconciler;
use group::GroupReconciler;
use marking_definition::MarkingDefinitionReconciler;
use role::RoleReconciler;
use status_template::StatusTemplateReconciler;
use task_template::TaskTemplateReconciler;
use user::UserReconciler;
use vocabulary::VocabularyReconciler;

use declarative::{
    ApplyContext, Association, Linked, Reconciled, Reconciler, RemoteContext, ResourceRegistry,
    Result, Schema, Typed, UnresolvedPolicy,
};
use opencti::{Api, EntityRef, Relation};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Type name prefix of every resource
pub const PROVIDER_TYPE_NAME: &str = "opencti";

/// Format of `last_updated`, e.g. "Monday, 02-Jan-06 15:04:05 UTC"
const LAST_UPDATED_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S UTC";

/// Build the registry of all resource types over one API handle
pub fn registry(api: &Arc<dyn Api>, policy: UnresolvedPolicy) -> ResourceRegistry {
    let mut registry = ResourceRegistry::new(PROVIDER_TYPE_NAME);
    registry.register(Typed::boxed(
        PROVIDER_TYPE_NAME,
        RoleReconciler::new(Arc::clone(api), policy),
    ));
    registry.register(Typed::boxed(
        PROVIDER_TYPE_NAME,
        GroupReconciler::new(Arc::clone(api), policy),
    ));
    registry.register(Typed::boxed(
        PROVIDER_TYPE_NAME,
        UserReconciler::new(Arc::clone(api), policy),
    ));
    registry.register(Typed::boxed(
        PROVIDER_TYPE_NAME,
        MarkingDefinitionReconciler::new(Arc::clone(api)),
    ));
    registry.register(Typed::boxed(
        PROVIDER_TYPE_NAME,
        CaseTemplateReconciler::new(Arc::clone(api)),
    ));
    registry.register(Typed::boxed(
        PROVIDER_TYPE_NAME,
        TaskTemplateReconciler::new(Arc::clone(api)),
    ));
    registry.register(Typed::boxed(
        PROVIDER_TYPE_NAME,
        StatusTemplateReconciler::new(Arc::clone(api)),
    ));
    registry.register(Typed::boxed(
        PROVIDER_TYPE_NAME,
        VocabularyReconciler::new(Arc::clone(api)),
    ));
    registry
}

/// Schemas of all resource types, available before configuration
pub fn schemas() -> BTreeMap<String, Schema> {
    fn entry<R: Reconciler>() -> (String, Schema) {
        (format!("{PROVIDER_TYPE_NAME}_{}", R::TYPE_SUFFIX), R::schema())
    }

    BTreeMap::from([
        entry::<RoleReconciler>(),
        entry::<GroupReconciler>(),
        entry::<UserReconciler>(),
        entry::<MarkingDefinitionReconciler>(),
        entry::<CaseTemplateReconciler>(),
        entry::<TaskTemplateReconciler>(),
        entry::<StatusTemplateReconciler>(),
        entry::<VocabularyReconciler>(),
    ])
}

/// Current time in the `last_updated` format
pub(crate) fn timestamp() -> String {
    chrono::Utc::now().format(LAST_UPDATED_FORMAT).to_string()
}

/// Empty descriptions read back from the platform count as unset
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub(crate) fn linked(refs: Vec<EntityRef>) -> Vec<Linked> {
    refs.into_iter().map(Linked::from).collect()
}

/// Sorted names of related entities
pub(crate) fn names(refs: &[EntityRef]) -> Vec<String> {
    let mut names: Vec<String> = refs.iter().map(|r| r.name.clone()).collect();
    names.sort();
    names
}

/// One relation of one remote entity
pub(crate) struct Link<'a> {
    pub api: &'a dyn Api,
    pub ctx: &'a ApplyContext,
    pub relation: Relation,
    pub owner_id: &'a str,
    pub policy: UnresolvedPolicy,
    /// Diagnostic title, e.g. "Error updating role"
    pub summary: &'a str,
}

impl Link<'_> {
    /// Fail before anything changes if a desired name cannot be resolved
    pub fn preflight(&self, current: &[Linked], desired: &[String], available: &[Linked]) -> Result<()> {
        self.association(current, desired).preflight(available)
    }

    /// Converge the links to the desired names
    pub fn sync<L>(&self, current: &[Linked], desired: &[String], list_available: L) -> Result<Reconciled>
    where
        L: FnOnce() -> Result<Vec<Linked>>,
    {
        let target = self.relation.target_label();
        let reconciled = self.association(current, desired).reconcile(
            list_available,
            |linked| {
                self.api
                    .add_relation(self.ctx, self.relation, self.owner_id, &linked.id)
                    .remote(self.summary, &format!("Could not add {target} {}", linked.name))
            },
            |linked| {
                self.api
                    .remove_relation(self.ctx, self.relation, self.owner_id, &linked.id)
                    .remote(self.summary, &format!("Could not remove {target} {}", linked.name))
            },
        )?;

        if reconciled.changes() > 0 {
            log::info!(
                "{} {}: +{} -{} {target}(s)",
                self.relation.owner(),
                self.owner_id,
                reconciled.assigned.len(),
                reconciled.unassigned.len()
            );
        }
        Ok(reconciled)
    }

    fn association<'b>(&self, current: &'b [Linked], desired: &'b [String]) -> Association<'b> {
        Association {
            relation: self.relation.target_label(),
            current,
            desired,
            policy: self.policy,
        }
    }
}

/// Listing used to resolve names, fetched only when a name is not linked yet
pub(crate) fn listing<F>(current: &[Linked], desired: &[String], list: F) -> Result<Vec<Linked>>
where
    F: FnOnce() -> Result<Vec<Linked>>,
{
    let missing = desired
        .iter()
        .any(|name| !current.iter().any(|linked| &linked.name == name));
    if missing { list() } else { Ok(Vec::new()) }
}


#[cfg(test)]
mod tests {
    use super::testing::strings;
    use super::*;
    use opencti::MockApi;

    #[test]
    fn test_registry_has_all_types() {
        let api: Arc<dyn Api> = Arc::new(MockApi::new());
        let registry = registry(&api, UnresolvedPolicy::Fail);
        assert_eq!(
            registry.type_names(),
            vec![
                "opencti_case_template",
                "opencti_group",
                "opencti_marking_definition",
                "opencti_role",
                "opencti_status_template",
                "opencti_task_template",
                "opencti_user",
                "opencti_vocabulary",
            ]
        );
        assert_eq!(registry.schemas(), schemas());
    }

    #[test]
    fn test_timestamp_format() {
        let stamp = timestamp();
        assert!(stamp.ends_with(" UTC"));
        assert!(chrono::NaiveDateTime::parse_from_str(&stamp, LAST_UPDATED_FORMAT).is_ok());
    }

    #[test]
    fn test_names_sorted() {
        let refs = vec![EntityRef::new("2", "b"), EntityRef::new("1", "a")];
        assert_eq!(names(&refs), vec!["a", "b"]);
    }

    #[test]
    fn test_listing_skipped_when_nothing_wanted() {
        let listed = listing(&[], &[], || panic!("listed")).unwrap();
        assert!(listed.is_empty());

        let current = vec![Linked::new("cap-1", "KNOWLEDGE")];
        let listed = listing(&current, &strings(&["KNOWLEDGE"]), || panic!("listed")).unwrap();
        assert!(listed.is_empty());

        let listed = listing(&current, &strings(&["EXPLORE"]), || {
            Ok(vec![Linked::new("cap-2", "EXPLORE")])
        })
        .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn test_optional_drops_empty() {
        assert_eq!(optional(Some(String::new())), None);
        assert_eq!(optional(Some("x".to_string())), Some("x".to_string()));
    }
}
