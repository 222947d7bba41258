//! Vocabulary resource: one entry of an open vocabulary category

use super::{optional, timestamp};
use declarative::{
    ApplyContext, Attribute, AttributeType, Reconciler, RemoteContext, Result, Schema, require_id,
};
use opencti::{Api, EditInput, EntityKind, Vocabulary, VocabularyInput};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyModel {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub last_updated: Option<String>,
}

impl VocabularyModel {
    fn from_remote(vocabulary: Vocabulary, last_updated: Option<String>) -> Self {
        Self {
            id: Some(vocabulary.id),
            name: vocabulary.name,
            description: optional(vocabulary.description),
            category: vocabulary.category,
            last_updated,
        }
    }
}

pub struct VocabularyReconciler {
    api: Arc<dyn Api>,
}

impl VocabularyReconciler {
    pub fn new(api: Arc<dyn Api>) -> Self {
        Self { api }
    }
}

impl Reconciler for VocabularyReconciler {
    type Model = VocabularyModel;
    const TYPE_SUFFIX: &'static str = "vocabulary";

    fn schema() -> Schema {
        Schema::resource()
            .attribute("name", Attribute::required(AttributeType::String))
            .attribute("description", Attribute::optional(AttributeType::String))
            .attribute(
                "category",
                Attribute::required(AttributeType::String)
                    .requires_replace()
                    .with_description("Vocabulary category, e.g. report_types_ov"),
            )
    }

    fn create(&self, ctx: &ApplyContext, plan: VocabularyModel) -> Result<VocabularyModel> {
        let vocabulary = self
            .api
            .create_vocabulary(
                ctx,
                &VocabularyInput {
                    name: plan.name,
                    description: plan.description,
                    category: plan.category,
                },
            )
            .remote("Error creating vocabulary", "Could not create vocabulary")?;
        log::info!("Created vocabulary {} ({})", vocabulary.name, vocabulary.id);
        Ok(VocabularyModel::from_remote(vocabulary, Some(timestamp())))
    }

    fn read(&self, ctx: &ApplyContext, state: VocabularyModel) -> Result<VocabularyModel> {
        let id = require_id(state.id.as_deref())?;
        let vocabulary = self
            .api
            .read_vocabulary(ctx, id)
            .remote("Error reading vocabulary", "Could not read vocabulary")?;
        Ok(VocabularyModel::from_remote(vocabulary, state.last_updated))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        prior: VocabularyModel,
        plan: VocabularyModel,
    ) -> Result<VocabularyModel> {
        let id = require_id(prior.id.as_deref())?;
        let mut edits = Vec::new();
        if prior.name != plan.name {
            edits.push(EditInput::new("name", plan.name.clone()));
        }
        if prior.description != plan.description {
            edits.push(EditInput::new("description", plan.description.clone()));
        }
        if !edits.is_empty() {
            self.api
                .patch_fields(ctx, EntityKind::Vocabulary, id, &edits)
                .remote("Error updating vocabulary", "Could not update vocabulary")?;
        }

        Ok(VocabularyModel {
            id: Some(id.to_string()),
            last_updated: Some(timestamp()),
            ..plan
        })
    }

    fn delete(&self, ctx: &ApplyContext, state: VocabularyModel) -> Result<()> {
        let id = require_id(state.id.as_deref())?;
        self.api
            .delete(ctx, EntityKind::Vocabulary, id)
            .remote("Error deleting vocabulary", "Could not delete vocabulary")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{api, ctx, resources};
    use super::*;
    use declarative::{LifecycleRequest, execute};
    use opencti::MockApi;
    use serde_json::json;

    fn plan() -> VocabularyModel {
        VocabularyModel {
            name: "threat-report".to_string(),
            category: "report_types_ov".to_string(),
            ..VocabularyModel::default()
        }
    }

    #[test]
    fn test_create_then_read_round_trip() {
        let mock = MockApi::new();
        let vocabularies = VocabularyReconciler::new(api(&mock));

        let created = vocabularies.create(&ctx(), plan()).unwrap();
        assert_eq!(vocabularies.read(&ctx(), created.clone()).unwrap(), created);
    }

    #[test]
    fn test_update_patches_description() {
        let mock = MockApi::new();
        let vocabularies = VocabularyReconciler::new(api(&mock));
        let prior = vocabularies.create(&ctx(), plan()).unwrap();

        let mut desired = prior.clone();
        desired.description = Some("Reports about threats".to_string());
        let updated = vocabularies.update(&ctx(), prior.clone(), desired).unwrap();

        assert_eq!(updated.id, prior.id);
        let read = vocabularies.read(&ctx(), updated).unwrap();
        assert_eq!(read.description.as_deref(), Some("Reports about threats"));
    }

    #[test]
    fn test_category_change_requires_replacement() {
        let mock = MockApi::new();
        let registry = resources(&mock);
        let created = execute(
            &registry,
            &ctx(),
            LifecycleRequest::Create {
                type_name: "opencti_vocabulary".to_string(),
                planned: json!({"name": "threat-report", "category": "report_types_ov"}),
            },
        )
        .state
        .unwrap();

        let mut planned = created.clone();
        planned["category"] = json!("grouping_context_ov");
        let response = execute(
            &registry,
            &ctx(),
            LifecycleRequest::Update {
                type_name: "opencti_vocabulary".to_string(),
                prior: created,
                planned,
            },
        );
        assert!(response.has_error());
        assert_eq!(mock.count("patch_fields"), 0);
    }
}
