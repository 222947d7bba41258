//! Case template resource
//!
//! The platform has no way to edit the task list of a template, so every
//! attribute forces a replacement.

use super::{optional, timestamp};
use declarative::{
    ApplyContext, Attribute, AttributeType, Error, Reconciler, RemoteContext, Result, Schema,
    require_id,
};
use opencti::{Api, CaseTemplate, CaseTemplateInput, EntityKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseTemplateModel {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    /// Task template ids, sorted
    pub tasks: Vec<String>,
    pub last_updated: Option<String>,
}

impl CaseTemplateModel {
    fn from_remote(template: CaseTemplate, last_updated: Option<String>) -> Self {
        let mut tasks: Vec<String> = template.tasks.into_iter().map(|t| t.id).collect();
        tasks.sort();
        Self {
            id: Some(template.id),
            name: template.name,
            description: optional(template.description),
            tasks,
            last_updated,
        }
    }
}

pub struct CaseTemplateReconciler {
    api: Arc<dyn Api>,
}

impl CaseTemplateReconciler {
    pub fn new(api: Arc<dyn Api>) -> Self {
        Self { api }
    }
}

impl Reconciler for CaseTemplateReconciler {
    type Model = CaseTemplateModel;
    const TYPE_SUFFIX: &'static str = "case_template";

    fn schema() -> Schema {
        Schema::resource()
            .with_description("A template of tasks added to new cases. Changes replace the template.")
            .attribute(
                "name",
                Attribute::required(AttributeType::String).requires_replace(),
            )
            .attribute(
                "description",
                Attribute::optional(AttributeType::String).requires_replace(),
            )
            .attribute(
                "tasks",
                Attribute::required(AttributeType::string_set())
                    .requires_replace()
                    .with_description("Ids of the task templates in this case template"),
            )
    }

    fn create(&self, ctx: &ApplyContext, plan: CaseTemplateModel) -> Result<CaseTemplateModel> {
        let mut tasks = plan.tasks;
        tasks.sort();
        tasks.dedup();

        let template = self
            .api
            .create_case_template(
                ctx,
                &CaseTemplateInput {
                    name: plan.name,
                    description: plan.description,
                    tasks,
                },
            )
            .remote("Error creating case template", "Could not create case template")?;
        log::info!("Created case template {} ({})", template.name, template.id);
        Ok(CaseTemplateModel::from_remote(template, Some(timestamp())))
    }

    fn read(&self, ctx: &ApplyContext, state: CaseTemplateModel) -> Result<CaseTemplateModel> {
        let id = require_id(state.id.as_deref())?;
        let template = self
            .api
            .read_case_template(ctx, id)
            .remote("Error reading case template", "Could not read case template")?;
        Ok(CaseTemplateModel::from_remote(template, state.last_updated))
    }

    fn update(
        &self,
        _ctx: &ApplyContext,
        _prior: CaseTemplateModel,
        _plan: CaseTemplateModel,
    ) -> Result<CaseTemplateModel> {
        Err(Error::RequiresReplace {
            resource_type: format!("{}_{}", super::PROVIDER_TYPE_NAME, Self::TYPE_SUFFIX),
            attributes: vec![
                "description".to_string(),
                "name".to_string(),
                "tasks".to_string(),
            ],
        })
    }

    fn delete(&self, ctx: &ApplyContext, state: CaseTemplateModel) -> Result<()> {
        let id = require_id(state.id.as_deref())?;
        self.api
            .delete(ctx, EntityKind::CaseTemplate, id)
            .remote("Error deleting case template", "Could not delete case template")?;
        log::info!("Deleted case template {id}");
        Ok(())
    }
}
