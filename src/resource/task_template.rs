//! Task template resource

use super::{optional, timestamp};
use declarative::{
    ApplyContext, Attribute, AttributeType, Reconciler, RemoteContext, Result, Schema, require_id,
};
use opencti::{Api, EditInput, EntityKind, TaskTemplate, TaskTemplateInput};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskTemplateModel {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub last_updated: Option<String>,
}

impl TaskTemplateModel {
    fn from_remote(template: TaskTemplate, last_updated: Option<String>) -> Self {
        Self {
            id: Some(template.id),
            name: template.name,
            description: optional(template.description),
            last_updated,
        }
    }
}

pub struct TaskTemplateReconciler {
    api: Arc<dyn Api>,
}

impl TaskTemplateReconciler {
    pub fn new(api: Arc<dyn Api>) -> Self {
        Self { api }
    }
}

impl Reconciler for TaskTemplateReconciler {
    type Model = TaskTemplateModel;
    const TYPE_SUFFIX: &'static str = "task_template";

    fn schema() -> Schema {
        Schema::resource()
            .with_description("A task that case templates add to new cases.")
            .attribute("name", Attribute::required(AttributeType::String))
            .attribute("description", Attribute::optional(AttributeType::String))
    }

    fn create(&self, ctx: &ApplyContext, plan: TaskTemplateModel) -> Result<TaskTemplateModel> {
        let template = self
            .api
            .create_task_template(
                ctx,
                &TaskTemplateInput {
                    name: plan.name,
                    description: plan.description,
                },
            )
            .remote("Error creating task template", "Could not create task template")?;
        log::info!("Created task template {} ({})", template.name, template.id);
        Ok(TaskTemplateModel::from_remote(template, Some(timestamp())))
    }

    fn read(&self, ctx: &ApplyContext, state: TaskTemplateModel) -> Result<TaskTemplateModel> {
        let id = require_id(state.id.as_deref())?;
        let template = self
            .api
            .read_task_template(ctx, id)
            .remote("Error reading task template", "Could not read task template")?;
        Ok(TaskTemplateModel::from_remote(template, state.last_updated))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        prior: TaskTemplateModel,
        plan: TaskTemplateModel,
    ) -> Result<TaskTemplateModel> {
        const SUMMARY: &str = "Error updating task template";

        let id = require_id(prior.id.as_deref())?;
        let current = self
            .api
            .read_task_template(ctx, id)
            .remote(SUMMARY, "Could not read task template")?;

        let mut edits = Vec::new();
        if current.name != plan.name {
            edits.push(EditInput::new("name", plan.name.clone()));
        }
        if optional(current.description) != plan.description {
            edits.push(EditInput::new("description", plan.description.clone()));
        }
        if !edits.is_empty() {
            self.api
                .patch_fields(ctx, EntityKind::TaskTemplate, id, &edits)
                .remote(SUMMARY, "Could not update task template")?;
        }

        Ok(TaskTemplateModel {
            id: Some(id.to_string()),
            last_updated: Some(timestamp()),
            ..plan
        })
    }

    fn delete(&self, ctx: &ApplyContext, state: TaskTemplateModel) -> Result<()> {
        let id = require_id(state.id.as_deref())?;
        self.api
            .delete(ctx, EntityKind::TaskTemplate, id)
            .remote("Error deleting task template", "Could not delete task template")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{api, ctx};
    use super::*;
    use declarative::ErrorClass;
    use opencti::MockApi;

    fn triage(mock: &MockApi) -> (TaskTemplateReconciler, TaskTemplateModel) {
        let templates = TaskTemplateReconciler::new(api(mock));
        let created = templates
            .create(
                &ctx(),
                TaskTemplateModel {
                    name: "Triage".to_string(),
                    description: Some("First look".to_string()),
                    ..TaskTemplateModel::default()
                },
            )
            .unwrap();
        (templates, created)
    }

    #[test]
    fn test_lifecycle() {
        let mock = MockApi::new();
        let templates = TaskTemplateReconciler::new(api(&mock));

        let created = templates
            .create(
                &ctx(),
                TaskTemplateModel {
                    name: "Collect logs".to_string(),
                    ..TaskTemplateModel::default()
                },
            )
            .unwrap();
        assert_eq!(templates.read(&ctx(), created.clone()).unwrap(), created);

        let mut desired = created.clone();
        desired.description = Some("From every affected host".to_string());
        let updated = templates.update(&ctx(), created.clone(), desired).unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(mock.count("create_task_template"), 1);

        let read = templates.read(&ctx(), updated.clone()).unwrap();
        assert_eq!(read.description.as_deref(), Some("From every affected host"));

        templates.delete(&ctx(), updated).unwrap();
        assert!(templates.read(&ctx(), read).is_err());
    }

    #[test]
    fn test_unchanged_update_sends_no_patch() {
        let mock = MockApi::new();
        let (templates, created) = triage(&mock);
        mock.clear_calls();

        let updated = templates
            .update(&ctx(), created.clone(), created.clone())
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(mock.count("patch_fields"), 0);
    }

    #[test]
    fn test_update_patches_only_changed_fields() {
        let mock = MockApi::new();
        let (templates, created) = triage(&mock);
        mock.clear_calls();

        let mut desired = created.clone();
        desired.name = "Initial triage".to_string();
        let updated = templates.update(&ctx(), created, desired).unwrap();

        assert_eq!(mock.count("patch_fields"), 1);
        let read = templates.read(&ctx(), updated).unwrap();
        assert_eq!(read.name, "Initial triage");
        assert_eq!(read.description.as_deref(), Some("First look"));
    }

    #[test]
    fn test_delete_missing_task_template() {
        let mock = MockApi::new();
        let (templates, kept) = triage(&mock);

        let err = templates
            .delete(
                &ctx(),
                TaskTemplateModel {
                    id: Some("task-template--missing".to_string()),
                    ..TaskTemplateModel::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Remote);
        assert_eq!(err.to_diagnostic().summary, "Error deleting task template");
        let kept_id = kept.id.as_deref().unwrap();
        assert!(mock.exists(EntityKind::TaskTemplate, kept_id));
    }
}
