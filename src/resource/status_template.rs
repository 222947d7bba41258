//! Status template resource
//!
//! A status template is placed into the workflow of one or more entity types
//! at creation. The platform cannot take it out of a workflow again, so
//! `workflows` forces a replacement. Read only sees how many workflows use the
//! template; when that count drifts from state the workflows are cleared,
//! which makes the next plan replace the resource.

use super::timestamp;
use declarative::{
    ApplyContext, Attribute, AttributeType, Error, Reconciler, RemoteContext, Result, Schema,
    require_id,
};
use opencti::{Api, EditInput, EntityKind, StatusTemplate, StatusTemplateInput};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Placement of the status in the workflow of one entity type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowModel {
    /// Entity type, e.g. "Report"
    pub entity: String,
    pub order: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusTemplateModel {
    pub id: Option<String>,
    pub name: String,
    pub color: String,
    pub workflows: Vec<WorkflowModel>,
    pub last_updated: Option<String>,
}

impl StatusTemplateModel {
    fn from_remote(template: StatusTemplate, prior: StatusTemplateModel) -> Self {
        let tracked = i64::try_from(prior.workflows.len()).unwrap_or(i64::MAX);
        let workflows = if template.usages == tracked {
            prior.workflows
        } else {
            log::warn!(
                "Status template {} is used by {} workflow(s) but {} are tracked",
                template.id,
                template.usages,
                tracked
            );
            Vec::new()
        };

        Self {
            id: Some(template.id),
            name: template.name,
            color: template.color,
            workflows,
            last_updated: prior.last_updated,
        }
    }
}

pub struct StatusTemplateReconciler {
    api: Arc<dyn Api>,
}

impl StatusTemplateReconciler {
    pub fn new(api: Arc<dyn Api>) -> Self {
        Self { api }
    }
}

impl Reconciler for StatusTemplateReconciler {
    type Model = StatusTemplateModel;
    const TYPE_SUFFIX: &'static str = "status_template";

    fn schema() -> Schema {
        let workflow = AttributeType::object([
            (
                "entity",
                Attribute::required(AttributeType::String)
                    .with_description("Entity type whose workflow gets the status, e.g. Report"),
            ),
            (
                "order",
                Attribute::required(AttributeType::Number)
                    .with_description("Position of the status in that workflow"),
            ),
        ]);

        Schema::resource()
            .with_description("A workflow status such as NEW or IN_PROGRESS.")
            .attribute("name", Attribute::required(AttributeType::String))
            .attribute(
                "color",
                Attribute::required(AttributeType::String).with_description("Hex color, e.g. #ff9800"),
            )
            .attribute(
                "workflows",
                Attribute::optional(AttributeType::List(Box::new(workflow))).requires_replace(),
            )
    }

    fn create(&self, ctx: &ApplyContext, plan: StatusTemplateModel) -> Result<StatusTemplateModel> {
        const SUMMARY: &str = "Error creating status template";

        let template = self
            .api
            .create_status_template(
                ctx,
                &StatusTemplateInput {
                    name: plan.name.clone(),
                    color: plan.color.clone(),
                },
            )
            .remote(SUMMARY, "Could not create status template")?;
        log::info!("Created status template {} ({})", template.name, template.id);

        let mut state = StatusTemplateModel {
            id: Some(template.id.clone()),
            name: template.name,
            color: template.color,
            workflows: Vec::with_capacity(plan.workflows.len()),
            last_updated: Some(timestamp()),
        };

        for workflow in plan.workflows {
            if let Err(err) = self
                .api
                .set_status_in_workflow(ctx, &workflow.entity, &template.id, workflow.order)
                .remote(
                    SUMMARY,
                    &format!("Could not add status to the {} workflow", workflow.entity),
                )
            {
                return Err(Error::incomplete(&state, err));
            }
            state.workflows.push(workflow);
        }
        Ok(state)
    }

    fn read(&self, ctx: &ApplyContext, state: StatusTemplateModel) -> Result<StatusTemplateModel> {
        let id = require_id(state.id.as_deref())?;
        let template = self
            .api
            .read_status_template(ctx, id)
            .remote("Error reading status template", "Could not read status template")?;
        Ok(StatusTemplateModel::from_remote(template, state))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        prior: StatusTemplateModel,
        plan: StatusTemplateModel,
    ) -> Result<StatusTemplateModel> {
        let id = require_id(prior.id.as_deref())?;
        let mut edits = Vec::new();
        if prior.name != plan.name {
            edits.push(EditInput::new("name", plan.name.clone()));
        }
        if prior.color != plan.color {
            edits.push(EditInput::new("color", plan.color.clone()));
        }
        if !edits.is_empty() {
            self.api
                .patch_fields(ctx, EntityKind::StatusTemplate, id, &edits)
                .remote("Error updating status template", "Could not update status template")?;
        }

        Ok(StatusTemplateModel {
            id: Some(id.to_string()),
            last_updated: Some(timestamp()),
            ..plan
        })
    }

    fn delete(&self, ctx: &ApplyContext, state: StatusTemplateModel) -> Result<()> {
        let id = require_id(state.id.as_deref())?;
        self.api
            .delete(ctx, EntityKind::StatusTemplate, id)
            .remote("Error deleting status template", "Could not delete status template")?;
        log::info!("Deleted status template {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{api, ctx};
    use super::*;
    use opencti::MockApi;

    fn plan() -> StatusTemplateModel {
        StatusTemplateModel {
            name: "IN_REVIEW".to_string(),
            color: "#ff9800".to_string(),
            workflows: vec![
                WorkflowModel {
                    entity: "Report".to_string(),
                    order: 2,
                },
                WorkflowModel {
                    entity: "Case-Incident".to_string(),
                    order: 1,
                },
            ],
            ..StatusTemplateModel::default()
        }
    }

    #[test]
    fn test_create_places_status_in_workflows() {
        let mock = MockApi::new();
        let templates = StatusTemplateReconciler::new(api(&mock));

        let created = templates.create(&ctx(), plan()).unwrap();
        let id = created.id.clone().unwrap();
        assert_eq!(
            mock.workflows(),
            vec![
                ("Report".to_string(), id.clone(), 2),
                ("Case-Incident".to_string(), id, 1),
            ]
        );
        assert_eq!(templates.read(&ctx(), created.clone()).unwrap(), created);
    }

    #[test]
    fn test_workflow_drift_clears_workflows() {
        let mock = MockApi::new();
        let templates = StatusTemplateReconciler::new(api(&mock));
        let created = templates.create(&ctx(), plan()).unwrap();

        mock.clear_workflows(created.id.as_deref().unwrap());
        let read = templates.read(&ctx(), created).unwrap();
        assert!(read.workflows.is_empty());
        assert_eq!(read.name, "IN_REVIEW");
    }

    #[test]
    fn test_update_patches_name_and_color() {
        let mock = MockApi::new();
        let templates = StatusTemplateReconciler::new(api(&mock));
        let prior = templates.create(&ctx(), plan()).unwrap();

        let mut desired = prior.clone();
        desired.color = "#4caf50".to_string();
        let updated = templates.update(&ctx(), prior.clone(), desired).unwrap();

        assert_eq!(updated.id, prior.id);
        assert_eq!(mock.count("create_status_template"), 1);
        let read = templates.read(&ctx(), updated).unwrap();
        assert_eq!(read.color, "#4caf50");
        assert_eq!(read.workflows.len(), 2);
    }

    #[test]
    fn test_failed_workflow_keeps_template_tracked() {
        let mock = MockApi::new();
        mock.fail_on("set_status_in_workflow");
        let templates = StatusTemplateReconciler::new(api(&mock));

        let err = templates.create(&ctx(), plan()).unwrap_err();
        let state = err.partial_state().unwrap();
        assert_eq!(state["workflows"], serde_json::json!([]));
        let id = state["id"].as_str().unwrap();
        assert!(mock.exists(EntityKind::StatusTemplate, id));
    }
}
