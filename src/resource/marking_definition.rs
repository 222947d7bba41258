//! Marking definition resource, e.g. TLP:GREEN

use super::timestamp;
use declarative::{
    ApplyContext, Attribute, AttributeType, Reconciler, RemoteContext, Result, Schema, require_id,
};
use opencti::{Api, EditInput, EntityKind, MarkingDefinition, MarkingDefinitionInput};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkingDefinitionModel {
    pub id: Option<String>,
    pub definition_type: String,
    pub definition: String,
    pub x_opencti_order: i64,
    pub x_opencti_color: Option<String>,
    pub last_updated: Option<String>,
}

impl MarkingDefinitionModel {
    fn from_remote(marking: MarkingDefinition, last_updated: Option<String>) -> Self {
        Self {
            id: Some(marking.id),
            definition_type: marking.definition_type,
            definition: marking.definition,
            x_opencti_order: marking.x_opencti_order,
            x_opencti_color: marking.x_opencti_color,
            last_updated,
        }
    }
}

pub struct MarkingDefinitionReconciler {
    api: Arc<dyn Api>,
}

impl MarkingDefinitionReconciler {
    pub fn new(api: Arc<dyn Api>) -> Self {
        Self { api }
    }
}

impl Reconciler for MarkingDefinitionReconciler {
    type Model = MarkingDefinitionModel;
    const TYPE_SUFFIX: &'static str = "marking_definition";

    fn schema() -> Schema {
        Schema::resource()
            .with_description("A data marking that restricts who can see tagged knowledge.")
            .attribute(
                "definition_type",
                Attribute::required(AttributeType::String)
                    .with_description("Marking family, e.g. TLP or PAP"),
            )
            .attribute(
                "definition",
                Attribute::required(AttributeType::String)
                    .with_description("Display name, e.g. TLP:GREEN"),
            )
            .attribute(
                "x_opencti_order",
                Attribute::required(AttributeType::Number)
                    .with_description("Rank of the marking within its family"),
            )
            .attribute(
                "x_opencti_color",
                Attribute::optional(AttributeType::String).with_description("Hex color, e.g. #2e7d32"),
            )
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: MarkingDefinitionModel,
    ) -> Result<MarkingDefinitionModel> {
        let marking = self
            .api
            .create_marking_definition(
                ctx,
                &MarkingDefinitionInput {
                    definition_type: plan.definition_type,
                    definition: plan.definition,
                    x_opencti_order: plan.x_opencti_order,
                    x_opencti_color: plan.x_opencti_color,
                },
            )
            .remote(
                "Error creating marking definition",
                "Could not create marking definition",
            )?;
        log::info!("Created marking definition {} ({})", marking.definition, marking.id);
        Ok(MarkingDefinitionModel::from_remote(marking, Some(timestamp())))
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: MarkingDefinitionModel,
    ) -> Result<MarkingDefinitionModel> {
        let id = require_id(state.id.as_deref())?;
        let marking = self.api.read_marking_definition(ctx, id).remote(
            "Error reading marking definition",
            "Could not read marking definition",
        )?;
        Ok(MarkingDefinitionModel::from_remote(marking, state.last_updated))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        prior: MarkingDefinitionModel,
        plan: MarkingDefinitionModel,
    ) -> Result<MarkingDefinitionModel> {
        const SUMMARY: &str = "Error updating marking definition";

        let id = require_id(prior.id.as_deref())?;
        let current = self
            .api
            .read_marking_definition(ctx, id)
            .remote(SUMMARY, "Could not read marking definition")?;

        let mut edits = Vec::new();
        if current.definition_type != plan.definition_type {
            edits.push(EditInput::new("definition_type", plan.definition_type.clone()));
        }
        if current.definition != plan.definition {
            edits.push(EditInput::new("definition", plan.definition.clone()));
        }
        if current.x_opencti_order != plan.x_opencti_order {
            edits.push(EditInput::new("x_opencti_order", plan.x_opencti_order));
        }
        if current.x_opencti_color != plan.x_opencti_color {
            edits.push(EditInput::new("x_opencti_color", plan.x_opencti_color.clone()));
        }
        if !edits.is_empty() {
            self.api
                .patch_fields(ctx, EntityKind::MarkingDefinition, id, &edits)
                .remote(SUMMARY, "Could not update marking definition")?;
        }

        Ok(MarkingDefinitionModel {
            id: Some(id.to_string()),
            last_updated: Some(timestamp()),
            ..plan
        })
    }

    fn delete(&self, ctx: &ApplyContext, state: MarkingDefinitionModel) -> Result<()> {
        let id = require_id(state.id.as_deref())?;
        self.api
            .delete(ctx, EntityKind::MarkingDefinition, id)
            .remote(
                "Error deleting marking definition",
                "Could not delete marking definition",
            )?;
        log::info!("Deleted marking definition {id}");
        Ok(())
    }
}
