//! GraphQL backend.
//!
//! This module provides the [`GraphqlClient`] implementation of [`Api`],
//! which talks to the `/graphql` endpoint of an OpenCTI platform with a
//! bearer token.
//!
//! # Timeouts
//!
//! Each request is capped at the smaller of the client timeout and the time
//! left before the caller's deadline. Cancellation is checked before every
//! request; a request already on the wire runs until it completes or times out.

use crate::api::Api;
use crate::error::{Error, Result};
use crate::types::{
    CaseTemplate, CaseTemplateInput, ConfidenceLevel, EditInput, EntityKind, EntityRef, Group,
    GroupInput, MarkingDefinition, MarkingDefinitionInput, Relation, Role, RoleInput,
    StatusTemplate, StatusTemplateInput, TaskTemplate, TaskTemplateInput, User, UserInput,
    Vocabulary, VocabularyInput,
};
use declarative::ApplyContext;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::time::Duration;

/// Page size for list queries.
const PAGE_SIZE: u32 = 500;

const USER_AGENT: &str = concat!("terraform-provider-opencti/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Selections
// =============================================================================

const ROLE_FIELDS: &str = "id name description capabilities { id name }";
const GROUP_FIELDS: &str = "id name description default_assignation auto_new_marking \
    group_confidence_level { max_confidence } \
    roles { edges { node { id name } } } allowed_marking { id definition }";
const USER_FIELDS: &str = "id name user_email api_token \
    user_confidence_level { max_confidence overrides { entity_type max_confidence } } \
    groups { edges { node { id name } } }";
const MARKING_FIELDS: &str = "id definition_type definition x_opencti_order x_opencti_color";
const CASE_TEMPLATE_FIELDS: &str = "id name description tasks { edges { node { id name } } }";
const TASK_TEMPLATE_FIELDS: &str = "id name description";
const STATUS_TEMPLATE_FIELDS: &str = "id name color usages";
const VOCABULARY_FIELDS: &str = "id name description category { key }";
const REF_FIELDS: &str = "id name";

/// GraphQL client for an OpenCTI platform.
///
/// # Example
///
/// ```no_run
/// use declarative::ApplyContext;
/// use opencti::api::Api;
/// use opencti::api::graphql::GraphqlClient;
///
/// let client = GraphqlClient::new("https://opencti.example.com", "token");
/// let version = client.health_check(&ApplyContext::new()).unwrap();
/// println!("Connected to OpenCTI {}", version);
/// ```
pub struct GraphqlClient {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Full URL of the GraphQL endpoint.
    endpoint: String,
    /// `Authorization` header value.
    authorization: String,
    /// Upper bound for a single request.
    timeout: Option<Duration>,
}

impl GraphqlClient {
    /// Create a client for the platform at `base_url`.
    #[must_use]
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            endpoint: format!("{}/graphql", base_url.trim_end_matches('/')),
            authorization: format!("Bearer {token}"),
            timeout: None,
        }
    }

    /// Cap every request at `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the GraphQL endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Timeout for the next request, given the caller's deadline.
    fn request_timeout(&self, ctx: &ApplyContext) -> Option<Duration> {
        match (ctx.remaining(), self.timeout) {
            (Some(remaining), Some(timeout)) => Some(remaining.min(timeout)),
            (remaining, timeout) => remaining.or(timeout),
        }
    }

    /// Run one query and return its `data` object.
    fn execute(
        &self,
        ctx: &ApplyContext,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<Map<String, Value>> {
        ctx.check()?;
        log::debug!("GraphQL {} -> {}", operation, self.endpoint);

        let body = GraphqlRequest { query, variables };
        let response: GraphqlResponse = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", &self.authorization)
            .header("User-Agent", USER_AGENT)
            .config()
            .timeout_global(self.request_timeout(ctx))
            .build()
            .send_json(&body)?
            .body_mut()
            .read_json()?;

        response.into_data(operation)
    }

    /// Run one query and decode its top-level `field`; `None` when it is null.
    fn fetch<T: DeserializeOwned>(
        &self,
        ctx: &ApplyContext,
        field: &str,
        query: &str,
        variables: Value,
    ) -> Result<Option<T>> {
        let mut data = self.execute(ctx, field, query, variables)?;
        match data.remove(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// Run a mutation whose `field` must answer with an entity.
    fn mutate<T: DeserializeOwned>(
        &self,
        ctx: &ApplyContext,
        field: &str,
        query: &str,
        variables: Value,
    ) -> Result<T> {
        self.fetch(ctx, field, query, variables)?
            .ok_or_else(|| Error::InvalidResponse(format!("{field} returned no entity")))
    }

    /// Read one entity by id.
    fn read<T: DeserializeOwned>(
        &self,
        ctx: &ApplyContext,
        kind: EntityKind,
        field: &str,
        selection: &str,
        id: &str,
    ) -> Result<T> {
        let query = format!("query Read($id: String!) {{ {field}(id: $id) {{ {selection} }} }}");
        self.fetch(ctx, field, &query, json!({ "id": id }))?
            .ok_or_else(|| Error::not_found(kind.label(), id))
    }

    /// Follow a connection to its last page.
    fn list_all<T: DeserializeOwned>(
        &self,
        ctx: &ApplyContext,
        field: &str,
        selection: &str,
    ) -> Result<Vec<T>> {
        let query = format!(
            "query List($first: Int, $after: ID) {{ {field}(first: $first, after: $after) {{ \
             edges {{ node {{ {selection} }} }} pageInfo {{ endCursor hasNextPage }} }} }}"
        );

        let mut items = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let page: Connection<T> = self
                .fetch(ctx, field, &query, json!({ "first": PAGE_SIZE, "after": after }))?
                .ok_or_else(|| Error::InvalidResponse(format!("{field} returned null")))?;
            items.extend(page.edges.into_iter().map(|e| e.node));

            match page.page_info {
                Some(PageInfo {
                    has_next_page: true,
                    end_cursor: Some(cursor),
                }) => after = Some(cursor),
                _ => break,
            }
        }

        log::debug!("{} listed {} entities", field, items.len());
        Ok(items)
    }

    fn create<I: Serialize, T: DeserializeOwned>(
        &self,
        ctx: &ApplyContext,
        field: &str,
        input_type: &str,
        selection: &str,
        input: &I,
    ) -> Result<T> {
        let query = format!(
            "mutation Create($input: {input_type}!) {{ {field}(input: $input) {{ {selection} }} }}"
        );
        self.mutate(ctx, field, &query, json!({ "input": input }))
    }
}

impl fmt::Debug for GraphqlClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphqlClient")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// How an entity kind exposes its edit and delete mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditShape {
    /// `<edit>(id) { fieldPatch(input) relationAdd(input) relationDelete(..) delete }`
    Nested { edit: &'static str },
    /// Top-level `<patch>(id, input)` and `<delete>(id)` mutations
    Flat {
        patch: &'static str,
        delete: &'static str,
    },
}

fn edit_shape(kind: EntityKind) -> EditShape {
    match kind {
        EntityKind::Role => EditShape::Nested { edit: "roleEdit" },
        EntityKind::Group => EditShape::Nested { edit: "groupEdit" },
        EntityKind::User => EditShape::Nested { edit: "userEdit" },
        EntityKind::MarkingDefinition => EditShape::Nested {
            edit: "markingDefinitionEdit",
        },
        EntityKind::CaseTemplate => EditShape::Flat {
            patch: "caseTemplateFieldPatch",
            delete: "caseTemplateDelete",
        },
        EntityKind::TaskTemplate => EditShape::Flat {
            patch: "taskTemplateFieldPatch",
            delete: "taskTemplateDelete",
        },
        EntityKind::StatusTemplate => EditShape::Flat {
            patch: "statusTemplateFieldPatch",
            delete: "statusTemplateDelete",
        },
        EntityKind::Vocabulary => EditShape::Flat {
            patch: "vocabularyFieldPatch",
            delete: "vocabularyDelete",
        },
    }
}

/// Edit mutation of a relation's owner; relations only start from nested kinds.
fn relation_edit(relation: Relation) -> &'static str {
    match edit_shape(relation.owner()) {
        EditShape::Nested { edit } => edit,
        EditShape::Flat { patch, .. } => patch,
    }
}

fn patch_query(kind: EntityKind) -> (&'static str, String) {
    match edit_shape(kind) {
        EditShape::Nested { edit } => (
            edit,
            format!(
                "mutation Patch($id: ID!, $input: [EditInput]!) {{ \
                 {edit}(id: $id) {{ fieldPatch(input: $input) {{ id }} }} }}"
            ),
        ),
        EditShape::Flat { patch, .. } => (
            patch,
            format!(
                "mutation Patch($id: ID!, $input: [EditInput!]!) {{ \
                 {patch}(id: $id, input: $input) {{ id }} }}"
            ),
        ),
    }
}

fn delete_query(kind: EntityKind) -> (&'static str, String) {
    match edit_shape(kind) {
        EditShape::Nested { edit } => (
            edit,
            format!("mutation Delete($id: ID!) {{ {edit}(id: $id) {{ delete }} }}"),
        ),
        EditShape::Flat { delete, .. } => (
            delete,
            format!("mutation Delete($id: ID!) {{ {delete}(id: $id) }}"),
        ),
    }
}

impl Api for GraphqlClient {
    fn health_check(&self, ctx: &ApplyContext) -> Result<String> {
        let about: WireAbout = self
            .fetch(ctx, "about", "query About { about { version } }", json!({}))?
            .ok_or_else(|| Error::InvalidResponse("about returned null".to_string()))?;
        Ok(about.version)
    }

    fn create_role(&self, ctx: &ApplyContext, input: &RoleInput) -> Result<Role> {
        let role: WireRole = self.create(ctx, "roleAdd", "RoleAddInput", ROLE_FIELDS, input)?;
        Ok(role.into())
    }

    fn read_role(&self, ctx: &ApplyContext, id: &str) -> Result<Role> {
        let role: WireRole = self.read(ctx, EntityKind::Role, "role", ROLE_FIELDS, id)?;
        Ok(role.into())
    }

    fn list_roles(&self, ctx: &ApplyContext) -> Result<Vec<EntityRef>> {
        self.list_all(ctx, "roles", REF_FIELDS)
    }

    fn list_capabilities(&self, ctx: &ApplyContext) -> Result<Vec<EntityRef>> {
        self.list_all(ctx, "capabilities", REF_FIELDS)
    }

    fn create_group(&self, ctx: &ApplyContext, input: &GroupInput) -> Result<Group> {
        let group: WireGroup = self.create(ctx, "groupAdd", "GroupAddInput", GROUP_FIELDS, input)?;
        Ok(group.into())
    }

    fn read_group(&self, ctx: &ApplyContext, id: &str) -> Result<Group> {
        let group: WireGroup = self.read(ctx, EntityKind::Group, "group", GROUP_FIELDS, id)?;
        Ok(group.into())
    }

    fn list_groups(&self, ctx: &ApplyContext) -> Result<Vec<EntityRef>> {
        self.list_all(ctx, "groups", REF_FIELDS)
    }

    fn create_user(&self, ctx: &ApplyContext, input: &UserInput) -> Result<User> {
        let user: WireUser = self.create(ctx, "userAdd", "UserAddInput", USER_FIELDS, input)?;
        Ok(user.into())
    }

    fn read_user(&self, ctx: &ApplyContext, id: &str) -> Result<User> {
        let user: WireUser = self.read(ctx, EntityKind::User, "user", USER_FIELDS, id)?;
        Ok(user.into())
    }

    fn list_users(&self, ctx: &ApplyContext) -> Result<Vec<EntityRef>> {
        self.list_all(ctx, "users", REF_FIELDS)
    }

    fn create_marking_definition(
        &self,
        ctx: &ApplyContext,
        input: &MarkingDefinitionInput,
    ) -> Result<MarkingDefinition> {
        let marking: WireMarking = self.create(
            ctx,
            "markingDefinitionAdd",
            "MarkingDefinitionAddInput",
            MARKING_FIELDS,
            input,
        )?;
        Ok(marking.into())
    }

    fn read_marking_definition(&self, ctx: &ApplyContext, id: &str) -> Result<MarkingDefinition> {
        let marking: WireMarking = self.read(
            ctx,
            EntityKind::MarkingDefinition,
            "markingDefinition",
            MARKING_FIELDS,
            id,
        )?;
        Ok(marking.into())
    }

    fn list_marking_definitions(&self, ctx: &ApplyContext) -> Result<Vec<MarkingDefinition>> {
        let markings: Vec<WireMarking> = self.list_all(ctx, "markingDefinitions", MARKING_FIELDS)?;
        Ok(markings.into_iter().map(Into::into).collect())
    }

    fn create_case_template(
        &self,
        ctx: &ApplyContext,
        input: &CaseTemplateInput,
    ) -> Result<CaseTemplate> {
        let template: WireCaseTemplate = self.create(
            ctx,
            "caseTemplateAdd",
            "CaseTemplateAddInput",
            CASE_TEMPLATE_FIELDS,
            input,
        )?;
        Ok(template.into())
    }

    fn read_case_template(&self, ctx: &ApplyContext, id: &str) -> Result<CaseTemplate> {
        let template: WireCaseTemplate = self.read(
            ctx,
            EntityKind::CaseTemplate,
            "caseTemplate",
            CASE_TEMPLATE_FIELDS,
            id,
        )?;
        Ok(template.into())
    }

    fn create_task_template(
        &self,
        ctx: &ApplyContext,
        input: &TaskTemplateInput,
    ) -> Result<TaskTemplate> {
        let template: WireTaskTemplate = self.create(
            ctx,
            "taskTemplateAdd",
            "TaskTemplateAddInput",
            TASK_TEMPLATE_FIELDS,
            input,
        )?;
        Ok(template.into())
    }

    fn read_task_template(&self, ctx: &ApplyContext, id: &str) -> Result<TaskTemplate> {
        let template: WireTaskTemplate = self.read(
            ctx,
            EntityKind::TaskTemplate,
            "taskTemplate",
            TASK_TEMPLATE_FIELDS,
            id,
        )?;
        Ok(template.into())
    }

    fn create_status_template(
        &self,
        ctx: &ApplyContext,
        input: &StatusTemplateInput,
    ) -> Result<StatusTemplate> {
        let template: WireStatusTemplate = self.create(
            ctx,
            "statusTemplateAdd",
            "StatusTemplateAddInput",
            STATUS_TEMPLATE_FIELDS,
            input,
        )?;
        Ok(template.into())
    }

    fn read_status_template(&self, ctx: &ApplyContext, id: &str) -> Result<StatusTemplate> {
        let template: WireStatusTemplate = self.read(
            ctx,
            EntityKind::StatusTemplate,
            "statusTemplate",
            STATUS_TEMPLATE_FIELDS,
            id,
        )?;
        Ok(template.into())
    }

    fn set_status_in_workflow(
        &self,
        ctx: &ApplyContext,
        entity_type: &str,
        template_id: &str,
        order: i64,
    ) -> Result<()> {
        let query = "mutation SetStatus($id: ID!, $input: StatusAddInput!) { \
                     subTypeEdit(id: $id) { statusAdd(input: $input) { id } } }";
        self.execute(
            ctx,
            "subTypeEdit",
            query,
            json!({
                "id": entity_type,
                "input": { "template_id": template_id, "order": order },
            }),
        )?;
        Ok(())
    }

    fn create_vocabulary(&self, ctx: &ApplyContext, input: &VocabularyInput) -> Result<Vocabulary> {
        let vocabulary: WireVocabulary = self.create(
            ctx,
            "vocabularyAdd",
            "VocabularyAddInput",
            VOCABULARY_FIELDS,
            input,
        )?;
        Ok(vocabulary.into())
    }

    fn read_vocabulary(&self, ctx: &ApplyContext, id: &str) -> Result<Vocabulary> {
        let vocabulary: WireVocabulary = self.read(
            ctx,
            EntityKind::Vocabulary,
            "vocabulary",
            VOCABULARY_FIELDS,
            id,
        )?;
        Ok(vocabulary.into())
    }

    fn add_relation(
        &self,
        ctx: &ApplyContext,
        relation: Relation,
        from_id: &str,
        to_id: &str,
    ) -> Result<()> {
        let edit = relation_edit(relation);
        let query = format!(
            "mutation RelationAdd($id: ID!, $input: InternalRelationshipAddInput!) {{ \
             {edit}(id: $id) {{ relationAdd(input: $input) {{ id }} }} }}"
        );
        self.execute(
            ctx,
            edit,
            &query,
            json!({
                "id": from_id,
                "input": { "toId": to_id, "relationship_type": relation.relationship_type() },
            }),
        )?;
        Ok(())
    }

    fn remove_relation(
        &self,
        ctx: &ApplyContext,
        relation: Relation,
        from_id: &str,
        to_id: &str,
    ) -> Result<()> {
        let edit = relation_edit(relation);
        let query = format!(
            "mutation RelationDelete($id: ID!, $toId: StixRef!, $type: String!) {{ \
             {edit}(id: $id) {{ relationDelete(toId: $toId, relationship_type: $type) {{ id }} }} }}"
        );
        self.execute(
            ctx,
            edit,
            &query,
            json!({
                "id": from_id,
                "toId": to_id,
                "type": relation.relationship_type(),
            }),
        )?;
        Ok(())
    }

    fn patch_fields(
        &self,
        ctx: &ApplyContext,
        kind: EntityKind,
        id: &str,
        edits: &[EditInput],
    ) -> Result<()> {
        if edits.is_empty() {
            return Ok(());
        }
        let (operation, query) = patch_query(kind);
        self.execute(ctx, operation, &query, json!({ "id": id, "input": edits }))?;
        Ok(())
    }

    fn delete(&self, ctx: &ApplyContext, kind: EntityKind, id: &str) -> Result<()> {
        let (operation, query) = delete_query(kind);
        self.execute(ctx, operation, &query, json!({ "id": id }))?;
        Ok(())
    }
}

// =============================================================================
// GraphQL envelope
// =============================================================================

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

impl GraphqlResponse {
    fn into_data(self, operation: &str) -> Result<Map<String, Value>> {
        if !self.errors.is_empty() {
            return Err(Error::GraphQl {
                operation: operation.to_string(),
                messages: self.errors.into_iter().map(|e| e.message).collect(),
            });
        }
        self.data
            .ok_or_else(|| Error::InvalidResponse(format!("{operation} returned no data")))
    }
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    edges: Vec<Edge<T>>,
    #[serde(rename = "pageInfo", default)]
    page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(rename = "endCursor")]
    end_cursor: Option<String>,
    #[serde(rename = "hasNextPage")]
    has_next_page: bool,
}

fn nodes<T>(connection: Option<Connection<T>>) -> Vec<T> {
    connection
        .map(|c| c.edges.into_iter().map(|e| e.node).collect())
        .unwrap_or_default()
}

// =============================================================================
// OpenCTI response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct WireAbout {
    version: String,
}

#[derive(Debug, Deserialize)]
struct WireRole {
    id: String,
    name: String,
    description: Option<String>,
    #[serde(default)]
    capabilities: Option<Vec<EntityRef>>,
}

#[derive(Debug, Deserialize)]
struct WireMaxConfidence {
    max_confidence: i64,
}

#[derive(Debug, Deserialize)]
struct WireMarkingRef {
    id: String,
    definition: String,
}

#[derive(Debug, Deserialize)]
struct WireGroup {
    id: String,
    name: String,
    description: Option<String>,
    #[serde(default)]
    default_assignation: Option<bool>,
    #[serde(default)]
    auto_new_marking: Option<bool>,
    #[serde(default)]
    group_confidence_level: Option<WireMaxConfidence>,
    #[serde(default)]
    roles: Option<Connection<EntityRef>>,
    #[serde(default)]
    allowed_marking: Option<Vec<WireMarkingRef>>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    name: String,
    user_email: String,
    api_token: Option<String>,
    #[serde(default)]
    user_confidence_level: Option<ConfidenceLevel>,
    #[serde(default)]
    groups: Option<Connection<EntityRef>>,
}

#[derive(Debug, Deserialize)]
struct WireMarking {
    id: String,
    definition_type: String,
    definition: String,
    #[serde(default)]
    x_opencti_order: Option<i64>,
    x_opencti_color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCaseTemplate {
    id: String,
    name: String,
    description: Option<String>,
    #[serde(default)]
    tasks: Option<Connection<EntityRef>>,
}

#[derive(Debug, Deserialize)]
struct WireTaskTemplate {
    id: String,
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireStatusTemplate {
    id: String,
    name: String,
    color: String,
    #[serde(default)]
    usages: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireCategory {
    key: String,
}

#[derive(Debug, Deserialize)]
struct WireVocabulary {
    id: String,
    name: String,
    description: Option<String>,
    category: WireCategory,
}

impl From<WireRole> for Role {
    fn from(r: WireRole) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            capabilities: r.capabilities.unwrap_or_default(),
        }
    }
}

impl From<WireGroup> for Group {
    fn from(g: WireGroup) -> Self {
        Self {
            id: g.id,
            name: g.name,
            description: g.description,
            default_assignation: g.default_assignation.unwrap_or(false),
            auto_new_marking: g.auto_new_marking.unwrap_or(false),
            max_confidence: g
                .group_confidence_level
                .map_or(crate::types::DEFAULT_MAX_CONFIDENCE, |c| c.max_confidence),
            roles: nodes(g.roles),
            allowed_marking: g
                .allowed_marking
                .unwrap_or_default()
                .into_iter()
                .map(|m| EntityRef::new(m.id, m.definition))
                .collect(),
        }
    }
}

impl From<WireUser> for User {
    fn from(u: WireUser) -> Self {
        Self {
            id: u.id,
            name: u.name,
            user_email: u.user_email,
            api_token: u.api_token,
            user_confidence_level: u.user_confidence_level,
            groups: nodes(u.groups),
        }
    }
}

impl From<WireMarking> for MarkingDefinition {
    fn from(m: WireMarking) -> Self {
        Self {
            id: m.id,
            definition_type: m.definition_type,
            definition: m.definition,
            x_opencti_order: m.x_opencti_order.unwrap_or(0),
            x_opencti_color: m.x_opencti_color,
        }
    }
}

impl From<WireCaseTemplate> for CaseTemplate {
    fn from(t: WireCaseTemplate) -> Self {
        Self {
            id: t.id,
            name: t.name,
            description: t.description,
            tasks: nodes(t.tasks),
        }
    }
}

impl From<WireTaskTemplate> for TaskTemplate {
    fn from(t: WireTaskTemplate) -> Self {
        Self {
            id: t.id,
            name: t.name,
            description: t.description,
        }
    }
}

impl From<WireStatusTemplate> for StatusTemplate {
    fn from(t: WireStatusTemplate) -> Self {
        Self {
            id: t.id,
            name: t.name,
            color: t.color,
            usages: t.usages.unwrap_or(0),
        }
    }
}

impl From<WireVocabulary> for Vocabulary {
    fn from(v: WireVocabulary) -> Self {
        Self {
            id: v.id,
            name: v.name,
            description: v.description,
            category: v.category.key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use declarative::CancelToken;

    #[test]
    fn test_endpoint() {
        let client = GraphqlClient::new("https://opencti.example.com/", "secret");
        assert_eq!(client.endpoint(), "https://opencti.example.com/graphql");
    }

    #[test]
    fn test_debug_hides_token() {
        let client = GraphqlClient::new("https://opencti.example.com", "secret");
        let debug = format!("{:?}", client);
        assert!(debug.contains("opencti.example.com"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_request_timeout() {
        let client = GraphqlClient::new("http://localhost", "t");
        assert_eq!(client.request_timeout(&ApplyContext::new()), None);

        let client = client.with_timeout(Duration::from_secs(30));
        assert_eq!(
            client.request_timeout(&ApplyContext::new()),
            Some(Duration::from_secs(30))
        );

        let ctx = ApplyContext::new().with_timeout(Duration::from_secs(5));
        let timeout = client.request_timeout(&ctx).unwrap();
        assert!(timeout <= Duration::from_secs(5));
    }

    #[test]
    fn test_cancelled_before_request() {
        let client = GraphqlClient::new("http://127.0.0.1:9", "t");
        let cancel = CancelToken::new();
        cancel.cancel();
        let ctx = ApplyContext::new().with_cancel(cancel);

        let err = client.health_check(&ctx).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Interrupted);
    }

    #[test]
    fn test_edit_shapes() {
        assert_eq!(relation_edit(Relation::RoleCapability), "roleEdit");
        assert_eq!(relation_edit(Relation::GroupMarking), "groupEdit");
        assert_eq!(relation_edit(Relation::UserGroup), "userEdit");

        let (operation, query) = patch_query(EntityKind::Vocabulary);
        assert_eq!(operation, "vocabularyFieldPatch");
        assert!(query.contains("vocabularyFieldPatch(id: $id, input: $input)"));

        let (operation, query) = delete_query(EntityKind::MarkingDefinition);
        assert_eq!(operation, "markingDefinitionEdit");
        assert!(query.contains("markingDefinitionEdit(id: $id) { delete }"));

        let (operation, _) = delete_query(EntityKind::CaseTemplate);
        assert_eq!(operation, "caseTemplateDelete");
    }

    #[test]
    fn test_response_errors() {
        let response: GraphqlResponse = serde_json::from_value(json!({
            "data": null,
            "errors": [{"message": "Access denied", "path": ["roleAdd"]}]
        }))
        .unwrap();
        match response.into_data("roleAdd").unwrap_err() {
            Error::GraphQl { operation, messages } => {
                assert_eq!(operation, "roleAdd");
                assert_eq!(messages, vec!["Access denied"]);
            }
            other => panic!("Expected GraphQl error, got {other:?}"),
        }
    }

    #[test]
    fn test_response_without_data() {
        let response: GraphqlResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            response.into_data("about"),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_connection_page_info() {
        let page: Connection<EntityRef> = serde_json::from_value(json!({
            "edges": [{"node": {"id": "r1", "name": "Analyst"}}],
            "pageInfo": {"endCursor": "c1", "hasNextPage": true}
        }))
        .unwrap();
        assert_eq!(page.edges[0].node.name, "Analyst");
        let info = page.page_info.unwrap();
        assert!(info.has_next_page);
        assert_eq!(info.end_cursor.as_deref(), Some("c1"));
    }

    #[test]
    fn test_group_conversion() {
        let wire: WireGroup = serde_json::from_value(json!({
            "id": "g1",
            "name": "Analysts",
            "description": null,
            "default_assignation": true,
            "auto_new_marking": null,
            "group_confidence_level": {"max_confidence": 75},
            "roles": {"edges": [{"node": {"id": "r1", "name": "Reader"}}]},
            "allowed_marking": [{"id": "m1", "definition": "TLP:GREEN"}]
        }))
        .unwrap();

        let group: Group = wire.into();
        assert!(group.default_assignation);
        assert!(!group.auto_new_marking);
        assert_eq!(group.max_confidence, 75);
        assert_eq!(group.roles, vec![EntityRef::new("r1", "Reader")]);
        assert_eq!(group.allowed_marking, vec![EntityRef::new("m1", "TLP:GREEN")]);
    }

    #[test]
    fn test_group_conversion_with_defaults() {
        let wire: WireGroup = serde_json::from_value(json!({
            "id": "g1",
            "name": "Analysts",
            "description": "all analysts"
        }))
        .unwrap();

        let group: Group = wire.into();
        assert_eq!(group.max_confidence, 100);
        assert!(group.roles.is_empty());
        assert!(group.allowed_marking.is_empty());
    }

    #[test]
    fn test_user_conversion() {
        let wire: WireUser = serde_json::from_value(json!({
            "id": "u1",
            "name": "alice",
            "user_email": "alice@example.com",
            "api_token": "tok",
            "user_confidence_level": {
                "max_confidence": 80,
                "overrides": [{"entity_type": "Report", "max_confidence": 50}]
            },
            "groups": {"edges": [{"node": {"id": "g1", "name": "Analysts"}}]}
        }))
        .unwrap();

        let user: User = wire.into();
        assert_eq!(user.api_token.as_deref(), Some("tok"));
        let level = user.user_confidence_level.unwrap();
        assert_eq!(level.overrides[0].entity_type, "Report");
        assert_eq!(user.groups[0].name, "Analysts");
    }

    #[test]
    fn test_vocabulary_conversion() {
        let wire: WireVocabulary = serde_json::from_value(json!({
            "id": "v1",
            "name": "phishing",
            "description": null,
            "category": {"key": "attack_pattern_ov"}
        }))
        .unwrap();

        let vocabulary: Vocabulary = wire.into();
        assert_eq!(vocabulary.category, "attack_pattern_ov");
    }

    #[test]
    fn test_status_template_conversion() {
        let wire: WireStatusTemplate = serde_json::from_value(json!({
            "id": "s1",
            "name": "IN_REVIEW",
            "color": "#ff9800",
            "usages": 3
        }))
        .unwrap();

        let template: StatusTemplate = wire.into();
        assert_eq!(template.usages, 3);
    }
}
