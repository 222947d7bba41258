//! Domain types for OpenCTI administration entities.

use declarative::Linked;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Default confidence ceiling for users and groups.
pub const DEFAULT_MAX_CONFIDENCE: i64 = 100;

/// Entity kinds managed through this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Role,
    Group,
    User,
    MarkingDefinition,
    CaseTemplate,
    TaskTemplate,
    StatusTemplate,
    Vocabulary,
}

impl EntityKind {
    /// All kinds, in declaration order.
    pub const ALL: [EntityKind; 8] = [
        Self::Role,
        Self::Group,
        Self::User,
        Self::MarkingDefinition,
        Self::CaseTemplate,
        Self::TaskTemplate,
        Self::StatusTemplate,
        Self::Vocabulary,
    ];

    /// Human-readable name used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Group => "group",
            Self::User => "user",
            Self::MarkingDefinition => "marking definition",
            Self::CaseTemplate => "case template",
            Self::TaskTemplate => "task template",
            Self::StatusTemplate => "status template",
            Self::Vocabulary => "vocabulary",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Many-to-many relations that can be added or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Role grants a capability.
    RoleCapability,
    /// Group carries a role.
    GroupRole,
    /// Group may access a marking definition.
    GroupMarking,
    /// User belongs to a group.
    UserGroup,
}

impl Relation {
    /// Relationship type on the platform.
    pub fn relationship_type(&self) -> &'static str {
        match self {
            Self::RoleCapability => "has-capability",
            Self::GroupRole => "has-role",
            Self::GroupMarking => "accesses-to",
            Self::UserGroup => "member-of",
        }
    }

    /// Kind of the entity the relation starts from.
    pub fn owner(&self) -> EntityKind {
        match self {
            Self::RoleCapability => EntityKind::Role,
            Self::GroupRole | Self::GroupMarking => EntityKind::Group,
            Self::UserGroup => EntityKind::User,
        }
    }

    /// Human-readable name of the related kind.
    pub fn target_label(&self) -> &'static str {
        match self {
            Self::RoleCapability => "capability",
            Self::GroupRole => "role",
            Self::GroupMarking => "marking definition",
            Self::UserGroup => "group",
        }
    }
}

/// Reference to a related entity by id and display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    pub name: String,
}

impl EntityRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl From<EntityRef> for Linked {
    fn from(r: EntityRef) -> Self {
        Linked::new(r.id, r.name)
    }
}

/// A field replacement sent through an entity's `fieldPatch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditInput {
    pub key: String,
    pub value: Vec<Value>,
}

impl EditInput {
    /// Replace `key` with a single value.
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: vec![value.into()],
        }
    }
}

// =============================================================================
// Roles
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub capabilities: Vec<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// =============================================================================
// Groups and users
// =============================================================================

/// Per-entity-type confidence ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceOverride {
    pub entity_type: String,
    pub max_confidence: i64,
}

/// Confidence level of a user or group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceLevel {
    pub max_confidence: i64,
    #[serde(default)]
    pub overrides: Vec<ConfidenceOverride>,
}

impl Default for ConfidenceLevel {
    fn default() -> Self {
        Self {
            max_confidence: DEFAULT_MAX_CONFIDENCE,
            overrides: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub default_assignation: bool,
    pub auto_new_marking: bool,
    pub max_confidence: i64,
    pub roles: Vec<EntityRef>,
    /// Allowed markings; `name` holds the marking's definition.
    pub allowed_marking: Vec<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub default_assignation: bool,
    pub auto_new_marking: bool,
    pub group_confidence_level: ConfidenceLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub user_email: String,
    pub api_token: Option<String>,
    pub user_confidence_level: Option<ConfidenceLevel>,
    pub groups: Vec<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInput {
    pub name: String,
    pub user_email: String,
    pub password: String,
    pub user_confidence_level: ConfidenceLevel,
}

// =============================================================================
// Markings, templates and vocabularies
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkingDefinition {
    pub id: String,
    pub definition_type: String,
    pub definition: String,
    pub x_opencti_order: i64,
    pub x_opencti_color: Option<String>,
}

impl MarkingDefinition {
    /// Reference keyed by definition, the name groups use for markings.
    pub fn to_ref(&self) -> EntityRef {
        EntityRef::new(&self.id, &self.definition)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkingDefinitionInput {
    pub definition_type: String,
    pub definition: String,
    pub x_opencti_order: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_opencti_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseTemplate {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Task templates attached to the case template.
    pub tasks: Vec<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseTemplateInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Task template ids.
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTemplate {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskTemplateInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTemplate {
    pub id: String,
    pub name: String,
    pub color: String,
    /// Number of workflows the status is used in.
    pub usages: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusTemplateInput {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Category key, e.g. "report_types_ov".
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VocabularyInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
}
