//! Schema model for provider and resource configuration
//!
//! Schemas are reported to the orchestrator through the Schema RPC. They also
//! drive two local checks: which attributes force a replacement when they
//! change, and which attributes must be redacted from log output.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Placeholder written in place of sensitive values
pub const REDACTED: &str = "(sensitive value)";

/// Type of an attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "of", rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Number,
    Bool,
    /// Ordered list of values
    List(Box<AttributeType>),
    /// Unordered set of values
    Set(Box<AttributeType>),
    /// Object with named attributes
    Object(BTreeMap<String, Attribute>),
}

impl AttributeType {
    /// List of strings, the shape used for relation name lists
    pub fn string_list() -> Self {
        Self::List(Box::new(Self::String))
    }

    /// Set of strings
    pub fn string_set() -> Self {
        Self::Set(Box::new(Self::String))
    }

    /// Object built from (name, attribute) pairs
    pub fn object<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (S, Attribute)>,
        S: Into<String>,
    {
        Self::Object(
            attributes
                .into_iter()
                .map(|(name, attr)| (name.into(), attr))
                .collect(),
        )
    }
}

/// A single schema attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub kind: AttributeType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub sensitive: bool,
    /// Changing this attribute forces the resource to be replaced
    #[serde(default)]
    pub requires_replace: bool,
    /// Keep the prior state value while the planned value is unknown
    #[serde(default)]
    pub use_state_for_unknown: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Attribute {
    fn new(kind: AttributeType) -> Self {
        Self {
            kind,
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            requires_replace: false,
            use_state_for_unknown: false,
            description: None,
        }
    }

    /// A required attribute
    pub fn required(kind: AttributeType) -> Self {
        Self {
            required: true,
            ..Self::new(kind)
        }
    }

    /// An optional attribute
    pub fn optional(kind: AttributeType) -> Self {
        Self {
            optional: true,
            ..Self::new(kind)
        }
    }

    /// A computed attribute, set only by the provider
    pub fn computed(kind: AttributeType) -> Self {
        Self {
            computed: true,
            ..Self::new(kind)
        }
    }

    /// An optional attribute the provider fills when omitted
    pub fn optional_computed(kind: AttributeType) -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::new(kind)
        }
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    pub fn use_state_for_unknown(mut self) -> Self {
        self.use_state_for_unknown = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Schema of a provider or resource type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resource schema with the standard `id` and `last_updated` attributes
    pub fn resource() -> Self {
        Self::new()
            .attribute(
                "id",
                Attribute::computed(AttributeType::String)
                    .use_state_for_unknown()
                    .with_description("Identifier issued by the platform"),
            )
            .attribute(
                "last_updated",
                Attribute::computed(AttributeType::String)
                    .with_description("Time of the last successful create or update"),
            )
    }

    /// Add an attribute
    pub fn attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace-on-change attributes whose value differs between two records
    pub fn replacement_attributes(&self, prior: &Value, planned: &Value) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|(_, attr)| attr.requires_replace)
            .filter(|(name, _)| prior.get(name.as_str()) != planned.get(name.as_str()))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Copy of a record with every sensitive top-level attribute redacted
    pub fn redact(&self, record: &Value) -> Value {
        let mut redacted = record.clone();
        if let Value::Object(map) = &mut redacted {
            for (name, attr) in &self.attributes {
                if attr.sensitive
                    && let Some(value) = map.get_mut(name)
                    && !value.is_null()
                {
                    *value = Value::String(REDACTED.to_string());
                }
            }
        }
        redacted
    }
}
