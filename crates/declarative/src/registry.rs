//! Resource registry - maps type names to resources

use crate::resource::{BoxedResource, Resource};
use crate::schema::Schema;
use std::collections::BTreeMap;

/// Resources available to the orchestrator, keyed by full type name
pub struct ResourceRegistry {
    provider_type_name: String,
    resources: BTreeMap<String, BoxedResource>,
}

impl ResourceRegistry {
    /// Create an empty registry for a provider
    pub fn new(provider_type_name: impl Into<String>) -> Self {
        Self {
            provider_type_name: provider_type_name.into(),
            resources: BTreeMap::new(),
        }
    }

    /// Provider type name used as the prefix of every resource type
    pub fn provider_type_name(&self) -> &str {
        &self.provider_type_name
    }

    /// Register a resource under its type name
    ///
    /// A later registration with the same type name replaces the earlier one.
    pub fn register(&mut self, resource: BoxedResource) {
        let type_name = resource.type_name().to_string();
        if self.resources.insert(type_name.clone(), resource).is_some() {
            log::warn!("Resource type {type_name} registered twice");
        }
    }

    /// Look up a resource by full type name
    pub fn get(&self, type_name: &str) -> Option<&dyn Resource> {
        self.resources.get(type_name).map(|r| &**r)
    }

    /// Look up a resource by full type name or by its short suffix
    ///
    /// Accepts "opencti_role" as well as "role".
    pub fn resolve(&self, name: &str) -> Option<&dyn Resource> {
        self.get(name)
            .or_else(|| self.get(&format!("{}_{}", self.provider_type_name, name)))
    }

    /// All registered type names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        self.resources.keys().map(String::as_str).collect()
    }

    /// Schemas of all registered resources
    pub fn schemas(&self) -> BTreeMap<String, Schema> {
        self.resources
            .iter()
            .map(|(name, r)| (name.clone(), r.schema()))
            .collect()
    }

    /// Number of registered resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
