//! Resource traits for declarative state management
//!
//! A resource type is implemented as a [`Reconciler`] over a typed model.
//! [`Typed`] erases the model so that reconcilers of different types can sit
//! side by side in a [`crate::ResourceRegistry`] and exchange state with the
//! orchestrator as JSON records.

use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::schema::Schema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

/// Typed lifecycle of one resource type
///
/// # Example
///
/// ```ignore
/// use declarative::{ApplyContext, Reconciler, Result, Schema};
///
/// struct TagReconciler { api: Arc<dyn Api> }
///
/// impl Reconciler for TagReconciler {
///     type Model = TagModel;
///     const TYPE_SUFFIX: &'static str = "tag";
///
///     fn schema() -> Schema {
///         Schema::resource().attribute("name", Attribute::required(AttributeType::String))
///     }
///
///     fn create(&self, ctx: &ApplyContext, plan: TagModel) -> Result<TagModel> { ... }
///     fn read(&self, ctx: &ApplyContext, state: TagModel) -> Result<TagModel> { ... }
///     fn update(&self, ctx: &ApplyContext, prior: TagModel, plan: TagModel) -> Result<TagModel> { ... }
///     fn delete(&self, ctx: &ApplyContext, state: TagModel) -> Result<()> { ... }
/// }
/// ```
pub trait Reconciler: Send + Sync {
    /// State record of this resource type
    ///
    /// Must deserialize from a record holding only `id`, which is what import
    /// produces before the first read.
    type Model: Serialize + DeserializeOwned;

    /// Suffix of the resource type name, e.g. "role" for `opencti_role`
    const TYPE_SUFFIX: &'static str;

    /// Schema of this resource type
    fn schema() -> Schema
    where
        Self: Sized;

    /// Create the remote entity and return the resulting state
    fn create(&self, ctx: &ApplyContext, plan: Self::Model) -> Result<Self::Model>;

    /// Refresh state from the remote entity
    fn read(&self, ctx: &ApplyContext, state: Self::Model) -> Result<Self::Model>;

    /// Converge the remote entity to the plan
    fn update(&self, ctx: &ApplyContext, prior: Self::Model, plan: Self::Model)
    -> Result<Self::Model>;

    /// Delete the remote entity
    fn delete(&self, ctx: &ApplyContext, state: Self::Model) -> Result<()>;
}

/// Type-erased resource exchanging JSON records
pub trait Resource: Send + Sync {
    /// Full type name, e.g. `opencti_role`
    fn type_name(&self) -> &str;

    fn schema(&self) -> Schema;

    fn create(&self, ctx: &ApplyContext, planned: Value) -> Result<Value>;

    fn read(&self, ctx: &ApplyContext, state: Value) -> Result<Value>;

    fn update(&self, ctx: &ApplyContext, prior: Value, planned: Value) -> Result<Value>;

    fn delete(&self, ctx: &ApplyContext, state: Value) -> Result<()>;

    /// Build the initial record for an imported entity
    ///
    /// The import id is the remote identity; the rest of the record is filled
    /// by a subsequent read.
    fn import_state(&self, id: &str) -> Result<Value> {
        if id.trim().is_empty() {
            return Err(Error::config(
                "id",
                "Invalid import identifier",
                "The import identifier must be the non-empty platform id of the entity.",
            ));
        }
        Ok(json!({ "id": id }))
    }
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;

/// Adapter from a typed [`Reconciler`] to a [`Resource`]
pub struct Typed<R> {
    type_name: String,
    schema: Schema,
    inner: R,
}

impl<R: Reconciler> Typed<R> {
    /// Wrap a reconciler under `<provider>_<suffix>`
    pub fn new(provider_type_name: &str, inner: R) -> Self {
        Self {
            type_name: format!("{}_{}", provider_type_name, R::TYPE_SUFFIX),
            schema: R::schema(),
            inner,
        }
    }

    /// Box the adapter
    pub fn boxed(provider_type_name: &str, inner: R) -> BoxedResource
    where
        R: 'static,
    {
        Box::new(Self::new(provider_type_name, inner))
    }

    fn decode(value: Value) -> Result<R::Model> {
        Ok(serde_json::from_value(value)?)
    }

    fn encode(model: &R::Model) -> Result<Value> {
        Ok(serde_json::to_value(model)?)
    }
}

impl<R: Reconciler> Resource for Typed<R> {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn schema(&self) -> Schema {
        self.schema.clone()
    }

    fn create(&self, ctx: &ApplyContext, planned: Value) -> Result<Value> {
        let created = self.inner.create(ctx, Self::decode(planned)?)?;
        Self::encode(&created)
    }

    fn read(&self, ctx: &ApplyContext, state: Value) -> Result<Value> {
        let refreshed = self.inner.read(ctx, Self::decode(state)?)?;
        Self::encode(&refreshed)
    }

    fn update(&self, ctx: &ApplyContext, prior: Value, planned: Value) -> Result<Value> {
        let replaced = self.schema.replacement_attributes(&prior, &planned);
        if !replaced.is_empty() {
            return Err(Error::RequiresReplace {
                resource_type: self.type_name.clone(),
                attributes: replaced,
            });
        }

        let updated = self
            .inner
            .update(ctx, Self::decode(prior)?, Self::decode(planned)?)?;
        Self::encode(&updated)
    }

    fn delete(&self, ctx: &ApplyContext, state: Value) -> Result<()> {
        self.inner.delete(ctx, Self::decode(state)?)
    }
}

/// Get the identity of a record, or fail if it was never assigned
pub fn require_id(id: Option<&str>) -> Result<&str> {
    match id {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(Error::internal(
            "Missing resource identity",
            "The resource record has no id; it was never created or imported",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeType};
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct NoteModel {
        id: Option<String>,
        title: String,
        folder: String,
    }

    /// Stores notes in memory; ids are sequential
    #[derive(Default)]
    struct NoteReconciler {
        notes: Mutex<Vec<(String, String, String)>>,
    }

    impl Reconciler for NoteReconciler {
        type Model = NoteModel;
        const TYPE_SUFFIX: &'static str = "note";

        fn schema() -> Schema {
            Schema::resource()
                .attribute("title", Attribute::required(AttributeType::String))
                .attribute(
                    "folder",
                    Attribute::required(AttributeType::String).requires_replace(),
                )
        }

        fn create(&self, _ctx: &ApplyContext, mut plan: NoteModel) -> Result<NoteModel> {
            let mut notes = self.notes.lock().unwrap();
            let id = format!("note-{}", notes.len() + 1);
            notes.push((id.clone(), plan.title.clone(), plan.folder.clone()));
            plan.id = Some(id);
            Ok(plan)
        }

        fn read(&self, _ctx: &ApplyContext, state: NoteModel) -> Result<NoteModel> {
            let id = require_id(state.id.as_deref())?;
            let notes = self.notes.lock().unwrap();
            let (id, title, folder) = notes
                .iter()
                .find(|(n, _, _)| n == id)
                .cloned()
                .ok_or_else(|| Error::internal("Not found", id))?;
            Ok(NoteModel {
                id: Some(id),
                title,
                folder,
            })
        }

        fn update(
            &self,
            _ctx: &ApplyContext,
            _prior: NoteModel,
            plan: NoteModel,
        ) -> Result<NoteModel> {
            let id = require_id(plan.id.as_deref())?.to_string();
            let mut notes = self.notes.lock().unwrap();
            if let Some(note) = notes.iter_mut().find(|(n, _, _)| *n == id) {
                note.1 = plan.title.clone();
            }
            Ok(plan)
        }

        fn delete(&self, _ctx: &ApplyContext, state: NoteModel) -> Result<()> {
            let id = require_id(state.id.as_deref())?.to_string();
            self.notes.lock().unwrap().retain(|(n, _, _)| *n != id);
            Ok(())
        }
    }

    #[test]
    fn test_type_name() {
        let resource = Typed::new("demo", NoteReconciler::default());
        assert_eq!(resource.type_name(), "demo_note");
        assert!(resource.schema().attributes.contains_key("folder"));
    }

    #[test]
    fn test_create_then_import_and_read() {
        let resource = Typed::new("demo", NoteReconciler::default());
        let ctx = ApplyContext::new();

        let created = resource
            .create(&ctx, json!({"title": "hello", "folder": "inbox"}))
            .unwrap();
        assert_eq!(created["id"], "note-1");

        let imported = resource.import_state("note-1").unwrap();
        let read = resource.read(&ctx, imported).unwrap();
        assert_eq!(read["title"], "hello");
        assert_eq!(read["folder"], "inbox");
    }

    #[test]
    fn test_update_rejects_replace_attribute() {
        let resource = Typed::new("demo", NoteReconciler::default());
        let ctx = ApplyContext::new();
        let prior = resource
            .create(&ctx, json!({"title": "a", "folder": "inbox"}))
            .unwrap();

        let mut planned = prior.clone();
        planned["folder"] = json!("archive");

        match resource.update(&ctx, prior, planned) {
            Err(Error::RequiresReplace { attributes, .. }) => {
                assert_eq!(attributes, vec!["folder"]);
            }
            other => panic!("Expected RequiresReplace, got {other:?}"),
        }
    }

    #[test]
    fn test_update_in_place() {
        let resource = Typed::new("demo", NoteReconciler::default());
        let ctx = ApplyContext::new();
        let prior = resource
            .create(&ctx, json!({"title": "a", "folder": "inbox"}))
            .unwrap();

        let mut planned = prior.clone();
        planned["title"] = json!("b");
        resource.update(&ctx, prior, planned.clone()).unwrap();

        let read = resource.read(&ctx, json!({"id": "note-1"})).unwrap();
        assert_eq!(read["title"], "b");
    }

    #[test]
    fn test_import_rejects_empty_id() {
        let resource = Typed::new("demo", NoteReconciler::default());
        assert!(resource.import_state("  ").is_err());
    }

    #[test]
    fn test_invalid_record() {
        let resource = Typed::new("demo", NoteReconciler::default());
        let err = resource
            .read(&ApplyContext::new(), json!({"title": 42}))
            .unwrap_err();
        assert!(matches!(err, Error::Record(_)));
    }

    #[test]
    fn test_require_id() {
        assert_eq!(require_id(Some("x")).unwrap(), "x");
        assert!(require_id(Some("")).is_err());
        assert!(require_id(None).is_err());
    }
}
