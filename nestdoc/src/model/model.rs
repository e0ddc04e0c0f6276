use crate::collection::{Document, ObjectId};
use crate::common::{atomic, now, Atomic, ReadExecutor, Value, WriteExecutor, CREATED_AT, DOC_ID, UPDATED_AT};
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use crate::model::{ModelCollection, ModelEvent, ModelSchema, RelationDef, RelationKind};
use crate::relation::{self, EmbedsMany, EmbedsOne};
use crate::Nestdoc;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt::Debug;
use std::sync::{Arc, Weak};

/// The materialized value of an embedded relation.
#[derive(Clone, Debug)]
pub enum RelationValue {
    Many(ModelCollection),
    One(Option<Model>),
}

impl RelationValue {
    pub fn as_many(&self) -> Option<&ModelCollection> {
        match self {
            RelationValue::Many(models) => Some(models),
            RelationValue::One(_) => None,
        }
    }

    pub fn as_one(&self) -> Option<&Option<Model>> {
        match self {
            RelationValue::One(model) => Some(model),
            RelationValue::Many(_) => None,
        }
    }

    pub(crate) fn models(&self) -> Vec<Model> {
        match self {
            RelationValue::Many(models) => models.iter().cloned().collect(),
            RelationValue::One(model) => model.iter().cloned().collect(),
        }
    }

    /// External representation: an array of documents or a document/null.
    pub(crate) fn to_value(&self) -> NestdocResult<Value> {
        match self {
            RelationValue::Many(models) => Ok(Value::Array(
                models
                    .to_documents()?
                    .into_iter()
                    .map(Value::Document)
                    .collect(),
            )),
            RelationValue::One(Some(model)) => Ok(Value::Document(model.to_document()?)),
            RelationValue::One(None) => Ok(Value::Null),
        }
    }
}

/// Non-owning link from an embedded model to the model it lives in.
///
/// When the parent handle is gone, the parent is found again in storage
/// through its lineage.
#[derive(Clone)]
pub(crate) struct ParentLink {
    model: Weak<RwLock<ModelInner>>,
    relation: String,
    lineage: Option<Lineage>,
}

/// Storage location of a model: the top-level document holding it and the
/// relation steps (relation name, identifier) leading down to it.
#[derive(Clone, Debug, PartialEq)]
struct Lineage {
    root_kind: String,
    root_id: String,
    path: Vec<(String, String)>,
}

impl Lineage {
    fn resolve(&self, db: &Nestdoc) -> NestdocResult<Option<Model>> {
        let mut current = match db.find(&self.root_kind, &self.root_id)? {
            Some(root) => root,
            None => return Ok(None),
        };

        for (relation, id) in &self.path {
            let kind = current.schema().relation_def(relation)?.kind();
            let next = match kind {
                RelationKind::EmbedsMany => current.many(relation)?.find(id),
                RelationKind::EmbedsOne => current
                    .one(relation)?
                    .filter(|model| model.id().as_deref() == Some(id.as_str())),
            };
            current = match next {
                Some(model) => model,
                None => return Ok(None),
            };
        }
        Ok(Some(current))
    }
}

/// A model instance: either a top-level document of a collection or a
/// sub-document embedded in another model.
///
/// `Model` is a shared handle. Clones observe and mutate the same instance,
/// which is how a sub-document saved through a relation stays in sync with
/// the parent's loaded relation.
///
/// An embedded model keeps a weak reference to its parent together with the
/// relation it belongs to. Saving or deleting it goes through that relation,
/// so callers never pass the parent explicitly. The reference is never
/// serialized and never traversed by [Model::to_document].
///
/// The raw attributes are the source of truth. The data of an embedded
/// relation lives in the raw field named by the relation's local key; the
/// loaded-relations registry holds materialized handles over that data.
#[derive(Clone)]
pub struct Model {
    inner: Atomic<ModelInner>,
}

struct ModelInner {
    schema: Arc<ModelSchema>,
    db: Nestdoc,
    attributes: Document,
    original: Document,
    exists: bool,
    relations: IndexMap<String, RelationValue>,
    parent: Option<ParentLink>,
}

impl Model {
    /// A new, not yet persisted model. Attributes go through [Model::set].
    pub(crate) fn new(
        db: Nestdoc,
        schema: Arc<ModelSchema>,
        attributes: Document,
    ) -> NestdocResult<Model> {
        let model = Model::with_state(db, schema, Document::new(), false);
        model.fill(attributes)?;
        Ok(model)
    }

    /// A model over raw stored data, marked as existing and clean.
    pub(crate) fn from_raw(db: Nestdoc, schema: Arc<ModelSchema>, attributes: Document) -> Model {
        Model::with_state(db, schema, attributes, true)
    }

    fn with_state(db: Nestdoc, schema: Arc<ModelSchema>, attributes: Document, exists: bool) -> Model {
        let original = if exists {
            attributes.clone()
        } else {
            Document::new()
        };

        Model {
            inner: atomic(ModelInner {
                schema,
                db,
                attributes,
                original,
                exists,
                relations: IndexMap::new(),
                parent: None,
            }),
        }
    }

    /// Name of the model kind.
    pub fn kind(&self) -> String {
        self.inner.read_with(|inner| inner.schema.name().to_string())
    }

    pub fn schema(&self) -> Arc<ModelSchema> {
        self.inner.read_with(|inner| inner.schema.clone())
    }

    pub(crate) fn db(&self) -> Nestdoc {
        self.inner.read_with(|inner| inner.db.clone())
    }

    /// Reads an attribute. The identifier is returned in its string form;
    /// absent fields read as [Value::Null].
    pub fn get(&self, field: &str) -> Value {
        self.inner.read_with(|inner| {
            let value = inner.attributes.get(field);
            if field == DOC_ID {
                match id_to_string(&value) {
                    Some(id) => Value::String(id),
                    None => value,
                }
            } else {
                value
            }
        })
    }

    /// Writes an attribute.
    ///
    /// A string `_id` holding a valid hex object id is stored as a native
    /// [ObjectId]. Writing the raw field of a relation drops the loaded value
    /// of that relation so it is materialized again from the new data.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> NestdocResult<()> {
        let mut value = value.into();
        if field == DOC_ID {
            if let Some(id) = value.as_str().filter(|id| ObjectId::is_valid(id)) {
                value = Value::ObjectId(ObjectId::parse_str(id)?);
            }
        }

        self.inner.write_with(|inner| {
            inner.attributes.put(field, value)?;
            let stale: Vec<String> = inner
                .schema
                .relations()
                .filter(|def| def.local_key() == field)
                .map(|def| def.name().to_string())
                .collect();
            for name in stale {
                inner.relations.shift_remove(&name);
            }
            Ok(())
        })
    }

    /// Writes every field of the document through [Model::set].
    pub fn fill(&self, attributes: Document) -> NestdocResult<()> {
        for (field, value) in attributes {
            self.set(&field, value)?;
        }
        Ok(())
    }

    /// Removes an attribute.
    pub fn unset(&self, field: &str) -> Option<Value> {
        self.inner.write_with(|inner| inner.attributes.remove(field))
    }

    /// The identifier in its string form.
    pub fn id(&self) -> Option<String> {
        self.inner
            .read_with(|inner| inner.attributes.get_ref(DOC_ID).and_then(id_to_string))
    }

    /// The raw identifier value.
    pub fn key(&self) -> Value {
        self.inner.read_with(|inner| inner.attributes.get(DOC_ID))
    }

    /// A copy of the stored form of the attributes, embedded relation data
    /// included.
    pub fn raw_attributes(&self) -> Document {
        self.inner.read_with(|inner| inner.attributes.clone())
    }

    pub(crate) fn raw_attribute(&self, field: &str) -> Option<Value> {
        self.inner
            .read_with(|inner| inner.attributes.get_ref(field).cloned())
    }

    /// Replaces or removes a raw field without touching the registry.
    pub(crate) fn set_raw(&self, field: &str, value: Option<Value>) -> NestdocResult<()> {
        self.inner.write_with(|inner| match value {
            Some(value) => inner.attributes.put(field, value),
            None => {
                inner.attributes.remove(field);
                Ok(())
            }
        })
    }

    pub fn exists(&self) -> bool {
        self.inner.read_with(|inner| inner.exists)
    }

    pub fn set_exists(&self, exists: bool) {
        self.inner.write_with(|inner| inner.exists = exists)
    }

    pub fn is_dirty(&self) -> bool {
        self.inner
            .read_with(|inner| inner.attributes != inner.original)
    }

    pub fn is_dirty_field(&self, field: &str) -> bool {
        self.inner.read_with(|inner| {
            inner.attributes.get_ref(field) != inner.original.get_ref(field)
        })
    }

    /// Fields changed since the model was loaded or last saved. Removed
    /// fields are reported as [Value::Null].
    pub fn dirty(&self) -> Document {
        self.inner.read_with(|inner| {
            let changed = inner
                .attributes
                .iter()
                .filter(|(field, value)| inner.original.get_ref(field.as_str()) != Some(*value))
                .map(|(field, value)| (field.clone(), value.clone()));
            let removed = inner
                .original
                .iter()
                .filter(|(field, _)| !inner.attributes.contains_key(field.as_str()))
                .map(|(field, _)| (field.clone(), Value::Null));
            changed.chain(removed).collect()
        })
    }

    /// Puts back attributes taken with [Model::raw_attributes].
    pub(crate) fn restore_attributes(&self, attributes: Document) {
        self.inner.write_with(|inner| inner.attributes = attributes)
    }

    pub(crate) fn sync_original(&self) {
        self.inner
            .write_with(|inner| inner.original = inner.attributes.clone())
    }

    pub(crate) fn sync_original_field(&self, field: &str) -> NestdocResult<()> {
        self.inner.write_with(|inner| {
            match inner.attributes.get_ref(field).cloned() {
                Some(value) => inner.original.put(field, value)?,
                None => {
                    inner.original.remove(field);
                }
            }
            Ok(())
        })
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.get(CREATED_AT).as_datetime().copied()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.get(UPDATED_AT).as_datetime().copied()
    }

    /// Assigns a fresh [ObjectId] unless the model already has a usable
    /// identifier. Empty strings and non-string values are replaced.
    pub(crate) fn ensure_id(&self) -> NestdocResult<()> {
        if self.id().is_none() {
            let id = ObjectId::new();
            log::debug!("Assigned id {} to {}", id, self.kind());
            self.inner
                .write_with(|inner| inner.attributes.put(DOC_ID, id))?;
        }
        Ok(())
    }

    /// Refreshes `updated_at` and, for new models, sets `created_at`. Values
    /// the caller changed explicitly are kept.
    pub(crate) fn touch_timestamps(&self) -> NestdocResult<()> {
        let time = Value::from(now());
        if !self.is_dirty_field(UPDATED_AT) {
            self.inner
                .write_with(|inner| inner.attributes.put(UPDATED_AT, time.clone()))?;
        }
        if !self.exists() && !self.is_dirty_field(CREATED_AT) {
            self.inner
                .write_with(|inner| inner.attributes.put(CREATED_AT, time))?;
        }
        Ok(())
    }

    pub(crate) fn set_parent(&self, parent: &Model, relation: &str) {
        let link = ParentLink {
            model: Arc::downgrade(&parent.inner),
            relation: relation.to_string(),
            lineage: parent.lineage(),
        };
        self.inner.write_with(|inner| inner.parent = Some(link))
    }

    pub(crate) fn parent_link(&self) -> Option<ParentLink> {
        self.inner.read_with(|inner| inner.parent.clone())
    }

    pub(crate) fn restore_parent_link(&self, link: Option<ParentLink>) {
        self.inner.write_with(|inner| inner.parent = link)
    }

    fn lineage(&self) -> Option<Lineage> {
        let id = self.id()?;
        match self.parent_link() {
            None => Some(Lineage {
                root_kind: self.kind(),
                root_id: id,
                path: Vec::new(),
            }),
            Some(link) => {
                let mut lineage = link.lineage?;
                lineage.path.push((link.relation, id));
                Some(lineage)
            }
        }
    }

    /// The model this one is embedded in. A parent handle that was dropped
    /// is loaded again from storage.
    pub fn parent(&self) -> Option<Model> {
        match self.resolve_parent() {
            Ok(parent) => parent,
            Err(err) => {
                log::warn!("Could not load parent of {}: {}", self.kind(), err);
                None
            }
        }
    }

    fn resolve_parent(&self) -> NestdocResult<Option<Model>> {
        let link = match self.parent_link() {
            Some(link) => link,
            None => return Ok(None),
        };

        if let Some(inner) = link.model.upgrade() {
            let parent = Model { inner };
            let lineage = parent.lineage();
            if lineage.is_some() && lineage != link.lineage {
                self.inner.write_with(|inner| {
                    if let Some(link) = inner.parent.as_mut() {
                        link.lineage = lineage;
                    }
                });
            }
            return Ok(Some(parent));
        }

        match &link.lineage {
            Some(lineage) => {
                let parent = lineage.resolve(&self.db())?;
                if parent.is_some() {
                    log::debug!(
                        "Reloaded parent of {} from {} {}",
                        self.kind(),
                        lineage.root_kind,
                        lineage.root_id
                    );
                }
                Ok(parent)
            }
            None => Ok(None),
        }
    }

    /// Name of the relation this model is embedded through.
    pub fn parent_relation(&self) -> Option<String> {
        self.inner
            .read_with(|inner| inner.parent.as_ref().map(|link| link.relation.clone()))
    }

    pub fn is_embedded(&self) -> bool {
        self.inner.read_with(|inner| inner.parent.is_some())
    }

    /// Resolves the owning parent and relation of an embedded model.
    pub(crate) fn owner(&self) -> NestdocResult<Option<(Model, RelationDef)>> {
        let relation = match self.parent_relation() {
            Some(relation) => relation,
            None => return Ok(None),
        };

        match self.resolve_parent()? {
            Some(parent) => {
                let def = parent.schema().relation_def(&relation)?.clone();
                Ok(Some((parent, def)))
            }
            None => {
                log::error!("Parent of embedded {} is no longer available", self.kind());
                Err(NestdocError::new(
                    &format!(
                        "Embedded {} has lost its parent through relation '{}'",
                        self.kind(),
                        relation
                    ),
                    ErrorKind::OrphanedModel,
                ))
            }
        }
    }

    /// Handle of an embeds-many relation of this model.
    ///
    /// # Errors
    ///
    /// [ErrorKind::RelationNotFound] for an undeclared relation and
    /// [ErrorKind::RelationTypeMismatch] for an embeds-one relation.
    pub fn embeds_many(&self, name: &str) -> NestdocResult<EmbedsMany> {
        let def = self.relation_of_kind(name, RelationKind::EmbedsMany)?;
        EmbedsMany::new(self.clone(), def)
    }

    /// Handle of an embeds-one relation of this model.
    pub fn embeds_one(&self, name: &str) -> NestdocResult<EmbedsOne> {
        let def = self.relation_of_kind(name, RelationKind::EmbedsOne)?;
        EmbedsOne::new(self.clone(), def)
    }

    fn relation_of_kind(&self, name: &str, kind: RelationKind) -> NestdocResult<RelationDef> {
        let schema = self.schema();
        let def = schema.relation_def(name)?;
        if def.kind() != kind {
            log::error!("Relation {} of {} is not {:?}", name, schema.name(), kind);
            return Err(NestdocError::new(
                &format!(
                    "Relation '{}' of model '{}' is {:?}, not {:?}",
                    name,
                    schema.name(),
                    def.kind(),
                    kind
                ),
                ErrorKind::RelationTypeMismatch,
            ));
        }
        Ok(def.clone())
    }

    /// Models of an embeds-many relation. The relation is registered as
    /// loaded on first access.
    pub fn many(&self, name: &str) -> NestdocResult<ModelCollection> {
        let def = self.relation_of_kind(name, RelationKind::EmbedsMany)?;
        match self.loaded(&def)? {
            RelationValue::Many(models) => Ok(models),
            RelationValue::One(_) => Ok(ModelCollection::default()),
        }
    }

    /// Model of an embeds-one relation. The relation is registered as
    /// loaded on first access.
    pub fn one(&self, name: &str) -> NestdocResult<Option<Model>> {
        let def = self.relation_of_kind(name, RelationKind::EmbedsOne)?;
        match self.loaded(&def)? {
            RelationValue::One(model) => Ok(model),
            RelationValue::Many(_) => Ok(None),
        }
    }

    fn loaded(&self, def: &RelationDef) -> NestdocResult<RelationValue> {
        if let Some(value) = self.relation_value(def.name()) {
            return Ok(value);
        }
        let value = relation::materialize(self, def)?;
        self.set_relation(def.name(), value.clone());
        Ok(value)
    }

    pub fn relation_loaded(&self, name: &str) -> bool {
        self.inner
            .read_with(|inner| inner.relations.contains_key(name))
    }

    /// Names of the relations in the loaded registry, in load order.
    pub fn loaded_relations(&self) -> Vec<String> {
        self.inner
            .read_with(|inner| inner.relations.keys().cloned().collect())
    }

    /// Materializes the relations again from the raw data and registers
    /// them as loaded.
    pub fn load(&self, names: &[&str]) -> NestdocResult<()> {
        let schema = self.schema();
        for name in names {
            let def = schema.relation_def(name)?;
            let value = relation::materialize(self, def)?;
            self.set_relation(name, value);
        }
        Ok(())
    }

    /// Loads the schema's eager relations plus `extra`, skipping relations
    /// already in the registry.
    pub(crate) fn load_eager(&self, extra: &[String]) -> NestdocResult<()> {
        let schema = self.schema();
        for name in schema.eager_loads().iter().chain(extra.iter()) {
            if self.relation_loaded(name) {
                continue;
            }
            let def = schema.relation_def(name)?;
            let value = relation::materialize(self, def)?;
            self.set_relation(name, value);
        }
        Ok(())
    }

    pub(crate) fn relation_value(&self, name: &str) -> Option<RelationValue> {
        self.inner
            .read_with(|inner| inner.relations.get(name).cloned())
    }

    pub(crate) fn set_relation(&self, name: &str, value: RelationValue) {
        self.inner
            .write_with(|inner| inner.relations.insert(name.to_string(), value));
    }

    /// Writes the model.
    ///
    /// An embedded model is saved through the relation that owns it. A
    /// top-level model fires the schema hooks, gets an identifier and
    /// timestamps, and is written as a whole document. Returns `Ok(false)`
    /// when a hook vetoed.
    pub fn save(&self) -> NestdocResult<bool> {
        if let Some((parent, def)) = self.owner()? {
            return match def.kind() {
                RelationKind::EmbedsMany => {
                    Ok(EmbedsMany::new(parent, def)?.save(self)?.is_some())
                }
                RelationKind::EmbedsOne => Ok(EmbedsOne::new(parent, def)?.save(self)?.is_some()),
            };
        }

        let schema = self.schema();
        let hooks = schema.default_hooks();
        let exists = self.exists();

        if !hooks.fire_before(ModelEvent::Saving, self)? {
            return Ok(false);
        }

        if exists && !self.is_dirty() {
            hooks.fire_after(ModelEvent::Saved, self)?;
            return Ok(true);
        }

        let event = if exists {
            ModelEvent::Updating
        } else {
            ModelEvent::Creating
        };
        if !hooks.fire_before(event, self)? {
            return Ok(false);
        }

        self.ensure_id()?;
        if schema.uses_timestamps() {
            self.touch_timestamps()?;
        }

        let key = self.required_id()?;
        self.db()
            .store()
            .put(schema.collection_name(), &key, self.raw_attributes())?;
        log::debug!("Saved {} {} in {}", schema.name(), key, schema.collection_name());

        self.set_exists(true);
        self.sync_original();

        let event = if exists {
            ModelEvent::Updated
        } else {
            ModelEvent::Created
        };
        hooks.fire_after(event, self)?;
        hooks.fire_after(ModelEvent::Saved, self)?;
        Ok(true)
    }

    /// Removes the model.
    ///
    /// An embedded model is destroyed through the relation that owns it.
    /// Returns `Ok(false)` when nothing was removed or a hook vetoed.
    pub fn delete(&self) -> NestdocResult<bool> {
        if let Some((parent, def)) = self.owner()? {
            return match def.kind() {
                RelationKind::EmbedsMany => Ok(EmbedsMany::new(parent, def)?.destroy([self])? == 1),
                RelationKind::EmbedsOne => EmbedsOne::new(parent, def)?.delete_model(self),
            };
        }

        if !self.exists() {
            return Ok(false);
        }

        let schema = self.schema();
        let hooks = schema.default_hooks();
        if !hooks.fire_before(ModelEvent::Deleting, self)? {
            return Ok(false);
        }

        if let Some(key) = self.id() {
            self.db().store().remove(schema.collection_name(), &key)?;
            log::debug!("Deleted {} {}", schema.name(), key);
        }
        self.set_exists(false);
        hooks.fire_after(ModelEvent::Deleted, self)?;
        Ok(true)
    }

    /// Adds `amount` to a numeric field and saves. A missing field counts
    /// as zero.
    pub fn increment(&self, field: &str, amount: impl Into<Value>) -> NestdocResult<bool> {
        let next = add_numbers(&self.get(field), &amount.into(), false)?;
        self.set(field, next)?;
        self.save()
    }

    /// Subtracts `amount` from a numeric field and saves.
    pub fn decrement(&self, field: &str, amount: impl Into<Value>) -> NestdocResult<bool> {
        let next = add_numbers(&self.get(field), &amount.into(), true)?;
        self.set(field, next)?;
        self.save()
    }

    /// Loads a new handle of this model from storage. Embedded models are
    /// found again through a fresh copy of their parent. Returns `None` if
    /// the model is not stored anymore.
    pub fn fresh(&self) -> NestdocResult<Option<Model>> {
        let id = match self.id() {
            Some(id) => id,
            None => return Ok(None),
        };

        match self.owner()? {
            None => self.db().find(&self.kind(), &id),
            Some((parent, def)) => {
                let parent = match parent.fresh()? {
                    Some(parent) => parent,
                    None => return Ok(None),
                };
                match def.kind() {
                    RelationKind::EmbedsMany => Ok(parent.many(def.name())?.find(&id)),
                    RelationKind::EmbedsOne => Ok(parent
                        .one(def.name())?
                        .filter(|model| model.id().as_deref() == Some(id.as_str()))),
                }
            }
        }
    }

    /// Reloads the attributes of this handle from storage, dropping unsaved
    /// changes and loaded relations. Returns `Ok(false)` if the model is not
    /// stored anymore.
    pub fn refresh_from_store(&self) -> NestdocResult<bool> {
        let fresh = match self.fresh()? {
            Some(fresh) => fresh,
            None => return Ok(false),
        };

        let attributes = fresh.raw_attributes();
        self.inner.write_with(|inner| {
            inner.original = attributes.clone();
            inner.attributes = attributes;
            inner.exists = true;
            inner.relations.clear();
        });
        self.load_eager(&[])?;
        Ok(true)
    }

    /// External representation of the model.
    ///
    /// Raw relation fields are left out; every declared relation appears
    /// under its relation name, as an array of documents for embeds-many and
    /// a document or null for embeds-one. Relations not loaded yet are
    /// materialized for the output only and stay out of the registry. The
    /// identifier is written in its string form.
    pub fn to_document(&self) -> NestdocResult<Document> {
        let (attributes, schema, loaded) = self.inner.read_with(|inner| {
            (
                inner.attributes.clone(),
                inner.schema.clone(),
                inner.relations.clone(),
            )
        });

        let mut document = Document::new();
        for (field, value) in attributes {
            if schema.is_relation_key(&field) {
                continue;
            }
            if field == DOC_ID {
                let id = id_to_string(&value).map(Value::String).unwrap_or(value);
                document.put(field, id)?;
            } else {
                document.put(field, value)?;
            }
        }

        for def in schema.relations() {
            let value = match loaded.get(def.name()) {
                Some(value) => value.clone(),
                None => relation::materialize(self, def)?,
            };
            document.put(def.name(), value.to_value()?)?;
        }
        Ok(document)
    }

    /// External representation of the loaded relations only.
    pub fn relations_to_document(&self) -> NestdocResult<Document> {
        let loaded = self.inner.read_with(|inner| inner.relations.clone());
        let mut document = Document::new();
        for (name, value) in loaded {
            document.put(name, value.to_value()?)?;
        }
        Ok(document)
    }

    pub(crate) fn required_id(&self) -> NestdocResult<String> {
        self.id().ok_or_else(|| {
            log::error!("{} has no usable identifier", self.kind());
            NestdocError::new(
                &format!("Model '{}' has no usable identifier", self.kind()),
                ErrorKind::InvalidId,
            )
        })
    }
}

impl Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.read_with(|inner| {
            f.debug_struct("Model")
                .field("kind", &inner.schema.name())
                .field("exists", &inner.exists)
                .field("attributes", &inner.attributes)
                .finish()
        })
    }
}

/// String form of an identifier value. Only object ids and non-empty
/// strings are usable identifiers.
pub(crate) fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::ObjectId(id) => Some(id.to_hex()),
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        _ => None,
    }
}

fn add_numbers(current: &Value, amount: &Value, negate: bool) -> NestdocResult<Value> {
    let current = if current.is_null() {
        &Value::I32(0)
    } else {
        current
    };

    if !current.is_number() || !amount.is_number() {
        log::error!("Cannot add {} to {}", amount, current);
        return Err(NestdocError::new(
            &format!("Cannot add {} to non-numeric value {}", amount, current),
            ErrorKind::InvalidDataType,
        ));
    }

    if let (Some(a), Some(b)) = (current.as_i64(), amount.as_i64()) {
        let b = if negate { b.checked_neg() } else { Some(b) };
        let sum = b.and_then(|b| a.checked_add(b)).ok_or_else(|| {
            log::error!("Integer overflow adding {} to {}", amount, a);
            NestdocError::new("Integer overflow", ErrorKind::InvalidDataType)
        })?;
        let both_i32 = matches!(current, Value::I32(_)) && matches!(amount, Value::I32(_));
        return match i32::try_from(sum) {
            Ok(small) if both_i32 => Ok(Value::I32(small)),
            _ => Ok(Value::I64(sum)),
        };
    }

    let a = current.as_f64().unwrap_or_default();
    let b = amount.as_f64().unwrap_or_default();
    Ok(Value::F64(if negate { a - b } else { a + b }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::model::ModelHooks;

    fn db() -> Nestdoc {
        Nestdoc::builder()
            .register(
                ModelSchema::new("User")
                    .embeds_many_with_key("addresses", "Address", "_addresses")
                    .embeds_one("father", "User"),
            )
            .register(ModelSchema::new("Address").embeds_many("addresses", "Address"))
            .open()
            .unwrap()
    }

    #[test]
    fn test_new_model_is_dirty_and_not_existing() {
        let user = db().make("User", doc! { name: "John Doe" }).unwrap();
        assert!(!user.exists());
        assert!(user.is_dirty());
        assert_eq!(user.dirty(), doc! { name: "John Doe" });
        assert_eq!(user.kind(), "User");
        assert!(user.id().is_none());
    }

    #[test]
    fn test_hex_string_id_is_stored_natively() {
        let user = db().make("User", doc! {}).unwrap();
        let id = ObjectId::new();
        user.set(DOC_ID, id.to_hex()).unwrap();
        assert_eq!(user.key(), Value::ObjectId(id));
        assert_eq!(user.get(DOC_ID), Value::from(id.to_hex()));
        assert_eq!(user.id(), Some(id.to_hex()));
    }

    #[test]
    fn test_other_string_ids_are_kept() {
        let user = db().make("User", doc! { "_id": "john" }).unwrap();
        assert_eq!(user.key(), Value::from("john"));
        assert_eq!(user.id(), Some("john".to_string()));
    }

    #[test]
    fn test_ensure_id_replaces_empty_id() {
        let user = db().make("User", doc! { "_id": "" }).unwrap();
        assert!(user.id().is_none());
        user.ensure_id().unwrap();
        assert!(user.key().is_object_id());
        assert_eq!(user.id().unwrap().len(), 24);
    }

    #[test]
    fn test_save_top_level_sets_timestamps() {
        let db = db();
        let user = db.make("User", doc! { name: "John Doe" }).unwrap();
        assert!(user.save().unwrap());
        assert!(user.exists());
        assert!(!user.is_dirty());
        assert!(user.created_at().is_some());
        assert_eq!(user.created_at(), user.updated_at());

        let stored = db.find("User", &user.id().unwrap()).unwrap().unwrap();
        assert_eq!(stored.get("name"), Value::from("John Doe"));
    }

    #[test]
    fn test_explicit_timestamps_are_kept() {
        let db = db();
        let created = chrono::Utc::now() - chrono::Duration::days(3);
        let user = db
            .make("User", doc! { name: "John Doe", created_at: created })
            .unwrap();
        user.save().unwrap();
        assert_eq!(user.created_at(), Some(created));
        assert_ne!(user.updated_at(), Some(created));
    }

    #[test]
    fn test_dirty_tracks_changes_and_removals() {
        let db = db();
        let user = db.create("User", doc! { name: "John Doe", age: 35 }).unwrap();
        user.set("name", "Jane Doe").unwrap();
        user.unset("age");
        assert!(user.is_dirty_field("name"));
        assert!(!user.is_dirty_field(CREATED_AT));
        assert_eq!(user.dirty(), doc! { name: "Jane Doe", age: (Value::Null) });
    }

    #[test]
    fn test_vetoed_top_level_save() {
        let db = Nestdoc::builder()
            .register(
                ModelSchema::new("User")
                    .hooks(ModelHooks::new().creating(|_| Ok(false))),
            )
            .open()
            .unwrap();
        let user = db.make("User", doc! { name: "John Doe" }).unwrap();
        assert!(!user.save().unwrap());
        assert!(!user.exists());
        assert!(db.query("User").unwrap().get().unwrap().is_empty());
    }

    #[test]
    fn test_delete_top_level() {
        let db = db();
        let user = db.create("User", doc! { name: "John Doe" }).unwrap();
        assert!(user.delete().unwrap());
        assert!(!user.exists());
        assert!(db.find("User", &user.id().unwrap()).unwrap().is_none());
        assert!(!user.delete().unwrap());
    }

    #[test]
    fn test_relation_kind_mismatch() {
        let user = db().make("User", doc! {}).unwrap();
        let err = user.embeds_one("addresses").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::RelationTypeMismatch);
        let err = user.many("father").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::RelationTypeMismatch);
        let err = user.many("books").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::RelationNotFound);
    }

    #[test]
    fn test_lazy_access_registers_relation() {
        let user = db().create("User", doc! { name: "John Doe" }).unwrap();
        assert!(!user.relation_loaded("addresses"));
        assert!(user.many("addresses").unwrap().is_empty());
        assert!(user.relation_loaded("addresses"));
        assert_eq!(user.loaded_relations(), vec!["addresses"]);
    }

    #[test]
    fn test_to_document_does_not_register() {
        let user = db().create("User", doc! { name: "John Doe" }).unwrap();
        let document = user.to_document().unwrap();
        assert!(!document.contains_key("_addresses"));
        assert_eq!(document.get("addresses"), Value::Array(vec![]));
        assert_eq!(document.get("father"), Value::Null);
        assert!(document.get(DOC_ID).is_string());
        assert!(user.loaded_relations().is_empty());
        assert!(user.relations_to_document().unwrap().is_empty());
    }

    #[test]
    fn test_setting_raw_relation_field_drops_loaded_value() {
        let user = db().create("User", doc! { name: "John Doe" }).unwrap();
        user.many("addresses").unwrap();
        user.set("_addresses", vec![doc! { "_id": "a", city: "Paris" }])
            .unwrap();
        assert!(!user.relation_loaded("addresses"));
        assert_eq!(user.many("addresses").unwrap().ids(), vec!["a"]);
    }

    #[test]
    fn test_increment_and_decrement_top_level() {
        let db = db();
        let user = db.create("User", doc! { name: "John Doe", age: 35 }).unwrap();
        user.increment("age", 1).unwrap();
        assert_eq!(user.get("age"), Value::I32(36));
        user.decrement("age", 6).unwrap();
        assert_eq!(user.get("age"), Value::I32(30));
        user.increment("score", 2.5).unwrap();
        assert_eq!(user.get("score"), Value::F64(2.5));

        let stored = user.fresh().unwrap().unwrap();
        assert_eq!(stored.get("age"), Value::I32(30));
    }

    #[test]
    fn test_increment_non_numeric() {
        let user = db().create("User", doc! { name: "John Doe" }).unwrap();
        let err = user.increment("name", 1).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidDataType);
    }

    #[test]
    fn test_refresh_from_store_drops_changes() {
        let user = db().create("User", doc! { name: "John Doe" }).unwrap();
        user.set("name", "Jane Doe").unwrap();
        assert!(user.refresh_from_store().unwrap());
        assert_eq!(user.get("name"), Value::from("John Doe"));
        assert!(!user.is_dirty());
    }

    #[test]
    fn test_dropped_parent_is_reloaded() {
        let db = db();
        let (user_id, address) = {
            let user = db.create("User", doc! { name: "John Doe" }).unwrap();
            let address = user
                .embeds_many("addresses")
                .unwrap()
                .create(doc! { city: "Paris" })
                .unwrap()
                .unwrap();
            (user.id().unwrap(), address)
        };
        assert!(address.is_embedded());
        assert_eq!(address.parent().unwrap().id(), Some(user_id.clone()));

        address.set("city", "Lyon").unwrap();
        assert!(address.save().unwrap());
        let stored = db.find("User", &user_id).unwrap().unwrap();
        assert_eq!(
            stored.many("addresses").unwrap().pluck("city"),
            vec![Value::from("Lyon")]
        );
    }

    #[test]
    fn test_orphaned_embedded_model() {
        let db = db();
        let address = {
            let user = db.create("User", doc! { name: "John Doe" }).unwrap();
            let address = user
                .embeds_many("addresses")
                .unwrap()
                .create(doc! { city: "Paris" })
                .unwrap()
                .unwrap();
            assert!(user.delete().unwrap());
            address
        };
        assert!(address.is_embedded());
        assert!(address.parent().is_none());
        let err = address.save().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::OrphanedModel);
    }

    #[test]
    fn test_nested_lineage_reloads_middle_parent() {
        let db = db();
        let user = db.create("User", doc! { name: "John Doe" }).unwrap();
        let user_id = user.id().unwrap();
        let city = {
            let country = user
                .embeds_many("addresses")
                .unwrap()
                .create(doc! { country: "France" })
                .unwrap()
                .unwrap();
            country
                .embeds_many("addresses")
                .unwrap()
                .create(doc! { city: "Paris" })
                .unwrap()
                .unwrap()
        };
        drop(user);

        city.set("city", "Lyon").unwrap();
        assert!(city.save().unwrap());
        let stored = db.find("User", &user_id).unwrap().unwrap();
        let country = stored.many("addresses").unwrap().first().unwrap();
        assert_eq!(
            country.many("addresses").unwrap().pluck("city"),
            vec![Value::from("Lyon")]
        );
    }

    #[test]
    fn test_add_numbers() {
        assert_eq!(add_numbers(&Value::Null, &Value::I32(2), false).unwrap(), Value::I32(2));
        assert_eq!(
            add_numbers(&Value::I32(i32::MAX), &Value::I32(1), false).unwrap(),
            Value::I64(i32::MAX as i64 + 1)
        );
        assert_eq!(add_numbers(&Value::I64(5), &Value::I32(2), true).unwrap(), Value::I64(3));
        assert_eq!(add_numbers(&Value::F64(1.5), &Value::I32(1), false).unwrap(), Value::F64(2.5));
        assert!(add_numbers(&Value::from("a"), &Value::I32(1), false).is_err());

        let err = add_numbers(&Value::I64(0), &Value::I64(i64::MIN), true).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidDataType);
        assert_eq!(
            add_numbers(&Value::I64(-1), &Value::I64(i64::MAX), true).unwrap(),
            Value::I64(i64::MIN)
        );
    }
}
