use crate::collection::Document;
use crate::common::Value;
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use crate::model::{Model, ModelEvent, ModelHooks, ModelSchema, RelationDef};
use crate::relation::{materialize, persist_parent, refresh};
use std::fmt::Debug;
use std::sync::Arc;

/// An embeds-one relation of one parent model.
///
/// Holds at most one sub-document, stored as a document in the parent's raw
/// field. Saving replaces whatever occupies the slot. After `delete` or
/// `dissociate` the field is gone and the relation reads as `None`.
#[derive(Clone)]
pub struct EmbedsOne {
    parent: Model,
    def: RelationDef,
    related: Arc<ModelSchema>,
    hooks: ModelHooks,
}

impl EmbedsOne {
    pub(crate) fn new(parent: Model, def: RelationDef) -> NestdocResult<Self> {
        let related = parent.db().schema(def.related())?;
        let hooks = related.default_hooks().clone();
        Ok(EmbedsOne {
            parent,
            def,
            related,
            hooks,
        })
    }

    pub fn with_hooks(mut self, hooks: ModelHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn parent(&self) -> &Model {
        &self.parent
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    /// The embedded model, from the loaded value if there is one.
    pub fn get(&self) -> NestdocResult<Option<Model>> {
        if let Some(value) = self.parent.relation_value(self.def.name()) {
            if let Some(model) = value.as_one() {
                return Ok(model.clone());
            }
        }

        match materialize(&self.parent, &self.def)?.as_one() {
            Some(model) => Ok(model.clone()),
            None => Ok(None),
        }
    }

    /// Puts the model in the slot and writes the parent. Returns `Ok(None)`
    /// when a hook vetoed, on the model or on saving the parent.
    pub fn save(&self, model: &Model) -> NestdocResult<Option<Model>> {
        self.check_related(model)?;

        let exists = model.exists();
        if !self.hooks.fire_before(ModelEvent::Saving, model)? {
            return Ok(None);
        }

        if exists && !model.is_dirty() {
            model.set_parent(&self.parent, self.def.name());
            self.hooks.fire_after(ModelEvent::Saved, model)?;
            return Ok(Some(model.clone()));
        }

        let event = if exists {
            ModelEvent::Updating
        } else {
            ModelEvent::Creating
        };
        if !self.hooks.fire_before(event, model)? {
            return Ok(None);
        }

        let previous = self.parent.raw_attribute(self.def.local_key());
        let attributes = model.raw_attributes();
        let link = model.parent_link();

        model.set_parent(&self.parent, self.def.name());
        model.ensure_id()?;
        if self.related.uses_timestamps() {
            model.touch_timestamps()?;
        }

        self.write(Some(model.raw_attributes()), Some(model))?;
        if !persist_parent(&self.parent, &self.def)? {
            model.restore_attributes(attributes);
            model.restore_parent_link(link);
            self.rollback(previous)?;
            return Ok(None);
        }
        log::debug!("Saved {} into {}", self.related.name(), self.def.name());

        model.set_exists(true);
        model.sync_original();

        let event = if exists {
            ModelEvent::Updated
        } else {
            ModelEvent::Created
        };
        self.hooks.fire_after(event, model)?;
        self.hooks.fire_after(ModelEvent::Saved, model)?;
        Ok(Some(model.clone()))
    }

    pub fn create(&self, attributes: Document) -> NestdocResult<Option<Model>> {
        let model = Model::new(self.parent.db(), self.related.clone(), attributes)?;
        self.save(&model)
    }

    /// Puts the model in the slot in memory only.
    pub fn associate(&self, model: &Model) -> NestdocResult<Model> {
        self.check_related(model)?;
        model.set_parent(&self.parent, self.def.name());
        model.ensure_id()?;
        self.write(Some(model.raw_attributes()), Some(model))?;
        Ok(model.clone())
    }

    /// Empties the slot in memory only and returns what was in it.
    pub fn dissociate(&self) -> NestdocResult<Option<Model>> {
        let previous = self.get()?;
        if previous.is_some() {
            self.write(None, None)?;
        }
        Ok(previous)
    }

    /// Deletes the embedded model and writes the parent. Returns `Ok(false)`
    /// if the slot was empty or a hook vetoed.
    pub fn delete(&self) -> NestdocResult<bool> {
        match self.get()? {
            Some(model) => self.delete_target(&model),
            None => Ok(false),
        }
    }

    /// Deletes `model` if it is the one in the slot.
    pub(crate) fn delete_model(&self, model: &Model) -> NestdocResult<bool> {
        let current = self.get()?.and_then(|current| current.id());
        if current.is_none() || current != model.id() {
            return Ok(false);
        }
        self.delete_target(model)
    }

    fn delete_target(&self, model: &Model) -> NestdocResult<bool> {
        if !self.hooks.fire_before(ModelEvent::Deleting, model)? {
            return Ok(false);
        }

        let previous = self.parent.raw_attribute(self.def.local_key());
        self.write(None, None)?;
        if !persist_parent(&self.parent, &self.def)? {
            self.rollback(previous)?;
            return Ok(false);
        }
        log::debug!("Deleted {} from {}", self.related.name(), self.def.name());

        model.set_exists(false);
        self.hooks.fire_after(ModelEvent::Deleted, model)?;
        Ok(true)
    }

    fn write(&self, record: Option<Document>, keep: Option<&Model>) -> NestdocResult<()> {
        self.parent
            .set_raw(self.def.local_key(), record.map(Value::Document))?;
        let keep: Vec<Model> = keep.into_iter().cloned().collect();
        refresh(&self.parent, &self.def, &keep)
    }

    fn rollback(&self, previous: Option<Value>) -> NestdocResult<()> {
        log::debug!("Restoring {} of {}", self.def.name(), self.parent.kind());
        self.parent.set_raw(self.def.local_key(), previous)?;
        refresh(&self.parent, &self.def, &[])
    }

    fn check_related(&self, model: &Model) -> NestdocResult<()> {
        let kind = model.kind();
        if kind != self.related.name() {
            log::error!(
                "Cannot embed {} in {}, expected {}",
                kind,
                self.def.name(),
                self.related.name()
            );
            return Err(NestdocError::new(
                &format!(
                    "Relation '{}' embeds '{}', got '{}'",
                    self.def.name(),
                    self.related.name(),
                    kind
                ),
                ErrorKind::RelationTypeMismatch,
            ));
        }
        Ok(())
    }
}

impl Debug for EmbedsOne {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedsOne")
            .field("parent", &self.parent.kind())
            .field("relation", &self.def.name())
            .field("related", &self.related.name())
            .finish()
    }
}
