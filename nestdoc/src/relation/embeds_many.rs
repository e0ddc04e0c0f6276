use crate::collection::Document;
use crate::common::Value;
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use crate::model::{Model, ModelCollection, ModelEvent, ModelHooks, ModelSchema, Paginator, RelationDef};
use crate::relation::{persist_parent, refresh, materialize, EmbeddedRecords, EmbeddedRef};
use std::fmt::Debug;
use std::sync::Arc;

/// An embeds-many relation of one parent model.
///
/// Sub-documents are kept in the parent's raw field named by the relation's
/// local key, in insertion order, unique by identifier. Saving a
/// sub-document whose identifier is already present replaces it in place.
///
/// `save`, `create` and `destroy` write the parent right away; `associate`
/// and `dissociate` only change the parent in memory until it is saved.
///
/// ```ignore
/// let addresses = user.embeds_many("addresses")?;
/// let london = addresses.create(doc!{ city: "London" })?;
/// addresses.save(&db.make("Address", doc!{ city: "Paris" })?)?;
/// assert_eq!(addresses.count()?, 2);
/// ```
#[derive(Clone)]
pub struct EmbedsMany {
    parent: Model,
    def: RelationDef,
    related: Arc<ModelSchema>,
    hooks: ModelHooks,
}

impl EmbedsMany {
    pub(crate) fn new(parent: Model, def: RelationDef) -> NestdocResult<Self> {
        let related = parent.db().schema(def.related())?;
        let hooks = related.default_hooks().clone();
        Ok(EmbedsMany {
            parent,
            def,
            related,
            hooks,
        })
    }

    /// Uses `hooks` instead of the related schema's hooks for calls made
    /// through this handle.
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

    pub fn local_key(&self) -> &str {
        self.def.local_key()
    }

    /// Saves a sub-document into the relation and writes the parent.
    ///
    /// Returns `Ok(None)` when a `saving`, `creating` or `updating` hook
    /// vetoed, or when saving the parent was vetoed; nothing is changed in
    /// that case. A model that exists and has no changes only fires `saving`
    /// and `saved`.
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

        let mut records = self.records();
        let replaced = records.upsert(model.raw_attributes());
        log::debug!(
            "{} {} {:?} in {}",
            if replaced { "Replaced" } else { "Appended" },
            self.related.name(),
            model.id(),
            self.def.name()
        );
        self.write(records, &[model.clone()])?;
        if !persist_parent(&self.parent, &self.def)? {
            model.restore_attributes(attributes);
            model.restore_parent_link(link);
            self.rollback(previous)?;
            return Ok(None);
        }

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

    /// Saves each model in order. A veto only affects its own entry.
    pub fn save_many(&self, models: &[Model]) -> NestdocResult<Vec<Option<Model>>> {
        models.iter().map(|model| self.save(model)).collect()
    }

    /// Builds a new sub-document from the attributes and saves it.
    pub fn create(&self, attributes: Document) -> NestdocResult<Option<Model>> {
        let model = Model::new(self.parent.db(), self.related.clone(), attributes)?;
        self.save(&model)
    }

    pub fn create_many(&self, attributes: Vec<Document>) -> NestdocResult<Vec<Option<Model>>> {
        attributes
            .into_iter()
            .map(|attributes| self.create(attributes))
            .collect()
    }

    /// Puts the model into the relation in memory only. The parent has to
    /// be saved, or another writing call made, to store the change.
    pub fn associate(&self, model: &Model) -> NestdocResult<Model> {
        self.check_related(model)?;
        model.set_parent(&self.parent, self.def.name());
        model.ensure_id()?;

        let mut records = self.records();
        records.upsert(model.raw_attributes());
        self.write(records, &[model.clone()])?;
        Ok(model.clone())
    }

    /// Same as [EmbedsMany::associate].
    pub fn attach(&self, model: &Model) -> NestdocResult<Model> {
        self.associate(model)
    }

    /// Removes the designated sub-documents in memory only. Returns how many
    /// were removed.
    pub fn dissociate<T: Into<EmbeddedRef>>(
        &self,
        targets: impl IntoIterator<Item = T>,
    ) -> NestdocResult<usize> {
        let mut records = self.records();
        let mut removed = 0;
        for target in targets {
            if let Some(id) = target.into().id() {
                if records.remove(&id).is_some() {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            self.write(records, &[])?;
        }
        Ok(removed)
    }

    /// Same as [EmbedsMany::dissociate].
    pub fn detach<T: Into<EmbeddedRef>>(
        &self,
        targets: impl IntoIterator<Item = T>,
    ) -> NestdocResult<usize> {
        self.dissociate(targets)
    }

    /// Deletes the designated sub-documents and writes the parent.
    ///
    /// Each target fires `deleting`; a veto keeps that entry. Unknown
    /// identifiers are skipped. Returns how many entries were removed, or 0
    /// when saving the parent was vetoed.
    pub fn destroy<T: Into<EmbeddedRef>>(
        &self,
        targets: impl IntoIterator<Item = T>,
    ) -> NestdocResult<usize> {
        let targets: Vec<EmbeddedRef> = targets.into_iter().map(Into::into).collect();
        if targets.is_empty() {
            return Ok(0);
        }

        let current = self.get()?;
        let mut records = self.records();
        let mut removed: Vec<Model> = Vec::new();

        for target in targets {
            let id = match target.id() {
                Some(id) if records.contains(&id) => id,
                _ => continue,
            };

            let model = match target.model().cloned().or_else(|| current.find(&id)) {
                Some(model) => model,
                None => continue,
            };

            if !self.hooks.fire_before(ModelEvent::Deleting, &model)? {
                continue;
            }
            records.remove(&id);
            removed.push(model);
        }

        if removed.is_empty() {
            return Ok(0);
        }

        let previous = self.parent.raw_attribute(self.def.local_key());
        self.write(records, &[])?;
        if !persist_parent(&self.parent, &self.def)? {
            self.rollback(previous)?;
            return Ok(0);
        }
        log::debug!("Destroyed {} entries of {}", removed.len(), self.def.name());

        for model in &removed {
            model.set_exists(false);
            self.hooks.fire_after(ModelEvent::Deleted, model)?;
        }
        Ok(removed.len())
    }

    /// Destroys every sub-document of the relation.
    pub fn delete(&self) -> NestdocResult<usize> {
        let ids = self.records().ids();
        self.destroy(ids)
    }

    /// The sub-documents: the loaded value if the relation is loaded,
    /// otherwise a fresh materialization that is not registered.
    pub fn get(&self) -> NestdocResult<ModelCollection> {
        if let Some(value) = self.parent.relation_value(self.def.name()) {
            if let Some(models) = value.as_many() {
                return Ok(models.clone());
            }
        }

        match materialize(&self.parent, &self.def)?.as_many() {
            Some(models) => Ok(models.clone()),
            None => Ok(ModelCollection::default()),
        }
    }

    /// Same as [EmbedsMany::get].
    pub fn all(&self) -> NestdocResult<ModelCollection> {
        self.get()
    }

    pub fn first(&self) -> NestdocResult<Option<Model>> {
        Ok(self.get()?.first())
    }

    pub fn last(&self) -> NestdocResult<Option<Model>> {
        Ok(self.get()?.last())
    }

    pub fn count(&self) -> NestdocResult<usize> {
        Ok(self.records().len())
    }

    pub fn find(&self, id: &str) -> NestdocResult<Option<Model>> {
        Ok(self.get()?.find(id))
    }

    pub fn contains(&self, id: &str) -> NestdocResult<bool> {
        Ok(self.records().contains(id))
    }

    pub fn where_eq(&self, field: &str, value: impl Into<Value>) -> NestdocResult<ModelCollection> {
        Ok(self.get()?.where_eq(field, value))
    }

    pub fn where_in<V: Into<Value>>(
        &self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> NestdocResult<ModelCollection> {
        Ok(self.get()?.where_in(field, values))
    }

    pub fn sort_by(&self, field: &str) -> NestdocResult<ModelCollection> {
        Ok(self.get()?.sort_by(field))
    }

    pub fn pluck(&self, field: &str) -> NestdocResult<Vec<Value>> {
        Ok(self.get()?.pluck(field))
    }

    pub fn paginate(&self, per_page: usize, page: usize) -> NestdocResult<Paginator> {
        Ok(self.get()?.paginate(per_page, page))
    }

    fn records(&self) -> EmbeddedRecords {
        let raw = self
            .parent
            .raw_attribute(self.def.local_key())
            .unwrap_or(Value::Null);
        EmbeddedRecords::from_value(&raw, self.def.name())
    }

    fn write(&self, records: EmbeddedRecords, keep: &[Model]) -> NestdocResult<()> {
        self.parent
            .set_raw(self.def.local_key(), Some(records.into_value()))?;
        refresh(&self.parent, &self.def, keep)
    }

    /// Puts back the raw field as it was before a write the parent refused.
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

impl Debug for EmbedsMany {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedsMany")
            .field("parent", &self.parent.kind())
            .field("relation", &self.def.name())
            .field("related", &self.related.name())
            .finish()
    }
}
