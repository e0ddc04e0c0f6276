use crate::common::Value;
use crate::errors::NestdocResult;
use crate::model::{Model, ModelCollection, ModelSchema};
use crate::Nestdoc;
use std::sync::Arc;

/// Loads top-level models of one kind from storage.
///
/// Filters are exact field equality, applied by scanning the collection.
/// Relations named with [ModelQuery::with] are materialized on every
/// returned model in addition to the schema's own eager loads.
///
/// ```ignore
/// let users = db
///     .query("User")?
///     .where_eq("name", "John Doe")
///     .with("addresses")
///     .get()?;
/// ```
#[derive(Clone)]
pub struct ModelQuery {
    db: Nestdoc,
    schema: Arc<ModelSchema>,
    filters: Vec<(String, Value)>,
    with: Vec<String>,
}

impl ModelQuery {
    pub(crate) fn new(db: Nestdoc, schema: Arc<ModelSchema>) -> Self {
        ModelQuery {
            db,
            schema,
            filters: Vec::new(),
            with: Vec::new(),
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    /// Eager-loads the relation on every returned model.
    pub fn with(mut self, relation: &str) -> Self {
        if !self.with.iter().any(|r| r == relation) {
            self.with.push(relation.to_string());
        }
        self
    }

    pub fn get(&self) -> NestdocResult<ModelCollection> {
        for relation in &self.with {
            self.schema.relation_def(relation)?;
        }

        let documents = self.db.store().values(self.schema.collection_name())?;
        let mut models = Vec::new();
        for document in documents {
            let model = Model::from_raw(self.db.clone(), self.schema.clone(), document);
            if self.matches(&model) {
                model.load_eager(&self.with)?;
                models.push(model);
            }
        }
        Ok(ModelCollection::new(models))
    }

    pub fn first(&self) -> NestdocResult<Option<Model>> {
        Ok(self.get()?.first())
    }

    pub fn count(&self) -> NestdocResult<usize> {
        let documents = self.db.store().values(self.schema.collection_name())?;
        Ok(documents
            .into_iter()
            .map(|document| Model::from_raw(self.db.clone(), self.schema.clone(), document))
            .filter(|model| self.matches(model))
            .count())
    }

    fn matches(&self, model: &Model) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| model.get(field) == *value)
    }
}
