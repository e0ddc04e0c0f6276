use crate::collection::Document;
use crate::common::SubscriberRef;
use crate::errors::NestdocResult;
use crate::model::{Model, ModelCollection, ModelQuery, ModelSchema};
use crate::nestdoc_builder::NestdocBuilder;
use crate::nestdoc_config::NestdocConfig;
use crate::store::{DocumentStore, StoreEventListener};
use std::sync::Arc;

/// Entry point of the relation engine.
///
/// `Nestdoc` knows the registered model schemas and the document store. It
/// creates, finds and queries top-level models; embedded models are reached
/// through the relations of their parents.
///
/// Clones share the same state.
///
/// # Examples
///
/// ```rust,ignore
/// let db = Nestdoc::builder()
///     .register(ModelSchema::new("User").embeds_many("addresses", "Address"))
///     .register(ModelSchema::new("Address"))
///     .open()?;
///
/// let user = db.create("User", doc! { name: "John Doe" })?;
/// user.embeds_many("addresses")?.create(doc! { city: "Paris" })?;
/// ```
#[derive(Clone)]
pub struct Nestdoc {
    inner: Arc<NestdocInner>,
}

impl Nestdoc {
    pub fn builder() -> NestdocBuilder {
        NestdocBuilder::new()
    }

    pub(crate) fn new(config: NestdocConfig) -> NestdocResult<Self> {
        let store = config.store()?;
        Ok(Nestdoc {
            inner: Arc::new(NestdocInner { config, store }),
        })
    }

    /// Builds a new, unsaved model of the given kind.
    pub fn make(&self, kind: &str, attributes: Document) -> NestdocResult<Model> {
        let schema = self.schema(kind)?;
        Model::new(self.clone(), schema, attributes)
    }

    /// Builds a model of the given kind and saves it. A vetoed save still
    /// returns the model, which then does not exist.
    pub fn create(&self, kind: &str, attributes: Document) -> NestdocResult<Model> {
        let model = self.make(kind, attributes)?;
        model.save()?;
        Ok(model)
    }

    /// Loads a top-level model by identifier, with its eager relations.
    pub fn find(&self, kind: &str, id: &str) -> NestdocResult<Option<Model>> {
        let schema = self.schema(kind)?;
        let document = match self.inner.store.get(schema.collection_name(), id)? {
            Some(document) => document,
            None => return Ok(None),
        };

        let model = Model::from_raw(self.clone(), schema, document);
        model.load_eager(&[])?;
        Ok(Some(model))
    }

    /// Loads every stored model of the given kind.
    pub fn all(&self, kind: &str) -> NestdocResult<ModelCollection> {
        self.query(kind)?.get()
    }

    pub fn query(&self, kind: &str) -> NestdocResult<ModelQuery> {
        let schema = self.schema(kind)?;
        Ok(ModelQuery::new(self.clone(), schema))
    }

    /// Removes every stored model of the given kind.
    pub fn truncate(&self, kind: &str) -> NestdocResult<()> {
        let schema = self.schema(kind)?;
        self.inner.store.clear(schema.collection_name())?;
        log::debug!("Truncated {}", schema.collection_name());
        Ok(())
    }

    pub fn schema(&self, kind: &str) -> NestdocResult<Arc<ModelSchema>> {
        self.inner.config.schema(kind)
    }

    pub fn store(&self) -> DocumentStore {
        self.inner.store.clone()
    }

    pub fn config(&self) -> NestdocConfig {
        self.inner.config.clone()
    }

    /// Registers a listener for every write reaching the store.
    pub fn subscribe(&self, listener: StoreEventListener) -> NestdocResult<SubscriberRef> {
        self.inner.store.subscribe(listener)
    }

    pub fn unsubscribe(&self, subscriber: SubscriberRef) -> NestdocResult<()> {
        self.inner.store.unsubscribe(subscriber)
    }

    pub fn close(&self) -> NestdocResult<()> {
        self.inner.config.close()
    }

    pub fn is_closed(&self) -> NestdocResult<bool> {
        self.inner.store.is_closed()
    }
}

struct NestdocInner {
    config: NestdocConfig,
    store: DocumentStore,
}
