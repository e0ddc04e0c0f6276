//! Configuration of a [crate::Nestdoc] instance.

use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use crate::model::ModelSchema;
use crate::store::{DocumentStore, StoreProvider};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Holds the registered model schemas and the storage backend.
///
/// Schemas and the store can only be set before the configuration is
/// initialized; afterwards the configuration is read-only.
#[derive(Clone)]
pub struct NestdocConfig {
    inner: Arc<NestdocConfigInner>,
}

impl Default for NestdocConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl NestdocConfig {
    pub fn new() -> Self {
        NestdocConfig {
            inner: Arc::new(NestdocConfigInner::new()),
        }
    }

    /// Registers a model kind.
    ///
    /// # Errors
    ///
    /// [ErrorKind::InvalidOperation] if a schema with the same name exists or
    /// the configuration is already initialized.
    pub fn register_schema(&self, schema: ModelSchema) -> NestdocResult<()> {
        self.inner.register_schema(schema)
    }

    /// Sets the storage backend. Defaults to an in-memory store.
    pub fn set_store<T: StoreProvider + 'static>(&self, provider: T) -> NestdocResult<()> {
        self.inner.set_store(DocumentStore::new(provider))
    }

    /// Looks up a registered schema.
    ///
    /// # Errors
    ///
    /// [ErrorKind::SchemaNotFound] for an unknown model kind.
    pub fn schema(&self, name: &str) -> NestdocResult<Arc<ModelSchema>> {
        self.inner.schema(name)
    }

    pub fn schema_names(&self) -> Vec<String> {
        self.inner.schema_names()
    }

    pub fn store(&self) -> NestdocResult<DocumentStore> {
        self.inner.store()
    }

    pub fn is_configured(&self) -> bool {
        self.inner.configured.load(Ordering::Relaxed)
    }

    pub(crate) fn initialize(&self) -> NestdocResult<()> {
        self.inner.initialize()
    }

    pub fn close(&self) -> NestdocResult<()> {
        self.inner.close()
    }
}

struct NestdocConfigInner {
    configured: AtomicBool,
    schemas: DashMap<String, Arc<ModelSchema>>,
    store: OnceLock<DocumentStore>,
}

impl NestdocConfigInner {
    fn new() -> Self {
        NestdocConfigInner {
            configured: AtomicBool::new(false),
            schemas: DashMap::new(),
            store: OnceLock::new(),
        }
    }

    fn check_not_configured(&self, what: &str) -> NestdocResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            log::error!("Cannot change {} after initialization", what);
            return Err(NestdocError::new(
                &format!("Cannot change {} after initialization", what),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn register_schema(&self, schema: ModelSchema) -> NestdocResult<()> {
        self.check_not_configured("model schemas")?;
        let name = schema.name().to_string();
        match self.schemas.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                log::error!("Model schema {} is already registered", name);
                Err(NestdocError::new(
                    &format!("Model schema '{}' is already registered", name),
                    ErrorKind::InvalidOperation,
                ))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(Arc::new(schema));
                Ok(())
            }
        }
    }

    fn set_store(&self, store: DocumentStore) -> NestdocResult<()> {
        self.check_not_configured("the store")?;
        self.store.set(store).map_err(|_| {
            log::error!("Store is already set");
            NestdocError::new("Store is already set", ErrorKind::InvalidOperation)
        })
    }

    fn schema(&self, name: &str) -> NestdocResult<Arc<ModelSchema>> {
        match self.schemas.get(name) {
            Some(schema) => Ok(schema.value().clone()),
            None => {
                log::error!("Model schema {} is not registered", name);
                Err(NestdocError::new(
                    &format!("Model schema '{}' is not registered", name),
                    ErrorKind::SchemaNotFound,
                ))
            }
        }
    }

    fn schema_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn store(&self) -> NestdocResult<DocumentStore> {
        self.store.get().cloned().ok_or_else(|| {
            log::error!("Store is not initialized");
            NestdocError::new("Store is not initialized", ErrorKind::StoreNotInitialized)
        })
    }

    fn initialize(&self) -> NestdocResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            return Ok(());
        }

        let schemas: Vec<Arc<ModelSchema>> =
            self.schemas.iter().map(|e| e.value().clone()).collect();
        for schema in &schemas {
            schema.validate()?;
            for def in schema.relations() {
                if !self.schemas.contains_key(def.related()) {
                    log::error!(
                        "Relation {} of {} refers to unregistered {}",
                        def.name(),
                        schema.name(),
                        def.related()
                    );
                    return Err(NestdocError::new(
                        &format!(
                            "Relation '{}' of model '{}' refers to unregistered model '{}'",
                            def.name(),
                            schema.name(),
                            def.related()
                        ),
                        ErrorKind::SchemaNotFound,
                    ));
                }
            }
        }

        let store = self.store.get_or_init(DocumentStore::default).clone();
        for schema in &schemas {
            store.open_collection(schema.collection_name())?;
        }

        self.configured.store(true, Ordering::Relaxed);
        log::debug!("Initialized with {} model schemas", schemas.len());
        Ok(())
    }

    fn close(&self) -> NestdocResult<()> {
        match self.store.get() {
            Some(store) => store.close(),
            None => Ok(()),
        }
    }
}
