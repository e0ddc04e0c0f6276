use crate::collection::Document;
use crate::common::{atomic, Atomic, NestdocEventBus, ReadExecutor, SubscriberRef, WriteExecutor};
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use crate::store::{StoreEventInfo, StoreEventListener, StoreEvents, StoreProvider};
use dashmap::DashMap;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type DocumentMap = Atomic<IndexMap<String, Document>>;

/// In-memory document store.
///
/// Each collection is an insertion-ordered map guarded by its own lock, so
/// writes to different collections do not contend. All data is lost when the
/// store is dropped.
///
/// ```text
/// let store = InMemoryStore::new();
/// store.put("users", "1", doc!{ name: "John Doe" })?;
/// let user = store.get("users", "1")?;
/// ```
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<InMemoryStoreInner>,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore {
            inner: Arc::new(InMemoryStoreInner::new()),
        }
    }

    /// Number of documents held by the collection.
    pub fn size(&self, collection: &str) -> NestdocResult<usize> {
        self.inner.size(collection)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        InMemoryStore::new()
    }
}

impl StoreProvider for InMemoryStore {
    fn open_collection(&self, collection: &str) -> NestdocResult<()> {
        self.inner.open_collection(collection).map(|_| ())
    }

    fn get(&self, collection: &str, key: &str) -> NestdocResult<Option<Document>> {
        self.inner.get(collection, key)
    }

    fn put(&self, collection: &str, key: &str, document: Document) -> NestdocResult<()> {
        self.inner.put(collection, key, document)
    }

    fn remove(&self, collection: &str, key: &str) -> NestdocResult<Option<Document>> {
        self.inner.remove(collection, key)
    }

    fn values(&self, collection: &str) -> NestdocResult<Vec<Document>> {
        self.inner.values(collection)
    }

    fn clear(&self, collection: &str) -> NestdocResult<()> {
        self.inner.clear(collection)
    }

    fn close(&self) -> NestdocResult<()> {
        self.inner.close()
    }

    fn is_closed(&self) -> NestdocResult<bool> {
        Ok(self.inner.closed.load(Ordering::Relaxed))
    }

    fn subscribe(&self, listener: StoreEventListener) -> NestdocResult<SubscriberRef> {
        self.inner.check_opened()?;
        self.inner.event_bus.register(listener)
    }

    fn unsubscribe(&self, subscriber: SubscriberRef) -> NestdocResult<()> {
        self.inner.event_bus.deregister(subscriber)
    }
}

struct InMemoryStoreInner {
    closed: AtomicBool,
    collections: DashMap<String, DocumentMap>,
    event_bus: NestdocEventBus<StoreEventInfo, StoreEventListener>,
}

impl InMemoryStoreInner {
    fn new() -> InMemoryStoreInner {
        InMemoryStoreInner {
            closed: AtomicBool::new(false),
            collections: DashMap::new(),
            event_bus: NestdocEventBus::new(),
        }
    }

    fn check_opened(&self) -> NestdocResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            log::error!("In-memory store is already closed");
            return Err(NestdocError::new(
                "Store is already closed",
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }

    fn open_collection(&self, collection: &str) -> NestdocResult<DocumentMap> {
        self.check_opened()?;
        // clone the handle out so the shard lock is released before locking the map
        let map = self
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| atomic(IndexMap::new()))
            .value()
            .clone();
        Ok(map)
    }

    fn existing_collection(&self, collection: &str) -> NestdocResult<Option<DocumentMap>> {
        self.check_opened()?;
        Ok(self
            .collections
            .get(collection)
            .map(|entry| entry.value().clone()))
    }

    fn get(&self, collection: &str, key: &str) -> NestdocResult<Option<Document>> {
        match self.existing_collection(collection)? {
            Some(map) => Ok(map.read_with(|documents| documents.get(key).cloned())),
            None => Ok(None),
        }
    }

    fn put(&self, collection: &str, key: &str, document: Document) -> NestdocResult<()> {
        let map = self.open_collection(collection)?;
        let replaced = map.write_with(|documents| {
            documents
                .insert(key.to_string(), document.clone())
                .is_some()
        });

        let event = if replaced {
            StoreEvents::Update
        } else {
            StoreEvents::Insert
        };
        log::debug!("{:?} {} in collection {}", event, key, collection);
        self.alert(collection, Some(key), Some(document), event)
    }

    fn remove(&self, collection: &str, key: &str) -> NestdocResult<Option<Document>> {
        let map = match self.existing_collection(collection)? {
            Some(map) => map,
            None => return Ok(None),
        };

        let removed = map.write_with(|documents| documents.shift_remove(key));
        if removed.is_some() {
            log::debug!("Removed {} from collection {}", key, collection);
            self.alert(collection, Some(key), removed.clone(), StoreEvents::Remove)?;
        }
        Ok(removed)
    }

    fn values(&self, collection: &str) -> NestdocResult<Vec<Document>> {
        match self.existing_collection(collection)? {
            Some(map) => Ok(map.read_with(|documents| documents.values().cloned().collect())),
            None => Ok(vec![]),
        }
    }

    fn size(&self, collection: &str) -> NestdocResult<usize> {
        match self.existing_collection(collection)? {
            Some(map) => Ok(map.read_with(|documents| documents.len())),
            None => Ok(0),
        }
    }

    fn clear(&self, collection: &str) -> NestdocResult<()> {
        if let Some(map) = self.existing_collection(collection)? {
            map.write_with(|documents| documents.clear());
            log::debug!("Cleared collection {}", collection);
            self.alert(collection, None, None, StoreEvents::Clear)?;
        }
        Ok(())
    }

    fn close(&self) -> NestdocResult<()> {
        if self.closed.swap(true, Ordering::Relaxed) {
            return Ok(());
        }

        self.collections.clear();
        self.event_bus.close()
    }

    fn alert(
        &self,
        collection: &str,
        key: Option<&str>,
        item: Option<Document>,
        event: StoreEvents,
    ) -> NestdocResult<()> {
        if !self.event_bus.has_listeners() {
            return Ok(());
        }

        let info = StoreEventInfo::new(collection, key.map(|k| k.to_string()), item, event);
        self.event_bus.publish(info)
    }
}
