//! Storage boundary.
//!
//! The relation engine only needs a handful of primitives from its document
//! store: load a document by key, write a whole document, delete a document
//! and enumerate a collection. Those are captured by [StoreProvider]. The
//! crate ships [memory::InMemoryStore], which is the default backend and the
//! one used throughout the tests.
//!
//! Every write is reported to registered [StoreEventListener]s.

mod event;
pub mod memory;

pub use event::*;

use crate::collection::Document;
use crate::common::SubscriberRef;
use crate::errors::NestdocResult;
use std::fmt::Debug;
use std::ops::Deref;
use std::sync::Arc;

/// Contract for document storage backends.
///
/// Collections are created on first use. Keys are the string form of the
/// document identifier. Implementations must keep documents of a collection
/// in insertion order; overwriting an existing key keeps its position.
pub trait StoreProvider: Send + Sync {
    /// Makes sure the named collection exists.
    fn open_collection(&self, collection: &str) -> NestdocResult<()>;

    /// Loads a document by key. Returns `None` when absent.
    fn get(&self, collection: &str, key: &str) -> NestdocResult<Option<Document>>;

    /// Writes the whole document under the key, inserting or replacing.
    fn put(&self, collection: &str, key: &str, document: Document) -> NestdocResult<()>;

    /// Removes the document and returns it, if it was present.
    fn remove(&self, collection: &str, key: &str) -> NestdocResult<Option<Document>>;

    /// Returns every document of the collection in insertion order.
    fn values(&self, collection: &str) -> NestdocResult<Vec<Document>>;

    /// Removes every document of the collection.
    fn clear(&self, collection: &str) -> NestdocResult<()>;

    fn close(&self) -> NestdocResult<()>;

    fn is_closed(&self) -> NestdocResult<bool>;

    fn subscribe(&self, listener: StoreEventListener) -> NestdocResult<SubscriberRef>;

    fn unsubscribe(&self, subscriber: SubscriberRef) -> NestdocResult<()>;
}

/// Cloneable handle over a [StoreProvider] implementation.
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<dyn StoreProvider>,
}

impl DocumentStore {
    pub fn new<T: StoreProvider + 'static>(inner: T) -> Self {
        DocumentStore {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for DocumentStore {
    type Target = Arc<dyn StoreProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("closed", &self.inner.is_closed().unwrap_or(true))
            .finish()
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        DocumentStore::new(memory::InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::errors::{ErrorKind, NestdocError};

    struct ClosedStore;

    impl StoreProvider for ClosedStore {
        fn open_collection(&self, _collection: &str) -> NestdocResult<()> {
            Err(NestdocError::new("closed", ErrorKind::StoreAlreadyClosed))
        }

        fn get(&self, _collection: &str, _key: &str) -> NestdocResult<Option<Document>> {
            Err(NestdocError::new("closed", ErrorKind::StoreAlreadyClosed))
        }

        fn put(&self, _collection: &str, _key: &str, _document: Document) -> NestdocResult<()> {
            Err(NestdocError::new("closed", ErrorKind::StoreAlreadyClosed))
        }

        fn remove(&self, _collection: &str, _key: &str) -> NestdocResult<Option<Document>> {
            Err(NestdocError::new("closed", ErrorKind::StoreAlreadyClosed))
        }

        fn values(&self, _collection: &str) -> NestdocResult<Vec<Document>> {
            Ok(vec![])
        }

        fn clear(&self, _collection: &str) -> NestdocResult<()> {
            Ok(())
        }

        fn close(&self) -> NestdocResult<()> {
            Ok(())
        }

        fn is_closed(&self) -> NestdocResult<bool> {
            Ok(true)
        }

        fn subscribe(&self, _listener: StoreEventListener) -> NestdocResult<SubscriberRef> {
            Err(NestdocError::new("closed", ErrorKind::StoreAlreadyClosed))
        }

        fn unsubscribe(&self, _subscriber: SubscriberRef) -> NestdocResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_custom_provider_behind_handle() {
        let store = DocumentStore::new(ClosedStore);
        assert!(store.is_closed().unwrap());
        let err = store.put("users", "1", doc! { name: "x" }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::StoreAlreadyClosed);
        assert!(store.values("users").unwrap().is_empty());
    }

    #[test]
    fn test_default_is_in_memory() {
        let store = DocumentStore::default();
        assert!(!store.is_closed().unwrap());
        store.put("users", "1", doc! { name: "x" }).unwrap();
        assert_eq!(store.get("users", "1").unwrap(), Some(doc! { name: "x" }));
    }

    #[test]
    fn test_clones_share_provider() {
        let store = DocumentStore::default();
        let other = store.clone();
        store.put("users", "1", doc! { name: "x" }).unwrap();
        assert_eq!(other.values("users").unwrap().len(), 1);
    }

    #[test]
    fn test_debug_reports_closed_state() {
        let store = DocumentStore::default();
        assert_eq!(format!("{:?}", store), "DocumentStore { closed: false }");
        assert_eq!(
            format!("{:?}", DocumentStore::new(ClosedStore)),
            "DocumentStore { closed: true }"
        );
    }
}
