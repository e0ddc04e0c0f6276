use crate::collection::Document;
use crate::common::get_current_time_or_zero;
use crate::errors::NestdocResult;
use anyhow::Error;
use basu::error::BasuError;
use basu::event::Event;
use basu::Handle;
use std::fmt::Debug;
use std::sync::Arc;

/// Write operations a store reports to its listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvents {
    Insert,
    Update,
    Remove,
    Clear,
}

/// A single write observed by the store.
///
/// `key` is `None` for [StoreEvents::Clear]; `item` carries the written
/// document for inserts and updates and the removed one for removals.
#[derive(Clone)]
pub struct StoreEventInfo {
    inner: Arc<StoreEventInner>,
}

struct StoreEventInner {
    collection: String,
    key: Option<String>,
    item: Option<Document>,
    event_type: StoreEvents,
    timestamp: u128,
}

impl StoreEventInfo {
    pub fn new(
        collection: &str,
        key: Option<String>,
        item: Option<Document>,
        event_type: StoreEvents,
    ) -> Self {
        StoreEventInfo {
            inner: Arc::new(StoreEventInner {
                collection: collection.to_string(),
                key,
                item,
                event_type,
                timestamp: get_current_time_or_zero(),
            }),
        }
    }

    pub fn collection(&self) -> &str {
        &self.inner.collection
    }

    pub fn key(&self) -> Option<&str> {
        self.inner.key.as_deref()
    }

    pub fn item(&self) -> Option<Document> {
        self.inner.item.clone()
    }

    pub fn event_type(&self) -> StoreEvents {
        self.inner.event_type
    }

    /// Milliseconds since the Unix epoch at which the event was created.
    pub fn timestamp(&self) -> u128 {
        self.inner.timestamp
    }
}

impl Debug for StoreEventInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreEventInfo")
            .field("collection", &self.collection())
            .field("key", &self.key())
            .field("event_type", &self.event_type())
            .field("timestamp", &self.timestamp())
            .finish()
    }
}

pub trait StoreEventCallback: Send + Sync + Fn(StoreEventInfo) -> NestdocResult<()> {}

impl<F> StoreEventCallback for F where F: Send + Sync + Fn(StoreEventInfo) -> NestdocResult<()> {}

/// Closure-backed listener for [StoreEventInfo]s.
///
/// ```ignore
/// db.subscribe(StoreEventListener::new(|event| {
///     log::info!("{:?} on {}", event.event_type(), event.collection());
///     Ok(())
/// }))?;
/// ```
#[derive(Clone)]
pub struct StoreEventListener {
    on_event: Arc<dyn StoreEventCallback>,
}

impl StoreEventListener {
    pub fn new(on_event: impl StoreEventCallback + 'static) -> Self {
        StoreEventListener {
            on_event: Arc::new(on_event),
        }
    }
}

impl Handle<StoreEventInfo> for StoreEventListener {
    fn handle(&self, event: &Event<StoreEventInfo>) -> Result<(), BasuError> {
        (self.on_event)(event.data.clone()).map_err(|e| BasuError::HandlerError(Error::from(e)))
    }
}

impl Debug for StoreEventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreEventListener").finish()
    }
}
