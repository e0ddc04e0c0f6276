use crate::common::NESTDOC_EVENT;
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use basu::error::BasuError;
use basu::event::Event;
use basu::{EventBus, Handle, HandlerId};
use std::marker::PhantomData;
use std::sync::Arc;

/// Publishes events of type `E` to listeners of type `L`.
///
/// Clones share the same underlying bus. Publishing with no registered
/// listener returns immediately without building an event.
#[derive(Clone)]
pub struct NestdocEventBus<E, L> {
    inner: Arc<NestdocEventBusInner<E, L>>,
}

impl<E, L> Default for NestdocEventBus<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, L> NestdocEventBus<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    pub fn new() -> Self {
        NestdocEventBus {
            inner: Arc::new(NestdocEventBusInner::new()),
        }
    }

    pub fn register(&self, listener: L) -> NestdocResult<SubscriberRef> {
        self.inner.register(listener)
    }

    pub fn deregister(&self, subscriber: SubscriberRef) -> NestdocResult<()> {
        self.inner.deregister(subscriber)
    }

    pub fn publish(&self, event: E) -> NestdocResult<()> {
        self.inner.publish(event)
    }

    /// Removes every registered listener.
    pub fn close(&self) -> NestdocResult<()> {
        self.inner.close()
    }

    pub fn has_listeners(&self) -> bool {
        self.inner.has_listeners()
    }
}

/// Handle returned on registration, used to deregister a listener.
pub struct SubscriberRef {
    pub(crate) inner: HandlerId,
}

impl SubscriberRef {
    pub fn new(inner: HandlerId) -> Self {
        SubscriberRef { inner }
    }
}

struct NestdocEventBusInner<E, L> {
    event_bus: EventBus<E>,
    phantom_data: PhantomData<L>,
}

impl<E, L> NestdocEventBusInner<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    fn new() -> Self {
        NestdocEventBusInner {
            event_bus: EventBus::new(),
            phantom_data: PhantomData,
        }
    }

    fn register(&self, listener: L) -> NestdocResult<SubscriberRef> {
        self.event_bus
            .subscribe(NESTDOC_EVENT, Box::new(listener))
            .map(SubscriberRef::new)
            .map_err(Self::event_error)
    }

    fn deregister(&self, subscriber: SubscriberRef) -> NestdocResult<()> {
        self.event_bus
            .unsubscribe(NESTDOC_EVENT, &subscriber.inner)
            .map_err(Self::event_error)
    }

    fn publish(&self, event: E) -> NestdocResult<()> {
        let handler_count = match self.event_bus.get_handler_count(NESTDOC_EVENT) {
            Ok(count) => count,
            Err(BasuError::EventTypeNotFOUND) => return Ok(()),
            Err(e) => return Err(Self::event_error(e)),
        };

        if handler_count == 0 {
            return Ok(());
        }

        let basu_event = Event::new(event);
        self.event_bus
            .publish(NESTDOC_EVENT, &basu_event)
            .map_err(Self::event_error)
    }

    fn close(&self) -> NestdocResult<()> {
        self.event_bus.clear().map_err(Self::event_error)
    }

    fn has_listeners(&self) -> bool {
        match self.event_bus.get_handler_count(NESTDOC_EVENT) {
            Ok(count) => count > 0,
            Err(BasuError::EventTypeNotFOUND) => false,
            Err(e) => {
                log::warn!("Failed to check listeners: {}, defaulting to false", e);
                false
            }
        }
    }

    fn event_error(e: BasuError) -> NestdocError {
        match e {
            BasuError::EventTypeNotFOUND => NestdocError::new(
                "Event bus error: no handler registered for the event type",
                ErrorKind::EventError,
            ),
            BasuError::MutexPoisoned => NestdocError::new(
                "Event bus error: internal mutex poisoned",
                ErrorKind::EventError,
            ),
            BasuError::HandlerError(e) => {
                let message = e
                    .source()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| e.to_string());
                NestdocError::new(
                    &format!("Event handler error: {}", message),
                    ErrorKind::EventError,
                )
            }
        }
    }
}
