use crate::errors::NestdocResult;
use crate::model::Model;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Lifecycle events a model goes through while being written or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    Saving,
    Creating,
    Updating,
    Deleting,
    Created,
    Updated,
    Saved,
    Deleted,
}

impl ModelEvent {
    /// Returns true for the events whose callbacks can veto the operation.
    pub fn is_before(&self) -> bool {
        matches!(
            self,
            ModelEvent::Saving | ModelEvent::Creating | ModelEvent::Updating | ModelEvent::Deleting
        )
    }
}

pub trait BeforeHook: Send + Sync + Fn(&Model) -> NestdocResult<bool> {}

impl<F> BeforeHook for F where F: Send + Sync + Fn(&Model) -> NestdocResult<bool> {}

pub trait AfterHook: Send + Sync + Fn(&Model) -> NestdocResult<()> {}

impl<F> AfterHook for F where F: Send + Sync + Fn(&Model) -> NestdocResult<()> {}

/// Lifecycle callbacks for one model kind.
///
/// A set of hooks is plain configuration: a [crate::model::ModelSchema]
/// carries its defaults and a relation handle can be given a different set
/// with `with_hooks`. Callbacks registered for the same event run in
/// registration order.
///
/// Before-callbacks (`saving`, `creating`, `updating`, `deleting`) return
/// `Ok(false)` to veto; the remaining callbacks of that event are skipped and
/// the operation stops for that model. An `Err` from any callback aborts the
/// operation and is returned to the caller.
///
/// ```ignore
/// let hooks = ModelHooks::new()
///     .creating(|address| Ok(address.get("city") != val!("Atlantis")))
///     .saved(|address| {
///         log::info!("saved {:?}", address.id());
///         Ok(())
///     });
/// ```
#[derive(Clone, Default)]
pub struct ModelHooks {
    before: HashMap<ModelEvent, Vec<Arc<dyn BeforeHook>>>,
    after: HashMap<ModelEvent, Vec<Arc<dyn AfterHook>>>,
}

impl ModelHooks {
    pub fn new() -> Self {
        ModelHooks::default()
    }

    pub fn saving(self, hook: impl BeforeHook + 'static) -> Self {
        self.before_hook(ModelEvent::Saving, hook)
    }

    pub fn creating(self, hook: impl BeforeHook + 'static) -> Self {
        self.before_hook(ModelEvent::Creating, hook)
    }

    pub fn updating(self, hook: impl BeforeHook + 'static) -> Self {
        self.before_hook(ModelEvent::Updating, hook)
    }

    pub fn deleting(self, hook: impl BeforeHook + 'static) -> Self {
        self.before_hook(ModelEvent::Deleting, hook)
    }

    pub fn created(self, hook: impl AfterHook + 'static) -> Self {
        self.after_hook(ModelEvent::Created, hook)
    }

    pub fn updated(self, hook: impl AfterHook + 'static) -> Self {
        self.after_hook(ModelEvent::Updated, hook)
    }

    pub fn saved(self, hook: impl AfterHook + 'static) -> Self {
        self.after_hook(ModelEvent::Saved, hook)
    }

    pub fn deleted(self, hook: impl AfterHook + 'static) -> Self {
        self.after_hook(ModelEvent::Deleted, hook)
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }

    fn before_hook(mut self, event: ModelEvent, hook: impl BeforeHook + 'static) -> Self {
        self.before.entry(event).or_default().push(Arc::new(hook));
        self
    }

    fn after_hook(mut self, event: ModelEvent, hook: impl AfterHook + 'static) -> Self {
        self.after.entry(event).or_default().push(Arc::new(hook));
        self
    }

    /// Runs the callbacks of a before-event. Returns `Ok(false)` as soon as
    /// one of them vetoes.
    pub(crate) fn fire_before(&self, event: ModelEvent, model: &Model) -> NestdocResult<bool> {
        if let Some(hooks) = self.before.get(&event) {
            for hook in hooks {
                if !hook(model)? {
                    log::debug!("{:?} vetoed for {}", event, model.kind());
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    pub(crate) fn fire_after(&self, event: ModelEvent, model: &Model) -> NestdocResult<()> {
        if let Some(hooks) = self.after.get(&event) {
            for hook in hooks {
                hook(model)?;
            }
        }
        Ok(())
    }
}

impl Debug for ModelHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut events: Vec<_> = self
            .before
            .keys()
            .chain(self.after.keys())
            .map(|e| format!("{:?}", e))
            .collect();
        events.sort();
        f.debug_struct("ModelHooks").field("events", &events).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_phases() {
        assert!(ModelEvent::Saving.is_before());
        assert!(ModelEvent::Deleting.is_before());
        assert!(!ModelEvent::Saved.is_before());
        assert!(!ModelEvent::Deleted.is_before());
    }

    #[test]
    fn test_empty_hooks() {
        let hooks = ModelHooks::new();
        assert!(hooks.is_empty());
        assert!(format!("{:?}", hooks).contains("ModelHooks"));
    }

    #[test]
    fn test_registration_is_per_event() {
        let hooks = ModelHooks::new()
            .saving(|_| Ok(true))
            .saving(|_| Ok(false))
            .created(|_| Ok(()));
        assert!(!hooks.is_empty());
        assert_eq!(hooks.before.get(&ModelEvent::Saving).map(|h| h.len()), Some(2));
        assert_eq!(hooks.after.get(&ModelEvent::Created).map(|h| h.len()), Some(1));
        assert!(hooks.before.get(&ModelEvent::Creating).is_none());
    }

    #[test]
    fn test_clone_shares_callbacks() {
        let hooks = ModelHooks::new().deleting(|_| Ok(true));
        let cloned = hooks.clone().deleted(|_| Ok(()));
        assert!(hooks.after.is_empty());
        assert_eq!(cloned.before.get(&ModelEvent::Deleting).map(|h| h.len()), Some(1));
    }
}
