//! Embedded relations.
//!
//! An embedded relation stores sub-documents inside a field of the parent
//! document: an array for [EmbedsMany], a single document for [EmbedsOne].
//! Sub-documents have their own identity, timestamps and lifecycle hooks but
//! no storage location of their own; writing one means writing the parent.
//!
//! Relations nest. When the parent is itself embedded, persisting it means
//! saving it through its own relation, up to the top-level document.

mod eager;
mod embedded_records;
mod embeds_many;
mod embeds_one;
mod targets;

pub(crate) use eager::*;
pub(crate) use embedded_records::EmbeddedRecords;
pub use embeds_many::*;
pub use embeds_one::*;
pub use targets::*;

use crate::errors::NestdocResult;
use crate::model::{Model, RelationDef};

/// Writes the raw data of one relation of `parent` to storage.
///
/// An embedded parent is saved through its own relation. A top-level parent
/// that was never stored is saved whole; otherwise the stored document is
/// read, the relation field replaced (or removed when the parent no longer
/// has it) and the document written back.
///
/// Returns `Ok(false)` when a hook vetoed saving the parent. Nothing reached
/// storage then, and the caller has to put the relation back.
pub(crate) fn persist_parent(parent: &Model, def: &RelationDef) -> NestdocResult<bool> {
    if parent.is_embedded() || !parent.exists() || parent.id().is_none() {
        let saved = parent.save()?;
        if !saved {
            log::debug!(
                "Saving {} was vetoed, {} not persisted",
                parent.kind(),
                def.name()
            );
        }
        return Ok(saved);
    }

    let key = parent.required_id()?;
    let schema = parent.schema();
    let store = parent.db().store();
    let collection = schema.collection_name();

    let mut document = match store.get(collection, &key)? {
        Some(document) => document,
        None => parent.raw_attributes(),
    };
    match parent.raw_attribute(def.local_key()) {
        Some(value) => document.put(def.local_key(), value)?,
        None => {
            document.remove(def.local_key());
        }
    }

    store.put(collection, &key, document)?;
    parent.sync_original_field(def.local_key())?;
    log::debug!(
        "Persisted {} of {} {}",
        def.name(),
        schema.name(),
        key
    );
    Ok(true)
}
