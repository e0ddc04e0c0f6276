use crate::collection::Document;
use crate::common::{Value, DOC_ID};
use crate::errors::NestdocResult;
use crate::model::{id_to_string, Model, ModelCollection, ModelSchema, RelationDef, RelationKind, RelationValue};
use crate::relation::EmbeddedRecords;
use std::sync::Arc;

/// Builds the value of a relation from the parent's raw data.
///
/// This is the only place raw sub-documents become [Model] handles, for
/// eager loads, lazy access and external representation alike. It never
/// writes to the parent's raw attributes or registry. Each handle is wired
/// to the parent and gets its own kind's eager relations.
pub(crate) fn materialize(parent: &Model, def: &RelationDef) -> NestdocResult<RelationValue> {
    rebuild(parent, def, &[])
}

/// Rebuilds the registered value of a relation after its raw data changed.
///
/// Handles in `keep` and handles already registered are reused for records
/// with the same identifier, so models the caller holds stay the ones the
/// parent sees.
pub(crate) fn refresh(parent: &Model, def: &RelationDef, keep: &[Model]) -> NestdocResult<()> {
    let mut known = keep.to_vec();
    if let Some(previous) = parent.relation_value(def.name()) {
        known.extend(previous.models());
    }

    let value = rebuild(parent, def, &known)?;
    parent.set_relation(def.name(), value);
    Ok(())
}

fn rebuild(parent: &Model, def: &RelationDef, known: &[Model]) -> NestdocResult<RelationValue> {
    let related = parent.db().schema(def.related())?;
    let raw = parent.raw_attribute(def.local_key()).unwrap_or(Value::Null);

    match def.kind() {
        RelationKind::EmbedsMany => {
            let records = EmbeddedRecords::from_value(&raw, def.name());
            let mut models = Vec::with_capacity(records.len());
            for record in records.iter() {
                models.push(embed(parent, def, &related, record, known)?);
            }
            Ok(RelationValue::Many(ModelCollection::new(models)))
        }
        RelationKind::EmbedsOne => match &raw {
            Value::Document(record) => Ok(RelationValue::One(Some(embed(
                parent, def, &related, record, known,
            )?))),
            _ => Ok(RelationValue::One(None)),
        },
    }
}

fn embed(
    parent: &Model,
    def: &RelationDef,
    related: &Arc<ModelSchema>,
    record: &Document,
    known: &[Model],
) -> NestdocResult<Model> {
    if let Some(id) = record.get_ref(DOC_ID).and_then(id_to_string) {
        if let Some(model) = known.iter().find(|m| m.id().as_deref() == Some(id.as_str())) {
            return Ok(model.clone());
        }
    }

    let model = Model::from_raw(parent.db(), related.clone(), record.clone());
    model.set_parent(parent, def.name());
    model.load_eager(&[])?;
    Ok(model)
}
