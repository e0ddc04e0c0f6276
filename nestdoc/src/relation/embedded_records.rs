use crate::collection::Document;
use crate::common::{Value, DOC_ID};
use crate::model::id_to_string;

/// The raw sub-documents of an embedded relation.
///
/// Reads the value stored under a relation's local key (an array of
/// documents, a single document or nothing) and keeps the documents in their
/// stored order. Identity is the string form of `_id`.
#[derive(Clone, Debug, Default)]
pub(crate) struct EmbeddedRecords {
    records: Vec<Document>,
}

impl EmbeddedRecords {
    /// Reads raw relation data. Entries that are not documents are dropped
    /// with a warning, as are values of any other shape.
    pub(crate) fn from_value(value: &Value, relation: &str) -> Self {
        let records = match value {
            Value::Null => Vec::new(),
            Value::Document(document) => vec![document.clone()],
            Value::Array(values) => values
                .iter()
                .filter_map(|value| match value {
                    Value::Document(document) => Some(document.clone()),
                    other => {
                        log::warn!("Skipping non-document entry {} in {}", other, relation);
                        None
                    }
                })
                .collect(),
            other => {
                log::warn!("Ignoring non-document data {} stored for {}", other, relation);
                Vec::new()
            }
        };

        let records = EmbeddedRecords { records };
        records.warn_duplicates(relation);
        records
    }

    fn warn_duplicates(&self, relation: &str) {
        let ids = self.ids();
        for (index, id) in ids.iter().enumerate() {
            if ids[..index].contains(id) {
                log::warn!("Duplicate embedded id {} in {}", id, relation);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Document> {
        self.records.iter()
    }

    pub(crate) fn first(&self) -> Option<&Document> {
        self.records.first()
    }

    pub(crate) fn ids(&self) -> Vec<String> {
        self.records.iter().filter_map(record_id).collect()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|record| record_id(record).as_deref() == Some(id))
    }

    pub(crate) fn find(&self, id: &str) -> Option<&Document> {
        self.position(id).map(|index| &self.records[index])
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Replaces the record with the same identifier in place, or appends.
    /// Returns true when a record was replaced.
    pub(crate) fn upsert(&mut self, record: Document) -> bool {
        let existing = record_id(&record).and_then(|id| self.position(&id));
        match existing {
            Some(index) => {
                self.records[index] = record;
                true
            }
            None => {
                self.records.push(record);
                false
            }
        }
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Document> {
        self.position(id).map(|index| self.records.remove(index))
    }

    /// The raw form of an embeds-many relation.
    pub(crate) fn into_value(self) -> Value {
        Value::Array(self.records.into_iter().map(Value::Document).collect())
    }
}

fn record_id(record: &Document) -> Option<String> {
    record.get_ref(DOC_ID).and_then(id_to_string)
}
