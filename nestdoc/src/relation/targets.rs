use crate::collection::ObjectId;
use crate::common::Value;
use crate::model::{id_to_string, Model};

/// Something that designates an embedded model: its identifier or a handle.
///
/// Lets `destroy` and `dissociate` take identifiers, models or a mix of
/// both.
#[derive(Clone, Debug)]
pub enum EmbeddedRef {
    Id(String),
    Model(Model),
}

impl EmbeddedRef {
    /// The designated identifier. Empty identifiers designate nothing.
    pub fn id(&self) -> Option<String> {
        match self {
            EmbeddedRef::Id(id) if id.is_empty() => None,
            EmbeddedRef::Id(id) => Some(id.clone()),
            EmbeddedRef::Model(model) => model.id(),
        }
    }

    pub(crate) fn model(&self) -> Option<&Model> {
        match self {
            EmbeddedRef::Model(model) => Some(model),
            EmbeddedRef::Id(_) => None,
        }
    }
}

impl From<&str> for EmbeddedRef {
    fn from(value: &str) -> Self {
        EmbeddedRef::Id(value.to_string())
    }
}

impl From<String> for EmbeddedRef {
    fn from(value: String) -> Self {
        EmbeddedRef::Id(value)
    }
}

impl From<&String> for EmbeddedRef {
    fn from(value: &String) -> Self {
        EmbeddedRef::Id(value.clone())
    }
}

impl From<ObjectId> for EmbeddedRef {
    fn from(value: ObjectId) -> Self {
        EmbeddedRef::Id(value.to_hex())
    }
}

impl From<Value> for EmbeddedRef {
    fn from(value: Value) -> Self {
        EmbeddedRef::Id(id_to_string(&value).unwrap_or_default())
    }
}

impl From<&Value> for EmbeddedRef {
    fn from(value: &Value) -> Self {
        EmbeddedRef::Id(id_to_string(value).unwrap_or_default())
    }
}

impl From<Model> for EmbeddedRef {
    fn from(value: Model) -> Self {
        EmbeddedRef::Model(value)
    }
}

impl From<&Model> for EmbeddedRef {
    fn from(value: &Model) -> Self {
        EmbeddedRef::Model(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_from_strings() {
        assert_eq!(EmbeddedRef::from("abc").id(), Some("abc".to_string()));
        assert_eq!(EmbeddedRef::from(String::from("abc")).id(), Some("abc".to_string()));
        assert_eq!(EmbeddedRef::from("").id(), None);
    }

    #[test]
    fn test_ids_from_values() {
        let id = ObjectId::new();
        assert_eq!(EmbeddedRef::from(Value::ObjectId(id)).id(), Some(id.to_hex()));
        assert_eq!(EmbeddedRef::from(&Value::from("abc")).id(), Some("abc".to_string()));
        assert_eq!(EmbeddedRef::from(Value::Null).id(), None);
        assert_eq!(EmbeddedRef::from(Value::I32(3)).id(), None);
        assert_eq!(EmbeddedRef::from(id).id(), Some(id.to_hex()));
    }
}
