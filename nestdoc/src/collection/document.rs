use indexmap::IndexMap;
use itertools::Itertools;
use smallvec::SmallVec;

use crate::common::{Value, DOC_ID};
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt::{Debug, Display};

type FieldVec = SmallVec<[String; 8]>;

/// A document: an insertion-ordered map of field names to [Value]s.
///
/// Insertion order is preserved because it is the order fields appear in the
/// external representation of a model. Nested documents and arrays of
/// documents are plain values, which is how embedded sub-documents live
/// inside their parent.
///
/// The `_id` field holds the document identifier. It normally carries a
/// [crate::collection::ObjectId], although any non-empty string is accepted
/// as an explicit identifier.
///
/// Equality ignores field order; two documents with the same fields and
/// values are equal.
#[derive(Clone, Default)]
pub struct Document {
    data: IndexMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            data: IndexMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Associates the specified [Value] with the key. An existing key keeps
    /// its position and gets the new value; a new key is appended.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::InvalidFieldName] if the key is empty.
    ///
    /// ```ignore
    /// let mut doc = Document::new();
    /// doc.put("city", "London")?;
    /// doc.put("visited", 3)?;
    /// assert_eq!(doc.size(), 2);
    /// ```
    pub fn put<'a, T: Into<Value>>(
        &mut self,
        key: impl Into<Cow<'a, str>>,
        value: T,
    ) -> NestdocResult<()> {
        let key = key.into();
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(NestdocError::new(
                "Document does not support empty key",
                ErrorKind::InvalidFieldName,
            ));
        }

        self.data.insert(key.into_owned(), value.into());
        Ok(())
    }

    /// Returns the value for the key, or [Value::Null] if it is absent.
    pub fn get(&self, key: &str) -> Value {
        self.data.get(key).cloned().unwrap_or(Value::Null)
    }

    /// Returns a reference to the value for the key, if present.
    pub fn get_ref(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.data.get_mut(key)
    }

    /// Returns the raw `_id` value, if present and not null.
    pub fn id(&self) -> Option<&Value> {
        self.data.get(DOC_ID).filter(|v| !v.is_null())
    }

    pub fn has_id(&self) -> bool {
        self.id().is_some()
    }

    /// Removes the key, keeping the relative order of the remaining fields.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns the top-level field names in insertion order.
    pub fn fields(&self) -> FieldVec {
        self.data.keys().cloned().collect()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Copies every field of `other` into this document, overwriting
    /// existing keys.
    pub fn merge(&mut self, other: &Document) {
        for (key, value) in other.data.iter() {
            self.data.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub(crate) fn to_json(&self) -> String {
        format!(
            "{{{}}}",
            self.data
                .iter()
                .map(|(k, v)| format!("\"{}\": {}", k, v.to_json()))
                .join(", ")
        )
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for Document {}

impl PartialOrd for Document {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Document {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut left: Vec<_> = self.data.iter().collect();
        let mut right: Vec<_> = other.data.iter().collect();
        left.sort_by(|a, b| a.0.cmp(b.0));
        right.sort_by(|a, b| a.0.cmp(b.0));
        left.cmp(&right)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Document {
            data: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates a [Document] with JSON-like syntax.
///
/// ```rust
/// use nestdoc::doc;
///
/// let empty = doc!{};
/// let address = doc!{ city: "Paris", country: "France", visited: 4 };
/// let nested = doc!{
///     name: "John Doe",
///     tags: ["a", "b"],
///     father: { name: "Mark Doe" },
/// };
/// assert_eq!(address.size(), 3);
/// ```
#[macro_export]
macro_rules! doc {
    ({}) => {
        $crate::collection::Document::new()
    };

    () => {
        $crate::collection::Document::new()
    };

    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::doc!($($key : $value),*)
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::collection::Document::new();
            $(
                doc.put($crate::collection::normalize(stringify!($key)), $crate::doc_value!($value))
                .expect(&format!("Failed to put value {} in document", stringify!($value)));
            )*
            doc
        }
    };
}

/// Helper macro converting values for [doc!].
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
