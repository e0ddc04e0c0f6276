use crate::collection::Document;
use crate::common::Value;
use crate::errors::NestdocResult;
use crate::model::Model;
use std::fmt::Debug;

/// An ordered, in-memory sequence of models.
///
/// Returned by top-level queries and by embedded relations alike. Filters and
/// sorts scan the loaded models and return new collections; the models
/// themselves are shared handles, so changing a model seen through a derived
/// collection changes it everywhere.
///
/// Field values are read with [Model::get], so `_id` compares by its string
/// form.
#[derive(Clone, Default)]
pub struct ModelCollection {
    items: Vec<Model>,
}

impl ModelCollection {
    pub fn new(items: Vec<Model>) -> Self {
        ModelCollection { items }
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<Model> {
        self.items.first().cloned()
    }

    pub fn last(&self) -> Option<Model> {
        self.items.last().cloned()
    }

    pub fn get(&self, index: usize) -> Option<Model> {
        self.items.get(index).cloned()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Model> {
        self.items.iter()
    }

    /// Models whose field equals the value.
    pub fn where_eq(&self, field: &str, value: impl Into<Value>) -> ModelCollection {
        let value = value.into();
        self.filter(|model| model.get(field) == value)
    }

    /// Models whose field differs from the value.
    pub fn where_ne(&self, field: &str, value: impl Into<Value>) -> ModelCollection {
        let value = value.into();
        self.filter(|model| model.get(field) != value)
    }

    /// Models whose field equals any of the values.
    pub fn where_in<V: Into<Value>>(
        &self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> ModelCollection {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.filter(|model| {
            let current = model.get(field);
            values.iter().any(|v| *v == current)
        })
    }

    /// Stable ascending sort by the natural order of the field values.
    pub fn sort_by(&self, field: &str) -> ModelCollection {
        let mut keyed: Vec<(Value, Model)> = self
            .items
            .iter()
            .map(|model| (model.get(field), model.clone()))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        ModelCollection::new(keyed.into_iter().map(|(_, model)| model).collect())
    }

    /// Stable descending sort; equal values keep their relative order.
    pub fn sort_by_desc(&self, field: &str) -> ModelCollection {
        let mut keyed: Vec<(Value, Model)> = self
            .items
            .iter()
            .map(|model| (model.get(field), model.clone()))
            .collect();
        keyed.sort_by(|a, b| b.0.cmp(&a.0));
        ModelCollection::new(keyed.into_iter().map(|(_, model)| model).collect())
    }

    /// Values of one field, in collection order. Missing fields yield
    /// [Value::Null].
    pub fn pluck(&self, field: &str) -> Vec<Value> {
        self.items.iter().map(|model| model.get(field)).collect()
    }

    /// String identifiers of the models that have one.
    pub fn ids(&self) -> Vec<String> {
        self.items.iter().filter_map(|model| model.id()).collect()
    }

    pub fn find(&self, id: &str) -> Option<Model> {
        self.items
            .iter()
            .find(|model| model.id().as_deref() == Some(id))
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Slices the collection into the 1-based `page` of `per_page` items.
    ///
    /// A zero `page` is read as the first page and a zero `per_page` as one
    /// item per page.
    pub fn paginate(&self, per_page: usize, page: usize) -> Paginator {
        let per_page = per_page.max(1);
        let page = page.max(1);
        let items = self
            .items
            .iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .cloned()
            .collect();
        Paginator::new(ModelCollection::new(items), self.items.len(), per_page, page)
    }

    /// External representations of every model, in order.
    pub fn to_documents(&self) -> NestdocResult<Vec<Document>> {
        self.items.iter().map(|model| model.to_document()).collect()
    }

    pub fn into_vec(self) -> Vec<Model> {
        self.items
    }

    fn filter(&self, predicate: impl Fn(&Model) -> bool) -> ModelCollection {
        ModelCollection::new(
            self.items
                .iter()
                .filter(|model| predicate(model))
                .cloned()
                .collect(),
        )
    }
}

impl From<Vec<Model>> for ModelCollection {
    fn from(items: Vec<Model>) -> Self {
        ModelCollection::new(items)
    }
}

impl FromIterator<Model> for ModelCollection {
    fn from_iter<I: IntoIterator<Item = Model>>(iter: I) -> Self {
        ModelCollection::new(iter.into_iter().collect())
    }
}

impl IntoIterator for ModelCollection {
    type Item = Model;
    type IntoIter = std::vec::IntoIter<Model>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ModelCollection {
    type Item = &'a Model;
    type IntoIter = std::slice::Iter<'a, Model>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Debug for ModelCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

/// One page of a [ModelCollection].
#[derive(Clone, Debug)]
pub struct Paginator {
    items: ModelCollection,
    total: usize,
    per_page: usize,
    current_page: usize,
}

impl Paginator {
    fn new(items: ModelCollection, total: usize, per_page: usize, current_page: usize) -> Self {
        Paginator {
            items,
            total,
            per_page,
            current_page,
        }
    }

    pub fn items(&self) -> &ModelCollection {
        &self.items
    }

    /// Number of models on this page.
    pub fn count(&self) -> usize {
        self.items.count()
    }

    /// Number of models in the whole paginated collection.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn last_page(&self) -> usize {
        self.total.div_ceil(self.per_page).max(1)
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::model::ModelSchema;
    use crate::Nestdoc;

    fn addresses() -> ModelCollection {
        let db = Nestdoc::builder()
            .register(ModelSchema::new("Address"))
            .open()
            .unwrap();
        vec![
            doc! { "_id": "a", city: "Paris", visited: 4 },
            doc! { "_id": "b", city: "Ghent", visited: 7 },
            doc! { "_id": "c", city: "Brussels", visited: 2 },
            doc! { "_id": "d", city: "Ghent", visited: 13 },
            doc! { "_id": "e", city: "Bruges", visited: 7 },
        ]
        .into_iter()
        .map(|attrs| db.make("Address", attrs).unwrap())
        .collect()
    }

    fn cities(collection: &ModelCollection) -> Vec<Value> {
        collection.pluck("city")
    }

    #[test]
    fn test_where_eq_and_ne() {
        let all = addresses();
        assert_eq!(all.where_eq("city", "Ghent").count(), 2);
        assert_eq!(all.where_eq("visited", 7).ids(), vec!["b", "e"]);
        assert_eq!(all.where_ne("city", "Ghent").count(), 3);
        assert!(all.where_eq("city", "Atlantis").is_empty());
    }

    #[test]
    fn test_where_in() {
        let all = addresses();
        let found = all.where_in("visited", vec![7, 13]);
        assert_eq!(found.ids(), vec!["b", "d", "e"]);
        let found = all.where_in("city", ["Paris", "Bruges"]);
        assert_eq!(cities(&found), vec![Value::from("Paris"), Value::from("Bruges")]);
        assert!(all.where_in("city", Vec::<&str>::new()).is_empty());
    }

    #[test]
    fn test_sort_by_is_stable() {
        let all = addresses();
        let sorted = all.sort_by("visited");
        assert_eq!(sorted.ids(), vec!["c", "a", "b", "e", "d"]);
        let sorted = all.sort_by("city");
        assert_eq!(
            cities(&sorted),
            vec![
                Value::from("Bruges"),
                Value::from("Brussels"),
                Value::from("Ghent"),
                Value::from("Ghent"),
                Value::from("Paris"),
            ]
        );
        assert_eq!(sorted.get(2).unwrap().id().unwrap(), "b");
    }

    #[test]
    fn test_sort_by_desc() {
        let sorted = addresses().sort_by_desc("visited");
        assert_eq!(sorted.ids(), vec!["d", "b", "e", "a", "c"]);
    }

    #[test]
    fn test_find_and_contains() {
        let all = addresses();
        assert_eq!(all.find("c").unwrap().get("city"), Value::from("Brussels"));
        assert!(all.contains("a"));
        assert!(!all.contains("123"));
        assert!(all.find("123").is_none());
    }

    #[test]
    fn test_first_last_get() {
        let all = addresses();
        assert_eq!(all.first().unwrap().id().unwrap(), "a");
        assert_eq!(all.last().unwrap().id().unwrap(), "e");
        assert!(all.get(10).is_none());
        assert!(ModelCollection::default().first().is_none());
    }

    #[test]
    fn test_paginate() {
        let all = addresses();
        let page = all.paginate(2, 1);
        assert_eq!(page.count(), 2);
        assert_eq!(page.total(), 5);
        assert_eq!(page.last_page(), 3);
        assert!(page.has_more_pages());
        assert_eq!(page.items().ids(), vec!["a", "b"]);

        let page = all.paginate(2, 3);
        assert_eq!(page.count(), 1);
        assert!(!page.has_more_pages());

        let page = all.paginate(2, 4);
        assert_eq!(page.count(), 0);
        assert_eq!(page.total(), 5);

        let page = all.paginate(0, 0);
        assert_eq!(page.per_page(), 1);
        assert_eq!(page.current_page(), 1);
    }

    #[test]
    fn test_paginate_empty() {
        let page = ModelCollection::default().paginate(10, 1);
        assert_eq!(page.total(), 0);
        assert_eq!(page.last_page(), 1);
        assert!(!page.has_more_pages());
    }

    #[test]
    fn test_to_documents() {
        let docs = addresses().where_eq("city", "Paris").to_documents().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get("city"), Value::from("Paris"));
        assert_eq!(docs[0].get("_id"), Value::from("a"));
    }
}
