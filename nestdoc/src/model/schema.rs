use crate::common::DEFAULT_COLLECTION_SUFFIX;
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use crate::model::ModelHooks;
use indexmap::IndexMap;

/// Cardinality of an embedded relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    EmbedsMany,
    EmbedsOne,
}

/// Declaration of an embedded relation on a model kind.
///
/// `name` is how the relation is accessed and how it appears in the external
/// representation; `local_key` is the raw field of the parent document the
/// sub-documents are stored under. Both are the same unless declared with a
/// `*_with_key` builder method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    name: String,
    kind: RelationKind,
    related: String,
    local_key: String,
}

impl RelationDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Name of the model kind of the embedded sub-documents.
    pub fn related(&self) -> &str {
        &self.related
    }

    pub fn local_key(&self) -> &str {
        &self.local_key
    }
}

/// Describes a model kind: its storage collection, embedded relations,
/// default eager loads, timestamp handling and lifecycle hooks.
///
/// ```ignore
/// let user = ModelSchema::new("User")
///     .embeds_many_with_key("addresses", "Address", "_addresses")
///     .embeds_one("father", "User");
/// let address = ModelSchema::new("Address").embeds_many("addresses", "Address");
/// ```
#[derive(Debug, Clone)]
pub struct ModelSchema {
    name: String,
    collection: String,
    relations: IndexMap<String, RelationDef>,
    eager_load: Vec<String>,
    timestamps: bool,
    hooks: ModelHooks,
}

impl ModelSchema {
    pub fn new(name: &str) -> Self {
        ModelSchema {
            name: name.to_string(),
            collection: format!("{}{}", name.to_lowercase(), DEFAULT_COLLECTION_SUFFIX),
            relations: IndexMap::new(),
            eager_load: Vec::new(),
            timestamps: true,
            hooks: ModelHooks::default(),
        }
    }

    /// Overrides the storage collection used for top-level models.
    pub fn collection(mut self, collection: &str) -> Self {
        self.collection = collection.to_string();
        self
    }

    pub fn embeds_many(self, relation: &str, related: &str) -> Self {
        self.relation(relation, RelationKind::EmbedsMany, related, relation)
    }

    pub fn embeds_many_with_key(self, relation: &str, related: &str, local_key: &str) -> Self {
        self.relation(relation, RelationKind::EmbedsMany, related, local_key)
    }

    pub fn embeds_one(self, relation: &str, related: &str) -> Self {
        self.relation(relation, RelationKind::EmbedsOne, related, relation)
    }

    pub fn embeds_one_with_key(self, relation: &str, related: &str, local_key: &str) -> Self {
        self.relation(relation, RelationKind::EmbedsOne, related, local_key)
    }

    /// Materializes the relation whenever a model of this kind is loaded.
    pub fn eager_load(mut self, relation: &str) -> Self {
        if !self.eager_load.iter().any(|r| r == relation) {
            self.eager_load.push(relation.to_string());
        }
        self
    }

    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn hooks(mut self, hooks: ModelHooks) -> Self {
        self.hooks = hooks;
        self
    }

    fn relation(mut self, name: &str, kind: RelationKind, related: &str, local_key: &str) -> Self {
        self.relations.insert(
            name.to_string(),
            RelationDef {
                name: name.to_string(),
                kind,
                related: related.to_string(),
                local_key: local_key.to_string(),
            },
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn relations(&self) -> impl Iterator<Item = &RelationDef> {
        self.relations.values()
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Looks up a declared relation.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::RelationNotFound] if the relation is not declared.
    pub fn relation_def(&self, name: &str) -> NestdocResult<&RelationDef> {
        self.relations.get(name).ok_or_else(|| {
            log::error!("Relation {} is not declared on {}", name, self.name);
            NestdocError::new(
                &format!("Relation '{}' is not declared on model '{}'", name, self.name),
                ErrorKind::RelationNotFound,
            )
        })
    }

    /// Returns true if the raw field stores the data of a declared relation.
    pub fn is_relation_key(&self, field: &str) -> bool {
        self.relations.values().any(|r| r.local_key == field)
    }

    pub fn eager_loads(&self) -> &[String] {
        &self.eager_load
    }

    pub fn uses_timestamps(&self) -> bool {
        self.timestamps
    }

    pub fn default_hooks(&self) -> &ModelHooks {
        &self.hooks
    }

    /// Checks internal consistency: no empty names, no two relations sharing
    /// a raw key, and eager loads referring to declared relations.
    pub(crate) fn validate(&self) -> NestdocResult<()> {
        if self.name.is_empty() || self.collection.is_empty() {
            log::error!("Model schema name and collection cannot be empty");
            return Err(NestdocError::new(
                "Model schema name and collection cannot be empty",
                ErrorKind::InvalidOperation,
            ));
        }

        for (index, def) in self.relations.values().enumerate() {
            if def.name.is_empty() || def.local_key.is_empty() {
                log::error!("Relation with empty name or key on {}", self.name);
                return Err(NestdocError::new(
                    &format!("Relation with empty name or key on model '{}'", self.name),
                    ErrorKind::InvalidFieldName,
                ));
            }

            let shared = self
                .relations
                .values()
                .skip(index + 1)
                .find(|other| other.local_key == def.local_key);
            if let Some(other) = shared {
                log::error!(
                    "Relations {} and {} share the key {}",
                    def.name,
                    other.name,
                    def.local_key
                );
                return Err(NestdocError::new(
                    &format!(
                        "Relations '{}' and '{}' on model '{}' share the key '{}'",
                        def.name, other.name, self.name, def.local_key
                    ),
                    ErrorKind::InvalidFieldName,
                ));
            }
        }

        for relation in &self.eager_load {
            self.relation_def(relation)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_collection_name() {
        assert_eq!(ModelSchema::new("User").collection_name(), "users");
        assert_eq!(
            ModelSchema::new("User").collection("people").collection_name(),
            "people"
        );
    }

    #[test]
    fn test_relation_declarations() {
        let schema = ModelSchema::new("User")
            .embeds_many_with_key("addresses", "Address", "_addresses")
            .embeds_one("father", "User");

        let addresses = schema.relation_def("addresses").unwrap();
        assert_eq!(addresses.kind(), RelationKind::EmbedsMany);
        assert_eq!(addresses.related(), "Address");
        assert_eq!(addresses.local_key(), "_addresses");

        let father = schema.relation_def("father").unwrap();
        assert_eq!(father.kind(), RelationKind::EmbedsOne);
        assert_eq!(father.local_key(), "father");

        assert!(schema.is_relation_key("_addresses"));
        assert!(!schema.is_relation_key("addresses"));
        let names: Vec<_> = schema.relations().map(|r| r.name()).collect();
        assert_eq!(names, vec!["addresses", "father"]);
    }

    #[test]
    fn test_unknown_relation() {
        let schema = ModelSchema::new("User");
        let err = schema.relation_def("books").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::RelationNotFound);
        assert!(!schema.has_relation("books"));
    }

    #[test]
    fn test_eager_load_is_deduplicated() {
        let schema = ModelSchema::new("User")
            .embeds_many("addresses", "Address")
            .eager_load("addresses")
            .eager_load("addresses");
        assert_eq!(schema.eager_loads(), &["addresses".to_string()]);
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_undeclared_eager_load() {
        let schema = ModelSchema::new("User").eager_load("addresses");
        assert_eq!(
            schema.validate().unwrap_err().kind(),
            &ErrorKind::RelationNotFound
        );
    }

    #[test]
    fn test_validate_rejects_shared_keys() {
        let schema = ModelSchema::new("User")
            .embeds_many_with_key("home", "Address", "places")
            .embeds_one_with_key("work", "Address", "places");
        assert_eq!(
            schema.validate().unwrap_err().kind(),
            &ErrorKind::InvalidFieldName
        );
    }

    #[test]
    fn test_timestamps_flag() {
        assert!(ModelSchema::new("User").uses_timestamps());
        assert!(!ModelSchema::new("User").timestamps(false).uses_timestamps());
    }
}
