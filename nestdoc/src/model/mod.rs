//! Model instances and their supporting types.
//!
//! A [Model] is either a top-level document or a sub-document embedded in
//! another model. [ModelSchema] declares a model kind and its embedded
//! relations, [ModelHooks] its lifecycle callbacks. [ModelCollection] is the
//! in-memory sequence returned by queries and embeds-many relations.

mod hooks;
#[allow(clippy::module_inception)]
mod model;
mod model_collection;
mod query;
mod schema;

pub use hooks::*;
pub use model::{Model, RelationValue};
pub(crate) use model::id_to_string;
pub use model_collection::*;
pub use query::*;
pub use schema::*;
