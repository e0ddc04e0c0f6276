#![allow(
    dead_code,
    unused_imports,
)]
//! # Nestdoc - Embedded Document Relations
//!
//! Nestdoc models documents that carry other documents inside them. A parent
//! model declares named relations; each relation stores sub-documents in a
//! field of the parent, either as an array (embeds-many) or as a single
//! document (embeds-one). Sub-documents behave like models of their own:
//! they have identifiers, dirty tracking, timestamps and lifecycle hooks,
//! and they can embed further documents.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nestdoc::doc;
//! use nestdoc::model::ModelSchema;
//! use nestdoc::Nestdoc;
//!
//! let db = Nestdoc::builder()
//!     .register(
//!         ModelSchema::new("User")
//!             .embeds_many("addresses", "Address")
//!             .embeds_one("father", "User"),
//!     )
//!     .register(ModelSchema::new("Address").timestamps(true))
//!     .open()?;
//!
//! let user = db.create("User", doc! { name: "John Doe" })?;
//! let addresses = user.embeds_many("addresses")?;
//! addresses.create(doc! { city: "Paris" })?;
//! addresses.create(doc! { city: "New York" })?;
//!
//! let user = db.find("User", &user.id().unwrap())?.unwrap();
//! assert_eq!(user.many("addresses")?.count(), 2);
//! ```
//!
//! ## Module Organization
//!
//! - [`collection`] - Documents and object identifiers
//! - [`common`] - Values, constants, event bus and helpers
//! - [`errors`] - Error types and result definitions
//! - [`model`] - Models, schemas, hooks, queries and model collections
//! - [`relation`] - Embeds-many and embeds-one relations
//! - [`store`] - Storage backend abstraction and the in-memory store
//! - [`nestdoc`] - Database entry point
//! - [`nestdoc_builder`] - Builder used to open a database
//! - [`nestdoc_config`] - Registered schemas and store

use crate::collection::ObjectIdGenerator;
use once_cell::sync::Lazy;

pub mod collection;
pub mod common;
pub mod errors;
pub mod model;
pub mod nestdoc;
pub mod nestdoc_builder;
pub mod nestdoc_config;
pub mod relation;
pub mod store;

pub use crate::nestdoc::Nestdoc;
pub use crate::nestdoc_builder::NestdocBuilder;
pub use crate::nestdoc_config::NestdocConfig;

pub(crate) static ID_GENERATOR: Lazy<ObjectIdGenerator> = Lazy::new(ObjectIdGenerator::new);
