//! Mongoly core library.
//!
//! Turns per-field and per-class annotations into MongoDB `$jsonSchema` validators and
//! index descriptions. Field descriptors are recorded once, at definition time, into a
//! [`Catalog`]; schemas and indexes are synthesized from them on demand and memoized.
//!
//! ```
//! use mongoly::{Catalog, ClassDescriptor, FieldSpec, IndexDirection, TypeRef};
//!
//! let mut catalog = Catalog::new();
//! let address = catalog
//!     .define_class(
//!         "Address",
//!         ClassDescriptor::new(),
//!         [FieldSpec::new("city", TypeRef::named("String")).indexed(IndexDirection::Ascending)],
//!     )
//!     .unwrap();
//! let owner = catalog
//!     .define_class(
//!         "Owner",
//!         ClassDescriptor::new(),
//!         [FieldSpec::new("address", TypeRef::Class(address)).required()],
//!     )
//!     .unwrap();
//!
//! let indexes = catalog.derive_indexes(owner).unwrap();
//! assert_eq!(indexes[0].path(), "address.city");
//! ```

extern crate self as mongoly;

pub mod catalog;
pub mod collection;
pub mod errors;
pub mod indexes;
pub mod manifest;
pub mod registration;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod types;

pub use catalog::{Catalog, SynthesisStats};
pub use collection::{ApplyCollection, CollectionNaming, CollectionOptions, CollectionPlan};
pub use errors::*;
pub use indexes::{IndexKey, IndexSpec};
pub use manifest::{LoadedManifest, Manifest};
pub use registration::{Document, DocumentRegistration, Enumeration};
pub use registry::Registry;
pub use resolver::TypeRef;
pub use schema::{BsonType, SchemaNode, TypeSet};
pub use types::{
    ArrayBounds, ClassDescriptor, ClassId, FieldDescriptor, FieldOptions, FieldSpec, IndexDirection, IndexOptions,
    SchemaBounds,
};

pub use mongoly_macros::{Document, Enumeration};

// Re-exported for code generated by the derive macros
pub use inventory;
pub use serde_json;
