//! Document auto-registration via inventory crate.
//!
//! `#[derive(Document)]` implements [`Document`] and submits a [`DocumentRegistration`],
//! so [`Catalog::from_registered`](crate::Catalog::from_registered) can describe every
//! document type linked into the binary without listing them by hand.

use serde_json::Value;

use crate::catalog::Catalog;
use crate::collection::CollectionOptions;
use crate::errors::Result;
use crate::types::ClassId;

/// A Rust type whose fields are described to a [`Catalog`].
///
/// Usually derived. `describe` must be idempotent: when the type is already known to
/// the catalog it returns the existing id without recording anything.
pub trait Document: 'static {
    /// Document name used for display and default collection naming.
    const NAME: &'static str;

    fn describe(catalog: &mut Catalog) -> Result<ClassId>;

    fn collection_options() -> CollectionOptions {
        CollectionOptions::default()
    }
}

/// Supplies the allowed values of an enumerated field.
///
/// ```
/// use mongoly::Enumeration;
/// use serde_json::{Value, json};
///
/// enum Gender {
///     Male,
///     Female,
/// }
///
/// impl Enumeration for Gender {
///     fn values() -> Vec<Value> {
///         vec![json!("M"), json!("F")]
///     }
/// }
///
/// assert_eq!(Gender::values().len(), 2);
/// ```
pub trait Enumeration {
    fn values() -> Vec<Value>;
}

/// Metadata for auto-discovered document types.
pub struct DocumentRegistration {
    /// The name of the document type (e.g., "Cat")
    pub type_name: &'static str,
    /// Describes the type to a catalog
    pub describe: fn(&mut Catalog) -> Result<ClassId>,
    /// Collection options declared on the type
    pub collection_options: fn() -> CollectionOptions,
}

inventory::collect!(DocumentRegistration);

/// All document types registered through the derive macro.
pub fn registered_documents() -> impl Iterator<Item = &'static DocumentRegistration> {
    inventory::iter::<DocumentRegistration>()
}

/// Get a registered document by type name.
pub fn find_registered(type_name: &str) -> Option<&'static DocumentRegistration> {
    registered_documents().find(|registration| registration.type_name == type_name)
}
