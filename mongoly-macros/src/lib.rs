use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod parsed;

use parsed::{ParsedDocument, ParsedEnumeration};

/// Describes a struct's fields to a `mongoly::Catalog`.
///
/// ```text
/// #[derive(Document)]
/// #[mongoly(extends = Entity, collection = "felines", rename(nick = "nickname"))]
/// struct Cat {
///     #[mongoly(required, indexed, unique)]
///     name: String,
///     #[mongoly(min = 0, max = 40)]
///     age: Option<u32>,
///     #[mongoly(class, exclude_sub_indexes)]
///     owner: Owner,
///     #[mongoly(enumeration, max_items = 3)]
///     colors: Vec<Color>,
/// }
/// ```
///
/// Generates the `Document` impl and registers the type with `inventory` so
/// `Catalog::from_registered()` picks it up.
#[proc_macro_derive(Document, attributes(mongoly))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match ParsedDocument::from_input(&input) {
        Ok(parsed) => parsed.emit().into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Implements `Enumeration` for a fieldless enum, one string value per variant.
///
/// Variant names are used verbatim unless overridden with `#[mongoly(value = "..")]`.
#[proc_macro_derive(Enumeration, attributes(mongoly))]
pub fn derive_enumeration(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match ParsedEnumeration::from_input(&input) {
        Ok(parsed) => parsed.emit().into(),
        Err(err) => err.to_compile_error().into(),
    }
}
