//! Maps declared field types to validator type tags.
//!
//! Field types reach the engine already extracted from source (by the derive macro or a
//! manifest) as a [`TypeRef`]: a primitive type name, an explicit `bsonType`, a reference
//! to another described class, or a single-element array literal.

use std::borrow::Cow;
use std::fmt;

use serde_json::Value;

use crate::errors::{MetadataError, Result};
use crate::schema::BsonType;
use crate::types::ClassId;

/// A field's declared type, as supplied by the annotation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// A primitive type name such as `String`, `f64` or `chrono::DateTime<Utc>`.
    Named(Cow<'static, str>),
    /// An explicit `bsonType`, bypassing name resolution.
    Bson(BsonType),
    /// Another described class.
    Class(ClassId),
    /// Array literal. Exactly one element type is allowed.
    Array(Vec<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn array_of(element: TypeRef) -> Self {
        TypeRef::Array(vec![element])
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::Bson(ty) => write!(f, "bson:{ty}"),
            TypeRef::Class(id) => write!(f, "class {id}"),
            TypeRef::Array(elements) => {
                f.write_str("[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Shape of a field after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldShape {
    Scalar(BsonType),
    Class(ClassId),
    Enumeration(Vec<Value>),
    ArrayOf(Box<FieldShape>),
}

impl FieldShape {
    /// The referenced class, looking through arrays.
    pub fn target_class(&self) -> Option<ClassId> {
        match self {
            FieldShape::Class(id) => Some(*id),
            FieldShape::ArrayOf(inner) => inner.target_class(),
            FieldShape::Scalar(_) | FieldShape::Enumeration(_) => None,
        }
    }
}

/// Looks up the primitive type tag for a type name.
///
/// Module paths and generic arguments are ignored, so `std::string::String` and
/// `chrono::DateTime<Utc>` resolve like `String` and `DateTime`.
pub fn primitive_for_name(name: &str) -> Option<BsonType> {
    let base = name.split('<').next().unwrap_or(name);
    let base = base.rsplit("::").next().unwrap_or(base).trim();
    let base = base.trim_start_matches('&');
    let ty = match base {
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64" | "u128" | "usize" | "f32"
        | "f64" | "Number" | "number" => BsonType::Number,
        "Decimal" | "Decimal128" => BsonType::Decimal,
        "bool" | "Boolean" => BsonType::Bool,
        "String" | "str" | "char" => BsonType::String,
        "DateTime" | "NaiveDateTime" | "NaiveDate" | "SystemTime" | "OffsetDateTime" | "Date" => BsonType::Date,
        "Binary" | "Bytes" | "Buffer" => BsonType::BinData,
        "ObjectId" | "Oid" => BsonType::ObjectId,
        "Object" | "Document" | "Map" | "HashMap" | "BTreeMap" => BsonType::Object,
        _ => return None,
    };
    Some(ty)
}

/// Resolves a scalar type reference to its primitive tag.
pub fn resolve_primitive(type_ref: &TypeRef) -> Result<BsonType> {
    match type_ref {
        TypeRef::Named(name) => primitive_for_name(name).ok_or_else(|| MetadataError::UnsupportedType {
            type_name: name.to_string(),
        }),
        TypeRef::Bson(ty) => Ok(*ty),
        TypeRef::Class(_) | TypeRef::Array(_) => Err(MetadataError::UnsupportedType {
            type_name: type_ref.to_string(),
        }),
    }
}

/// Whether the type refers to another described class, directly or as an array element.
pub fn is_class_reference(type_ref: &TypeRef) -> bool {
    match type_ref {
        TypeRef::Class(_) => true,
        TypeRef::Array(elements) => matches!(elements.as_slice(), [element] if is_class_reference(element)),
        TypeRef::Named(_) | TypeRef::Bson(_) => false,
    }
}

/// Classifies a field as scalar, class reference, enumeration, or array of one of those.
///
/// Enumerated values take precedence over the declared element type; an array type keeps
/// its array wrapper around the enumeration.
pub fn classify(field: &str, type_ref: &TypeRef, enum_values: Option<&[Value]>) -> Result<FieldShape> {
    if let TypeRef::Array(elements) = type_ref {
        let [element] = elements.as_slice() else {
            return Err(MetadataError::AmbiguousArrayType {
                field: field.to_string(),
                count: elements.len(),
            });
        };
        let inner = classify(field, element, enum_values)?;
        return Ok(FieldShape::ArrayOf(Box::new(inner)));
    }
    if let Some(values) = enum_values {
        return Ok(FieldShape::Enumeration(values.to_vec()));
    }
    match type_ref {
        TypeRef::Class(id) => Ok(FieldShape::Class(*id)),
        _ => resolve_primitive(type_ref).map(FieldShape::Scalar),
    }
}
