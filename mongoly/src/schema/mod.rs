//! # Document validation schemas
//!
//! [`SchemaNode`] is the serializable `$jsonSchema` fragment produced for a whole
//! document class or for a single field. It uses MongoDB's restricted vocabulary:
//! `bsonType` instead of `type`, no `$ref`, and draft-4 style boolean
//! `exclusiveMinimum`/`exclusiveMaximum`.
//!
//! ```
//! use mongoly::schema::{BsonType, SchemaNode, TypeSet};
//!
//! let mut node = SchemaNode::object();
//! node.properties.insert("name".into(), SchemaNode::typed(BsonType::String));
//! node.required.push("name".into());
//!
//! let json = serde_json::to_value(&node).unwrap();
//! assert_eq!(json["bsonType"], "object");
//! assert_eq!(json["properties"]["name"]["bsonType"], "string");
//! assert_eq!(node.bson_type, Some(TypeSet::Single(BsonType::Object)));
//! ```

pub mod fragment;
pub mod synthesis;

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::MetadataError;

/// Primitive type tags understood by the document validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BsonType {
    Number,
    Double,
    Int,
    Long,
    Decimal,
    Bool,
    String,
    Date,
    Timestamp,
    Object,
    Array,
    BinData,
    ObjectId,
    Null,
}

impl BsonType {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            BsonType::Number => "number",
            BsonType::Double => "double",
            BsonType::Int => "int",
            BsonType::Long => "long",
            BsonType::Decimal => "decimal",
            BsonType::Bool => "bool",
            BsonType::String => "string",
            BsonType::Date => "date",
            BsonType::Timestamp => "timestamp",
            BsonType::Object => "object",
            BsonType::Array => "array",
            BsonType::BinData => "binData",
            BsonType::ObjectId => "objectId",
            BsonType::Null => "null",
        }
    }

    /// Whether numeric bounds (`minimum`, `multipleOf`, ...) are meaningful for this type.
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            BsonType::Number | BsonType::Double | BsonType::Int | BsonType::Long | BsonType::Decimal
        )
    }
}

impl fmt::Display for BsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BsonType {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s {
            "number" => BsonType::Number,
            "double" => BsonType::Double,
            "int" => BsonType::Int,
            "long" => BsonType::Long,
            "decimal" => BsonType::Decimal,
            "bool" => BsonType::Bool,
            "string" => BsonType::String,
            "date" => BsonType::Date,
            "timestamp" => BsonType::Timestamp,
            "object" => BsonType::Object,
            "array" => BsonType::Array,
            "binData" => BsonType::BinData,
            "objectId" => BsonType::ObjectId,
            "null" => BsonType::Null,
            other => {
                return Err(MetadataError::UnsupportedType {
                    type_name: other.to_string(),
                });
            }
        };
        Ok(ty)
    }
}

/// A single `bsonType` or a list of alternatives (`["string", "null"]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSet {
    Single(BsonType),
    Many(Vec<BsonType>),
}

impl TypeSet {
    /// Appends the `null` marker. The primitive always stays first.
    pub fn nullable(self) -> Self {
        match self {
            TypeSet::Single(BsonType::Null) => TypeSet::Single(BsonType::Null),
            TypeSet::Single(ty) => TypeSet::Many(vec![ty, BsonType::Null]),
            TypeSet::Many(mut types) => {
                if !types.contains(&BsonType::Null) {
                    types.push(BsonType::Null);
                }
                TypeSet::Many(types)
            }
        }
    }

    pub fn contains(&self, ty: BsonType) -> bool {
        match self {
            TypeSet::Single(single) => *single == ty,
            TypeSet::Many(types) => types.contains(&ty),
        }
    }
}

impl From<BsonType> for TypeSet {
    fn from(ty: BsonType) -> Self {
        TypeSet::Single(ty)
    }
}

/// A composable `$jsonSchema` fragment for a document class or a single field.
///
/// `properties` keeps insertion order; it and `required` are omitted from the
/// serialized form when empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bson_type: Option<TypeSet>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, SchemaNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl SchemaNode {
    /// An empty `{ bsonType: "object" }` node.
    pub fn object() -> Self {
        Self::typed(BsonType::Object)
    }

    pub fn typed(ty: BsonType) -> Self {
        Self {
            bson_type: Some(TypeSet::Single(ty)),
            ..Self::default()
        }
    }

    pub fn enumeration(values: Vec<Value>) -> Self {
        Self {
            enum_values: Some(values),
            ..Self::default()
        }
    }

    pub fn array(items: SchemaNode) -> Self {
        Self {
            bson_type: Some(TypeSet::Single(BsonType::Array)),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    pub fn is_object(&self) -> bool {
        self.bson_type.as_ref().is_some_and(|ty| ty.contains(BsonType::Object))
    }

    /// Appends `null` to the node's type list, or to its enum values for enumerations.
    pub fn make_nullable(&mut self) {
        if let Some(values) = self.enum_values.as_mut() {
            if !values.contains(&Value::Null) {
                values.push(Value::Null);
            }
            return;
        }
        if let Some(ty) = self.bson_type.take() {
            self.bson_type = Some(ty.nullable());
        }
    }

    /// Wraps the node as a collection validator document: `{ "$jsonSchema": ... }`.
    pub fn to_validator(&self) -> serde_json::Result<Value> {
        let mut validator = Map::new();
        validator.insert("$jsonSchema".to_string(), serde_json::to_value(self)?);
        Ok(Value::Object(validator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nullable_appends_null_marker() {
        let ty = TypeSet::Single(BsonType::Number).nullable();
        assert_eq!(ty, TypeSet::Many(vec![BsonType::Number, BsonType::Null]));
        assert_eq!(ty.clone().nullable(), ty);
    }

    #[test]
    fn empty_collections_are_not_serialized() {
        let json = serde_json::to_value(SchemaNode::object()).unwrap();
        assert_eq!(json, json!({ "bsonType": "object" }));
    }

    #[test]
    fn nullable_enumeration_appends_null_value() {
        let mut node = SchemaNode::enumeration(vec![json!("M"), json!("F")]);
        node.make_nullable();
        assert_eq!(serde_json::to_value(&node).unwrap(), json!({ "enum": ["M", "F", null] }));
    }

    #[test]
    fn validator_wraps_schema() {
        let mut node = SchemaNode::object();
        node.properties.insert("flag".into(), SchemaNode::typed(BsonType::Bool));
        let validator = node.to_validator().unwrap();
        assert_eq!(
            validator,
            json!({ "$jsonSchema": { "bsonType": "object", "properties": { "flag": { "bsonType": "bool" } } } })
        );
    }

    #[test]
    fn parses_type_names() {
        assert_eq!("objectId".parse::<BsonType>().unwrap(), BsonType::ObjectId);
        assert!(matches!(
            "uuid".parse::<BsonType>(),
            Err(MetadataError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn deserializes_merge_fragments() {
        let node: SchemaNode = serde_json::from_value(json!({
            "bsonType": ["string", "null"],
            "maxLength": 10
        }))
        .unwrap();
        assert_eq!(node.bson_type, Some(TypeSet::Many(vec![BsonType::String, BsonType::Null])));
        assert_eq!(node.max_length, Some(10));
    }
}
