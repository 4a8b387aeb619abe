//! Declarative document manifests.
//!
//! A manifest describes documents without Rust types, for tooling and for projects that
//! keep their collection layout in configuration:
//!
//! ```toml
//! [[document]]
//! name = "Address"
//!
//! [[document.field]]
//! name = "city"
//! type = "String"
//! index = true
//!
//! [[document]]
//! name = "Owner"
//! collection = "owners"
//!
//! [[document.field]]
//! name = "email"
//! type = "String"
//! required = true
//! index = { direction = "asc", unique = true }
//!
//! [[document.field]]
//! name = "addresses"
//! type = ["Address"]
//! max_items = 3
//! ```
//!
//! A `type` naming another document in the same manifest is a class reference; a list
//! is the single-element array literal. Documents may appear in any order.

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::catalog::Catalog;
use crate::collection::{CollectionOptions, CollectionPlan};
use crate::errors::{ManifestError, MetadataError};
use crate::resolver::TypeRef;
use crate::schema::{BsonType, SchemaNode};
use crate::types::{ArrayBounds, ClassDescriptor, ClassId, FieldSpec, IndexDirection, IndexOptions, SchemaBounds};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default, rename = "document")]
    pub documents: Vec<DocumentManifest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentManifest {
    pub name: String,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub drop_old_indexes: Option<bool>,
    #[serde(default)]
    pub omit: Option<Vec<String>>,
    #[serde(default)]
    pub pick: Option<Vec<String>>,
    #[serde(default)]
    pub rename: IndexMap<String, String>,
    #[serde(default)]
    pub merge_with: Vec<SchemaNode>,
    #[serde(default, rename = "field")]
    pub fields: Vec<FieldManifest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldManifest {
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_name: Option<TypeName>,
    #[serde(default)]
    pub bson_type: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "enum")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub exclusive_minimum: bool,
    #[serde(default)]
    pub maximum: Option<f64>,
    #[serde(default)]
    pub exclusive_maximum: bool,
    #[serde(default)]
    pub multiple_of: Option<f64>,
    #[serde(default)]
    pub min_length: Option<u64>,
    #[serde(default)]
    pub max_length: Option<u64>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub min_items: Option<u64>,
    #[serde(default)]
    pub max_items: Option<u64>,
    #[serde(default)]
    pub unique_items: bool,
    #[serde(default)]
    pub index: Option<IndexManifest>,
    #[serde(default)]
    pub exclude_from_parent_index: bool,
    #[serde(default)]
    pub exclude_sub_indexes: bool,
}

/// `"String"` or `["String"]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TypeName {
    One(String),
    Many(Vec<String>),
}

/// `index = true`, `index = "desc"` or `index = { direction = "text", ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IndexManifest {
    Flag(bool),
    Kind(String),
    Detailed(IndexDetails),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexDetails {
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub sparse: bool,
    #[serde(default)]
    pub expire_after_seconds: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

impl IndexManifest {
    fn to_options(&self) -> Result<Option<IndexOptions>, MetadataError> {
        match self {
            IndexManifest::Flag(false) => Ok(None),
            IndexManifest::Flag(true) => Ok(Some(IndexOptions::default())),
            IndexManifest::Kind(kind) => Ok(Some(IndexOptions::new(kind.parse()?))),
            IndexManifest::Detailed(details) => {
                let direction = match &details.direction {
                    Some(direction) => direction.parse()?,
                    None => IndexDirection::Ascending,
                };
                Ok(Some(IndexOptions {
                    direction,
                    unique: details.unique,
                    sparse: details.sparse,
                    expire_after_seconds: details.expire_after_seconds,
                    name: details.name.clone(),
                }))
            }
        }
    }
}

impl Manifest {
    pub fn from_toml_str(source: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Reads a manifest, choosing JSON for `.json` files and TOML otherwise.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let source = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&source),
            _ => Self::from_toml_str(&source),
        }
    }

    /// Describes every document into a fresh catalog.
    pub fn build(&self, defaults: &CollectionOptions) -> Result<LoadedManifest, ManifestError> {
        let mut documents: IndexMap<&str, &DocumentManifest> = IndexMap::new();
        for document in &self.documents {
            if documents.insert(document.name.as_str(), document).is_some() {
                return Err(ManifestError::DuplicateDocument {
                    name: document.name.clone(),
                });
            }
        }

        let mut builder = Builder {
            documents: &documents,
            catalog: Catalog::new(),
            built: HashMap::new(),
            in_progress: Vec::new(),
        };
        for name in documents.keys() {
            builder.resolve(name)?;
        }

        let Builder { catalog, built, .. } = builder;
        let mut loaded = IndexMap::new();
        for (name, document) in &documents {
            let options = CollectionOptions {
                collection_name: document.collection.clone(),
                naming: defaults.naming,
                drop_old_indexes: document.drop_old_indexes.unwrap_or(defaults.drop_old_indexes),
            };
            loaded.insert(
                name.to_string(),
                LoadedDocument {
                    class: built[*name],
                    options,
                },
            );
        }
        Ok(LoadedManifest {
            catalog,
            documents: loaded,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub class: ClassId,
    pub options: CollectionOptions,
}

/// A catalog built from a manifest, with document names in manifest order.
#[derive(Debug)]
pub struct LoadedManifest {
    pub catalog: Catalog,
    pub documents: IndexMap<String, LoadedDocument>,
}

impl LoadedManifest {
    pub fn class(&self, name: &str) -> Option<ClassId> {
        self.documents.get(name).map(|document| document.class)
    }

    pub fn plan(&mut self, name: &str) -> Result<Option<CollectionPlan>, MetadataError> {
        let Some(document) = self.documents.get(name) else {
            return Ok(None);
        };
        self.catalog.plan(document.class, &document.options).map(Some)
    }

    pub fn plans(&mut self) -> Result<Vec<CollectionPlan>, MetadataError> {
        let mut plans = Vec::with_capacity(self.documents.len());
        for document in self.documents.values() {
            plans.push(self.catalog.plan(document.class, &document.options)?);
        }
        Ok(plans)
    }
}

struct Builder<'m> {
    documents: &'m IndexMap<&'m str, &'m DocumentManifest>,
    catalog: Catalog,
    built: HashMap<String, ClassId>,
    in_progress: Vec<String>,
}

impl<'m> Builder<'m> {
    fn resolve(&mut self, name: &str) -> Result<ClassId, ManifestError> {
        if let Some(id) = self.built.get(name) {
            return Ok(*id);
        }
        if self.in_progress.iter().any(|pending| pending == name) {
            return Err(ManifestError::CircularDocument { name: name.to_string() });
        }
        let document = *self.documents.get(name).ok_or_else(|| ManifestError::UnknownDocument {
            document: self.in_progress.last().cloned().unwrap_or_default(),
            name: name.to_string(),
        })?;

        self.in_progress.push(name.to_string());
        let result = self.build_document(document);
        self.in_progress.pop();

        let id = result?;
        self.built.insert(name.to_string(), id);
        Ok(id)
    }

    fn build_document(&mut self, document: &DocumentManifest) -> Result<ClassId, ManifestError> {
        debug!("building manifest document `{}`", document.name);
        let parent = match &document.extends {
            Some(parent) => Some(self.resolve(parent)?),
            None => None,
        };
        for field in &document.fields {
            for dependency in self.document_references(field) {
                self.resolve(dependency)?;
            }
        }

        let class = self.catalog.declare(document.name.clone());
        self.catalog.record_class(
            class,
            ClassDescriptor {
                parent,
                merge_sources: document.merge_with.clone(),
                omit: document.omit.clone(),
                pick: document.pick.clone(),
                rename: document.rename.clone(),
            },
        );
        for field in &document.fields {
            let spec = self.field_spec(document, field)?;
            self.catalog.define_field(class, spec)?;
        }
        self.catalog.seal(class);
        Ok(class)
    }

    fn document_references<'f>(&self, field: &'f FieldManifest) -> Vec<&'f str> {
        let names: Vec<&str> = match &field.type_name {
            Some(TypeName::One(name)) => vec![name.as_str()],
            Some(TypeName::Many(names)) => names.iter().map(String::as_str).collect(),
            None => Vec::new(),
        };
        names.into_iter().filter(|name| self.documents.contains_key(name)).collect()
    }

    fn type_ref(&self, name: &str, bson_type: Option<BsonType>) -> TypeRef {
        if let Some(id) = self.built.get(name) {
            return TypeRef::Class(*id);
        }
        match bson_type {
            Some(ty) => TypeRef::Bson(ty),
            None => TypeRef::named(name.to_string()),
        }
    }

    fn field_spec(&self, document: &DocumentManifest, field: &FieldManifest) -> Result<FieldSpec, ManifestError> {
        let bson_type = field.bson_type.as_deref().map(str::parse::<BsonType>).transpose()?;
        let type_ref = match (&field.type_name, bson_type) {
            (Some(TypeName::One(name)), _) => self.type_ref(name, bson_type),
            (Some(TypeName::Many(names)), _) => {
                TypeRef::Array(names.iter().map(|name| self.type_ref(name, bson_type)).collect())
            }
            (None, Some(ty)) => TypeRef::Bson(ty),
            (None, None) => {
                return Err(ManifestError::InvalidField {
                    document: document.name.clone(),
                    field: field.name.clone(),
                    message: "either `type` or `bson_type` is required".to_string(),
                });
            }
        };

        let mut spec = FieldSpec::new(field.name.clone(), type_ref);
        spec.enum_values = field.enum_values.clone();
        let options = &mut spec.options;
        options.required = field.required;
        options.nullable = field.nullable;
        options.description = field.description.clone();
        options.bounds = SchemaBounds {
            minimum: field.minimum,
            exclusive_minimum: field.exclusive_minimum,
            maximum: field.maximum,
            exclusive_maximum: field.exclusive_maximum,
            multiple_of: field.multiple_of,
            min_length: field.min_length,
            max_length: field.max_length,
            pattern: field.pattern.clone(),
        };
        options.array = ArrayBounds {
            min_items: field.min_items,
            max_items: field.max_items,
            unique_items: field.unique_items,
        };
        options.index = match &field.index {
            Some(index) => index.to_options()?,
            None => None,
        };
        options.exclude_from_parent_index = field.exclude_from_parent_index;
        options.exclude_sub_indexes = field.exclude_sub_indexes;
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const OWNERS: &str = r#"
[[document]]
name = "Owner"
extends = "Entity"

[[document.field]]
name = "email"
type = "String"
required = true
index = { unique = true }

[[document.field]]
name = "addresses"
type = ["Address"]
max_items = 3

[[document]]
name = "Entity"

[[document.field]]
name = "created_at"
type = "DateTime"
required = true
index = "desc"

[[document]]
name = "Address"

[[document.field]]
name = "city"
type = "String"
index = true

[[document.field]]
name = "kind"
type = "String"
enum = ["home", "work"]
nullable = true
"#;

    #[test]
    fn builds_documents_out_of_order() {
        let manifest = Manifest::from_toml_str(OWNERS).unwrap();
        let mut loaded = manifest.build(&CollectionOptions::default()).unwrap();
        let owner = loaded.class("Owner").unwrap();

        let schema = loaded.catalog.synthesize(owner).unwrap();
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({
                "bsonType": "object",
                "properties": {
                    "created_at": { "bsonType": "date" },
                    "email": { "bsonType": "string" },
                    "addresses": {
                        "bsonType": "array",
                        "maxItems": 3,
                        "items": {
                            "bsonType": "object",
                            "properties": {
                                "city": { "bsonType": "string" },
                                "kind": { "enum": ["home", "work", null] }
                            }
                        }
                    }
                },
                "required": ["created_at", "email"]
            })
        );

        let indexes = loaded.catalog.derive_indexes(owner).unwrap();
        assert_eq!(
            serde_json::to_value(&indexes).unwrap(),
            json!([
                { "key": { "email": 1 }, "unique": true },
                { "key": { "addresses.city": 1 } }
            ])
        );
    }

    #[test]
    fn plans_follow_manifest_order() {
        let manifest = Manifest::from_toml_str(OWNERS).unwrap();
        let mut loaded = manifest.build(&CollectionOptions::default()).unwrap();
        let names: Vec<_> = loaded.plans().unwrap().into_iter().map(|plan| plan.collection_name).collect();
        assert_eq!(names, ["owners", "entities", "addresses"]);
        assert!(loaded.plan("Missing").unwrap().is_none());
    }

    #[test]
    fn self_referencing_documents_fail() {
        let source = r#"
[[document]]
name = "Node"

[[document.field]]
name = "next"
type = "Node"
"#;
        let err = Manifest::from_toml_str(source)
            .unwrap()
            .build(&CollectionOptions::default())
            .unwrap_err();
        assert!(matches!(err, ManifestError::CircularDocument { name } if name == "Node"));
    }

    #[test]
    fn duplicate_and_unknown_documents() {
        let duplicate = r#"
[[document]]
name = "A"

[[document]]
name = "A"
"#;
        let err = Manifest::from_toml_str(duplicate)
            .unwrap()
            .build(&CollectionOptions::default())
            .unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateDocument { .. }));

        let unknown = r#"
[[document]]
name = "A"
extends = "Missing"
"#;
        let err = Manifest::from_toml_str(unknown)
            .unwrap()
            .build(&CollectionOptions::default())
            .unwrap_err();
        assert!(matches!(err, ManifestError::UnknownDocument { document, name } if document == "A" && name == "Missing"));
    }

    #[test]
    fn json_manifests_and_bson_overrides() {
        let source = json!({
            "document": [{
                "name": "Counter",
                "field": [
                    { "name": "value", "bson_type": "long", "required": true },
                    { "name": "samples", "type": ["f64"], "bson_type": "double" }
                ]
            }]
        })
        .to_string();
        let mut loaded = Manifest::from_json_str(&source)
            .unwrap()
            .build(&CollectionOptions::default())
            .unwrap();
        let counter = loaded.class("Counter").unwrap();
        let schema = loaded.catalog.synthesize(counter).unwrap();
        assert_eq!(
            serde_json::to_value(&schema.properties).unwrap(),
            json!({
                "value": { "bsonType": "long" },
                "samples": { "bsonType": "array", "items": { "bsonType": "double" } }
            })
        );
    }

    #[test]
    fn fields_need_a_type() {
        let source = r#"
[[document]]
name = "A"

[[document.field]]
name = "mystery"
"#;
        let err = Manifest::from_toml_str(source)
            .unwrap()
            .build(&CollectionOptions::default())
            .unwrap_err();
        assert!(matches!(err, ManifestError::InvalidField { field, .. } if field == "mystery"));
    }

    #[test]
    fn configuration_errors_surface_as_metadata_errors() {
        let source = r#"
[[document]]
name = "A"

[[document.field]]
name = "tags"
type = ["String", "u8"]
"#;
        let err = Manifest::from_toml_str(source)
            .unwrap()
            .build(&CollectionOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ManifestError::Metadata(MetadataError::AmbiguousArrayType { count: 2, .. })
        ));
    }
}
