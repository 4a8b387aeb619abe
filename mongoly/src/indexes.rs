//! # Index derivation
//!
//! Walks a class's own fields in declaration order and emits one [`IndexSpec`] per
//! indexed field. Fields that reference another described class are descended into,
//! emitting that class's indexes under the dotted path of the host field
//! (`address.city`). Nested output follows the host field, depth-first.
//!
//! Two flags prune the walk:
//!
//! | flag                        | set on            | effect                                               |
//! |-----------------------------|-------------------|------------------------------------------------------|
//! | `exclude_sub_indexes`       | the host field    | do not descend into the referenced class             |
//! | `exclude_from_parent_index` | the nested field  | skip the field only when reached through a parent    |
//!
//! Only top-level derivations are cached: the same class nested under different prefixes
//! yields different paths.

use std::collections::HashMap;

use log::debug;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::errors::{MetadataError, Result};
use crate::registry::Registry;
use crate::types::{ClassId, FieldDescriptor, IndexDirection, IndexOptions};

/// The single `path -> direction` entry of an index key document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub path: String,
    pub direction: IndexDirection,
}

impl Serialize for IndexKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.path, &self.direction)?;
        map.end()
    }
}

/// A database index description for one field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSpec {
    pub key: IndexKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub unique: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub sparse: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_after_seconds: Option<u64>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl IndexSpec {
    pub fn new(path: impl Into<String>, direction: IndexDirection) -> Self {
        Self {
            key: IndexKey {
                path: path.into(),
                direction,
            },
            name: None,
            unique: false,
            sparse: false,
            expire_after_seconds: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }

    pub fn path(&self) -> &str {
        &self.key.path
    }

    pub fn direction(&self) -> IndexDirection {
        self.key.direction
    }

    fn from_options(path: String, prefix: &str, options: &IndexOptions) -> Self {
        // Nested copies of a named index get the host path in their name to stay unique.
        let name = options.name.as_ref().map(|name| {
            if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}_{}", prefix.replace('.', "_"), name)
            }
        });
        Self {
            key: IndexKey {
                path,
                direction: options.direction,
            },
            name,
            unique: options.unique,
            sparse: options.sparse,
            expire_after_seconds: options.expire_after_seconds,
        }
    }
}

/// Memoizing index walker over a [`Registry`].
#[derive(Debug, Default)]
pub struct IndexDeriver {
    cache: HashMap<ClassId, Vec<IndexSpec>>,
    walks: usize,
}

impl IndexDeriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes of `class` as a top-level collection.
    pub fn derive(&mut self, registry: &Registry, class: ClassId) -> Result<Vec<IndexSpec>> {
        self.derive_prefixed(registry, class, "")
    }

    /// Indexes of `class` embedded under `prefix`. Empty prefixes are cached.
    pub fn derive_prefixed(&mut self, registry: &Registry, class: ClassId, prefix: &str) -> Result<Vec<IndexSpec>> {
        if prefix.is_empty()
            && let Some(indexes) = self.cache.get(&class)
        {
            return Ok(indexes.clone());
        }

        let mut path = Vec::new();
        let mut indexes = Vec::new();
        self.walk(registry, class, prefix, &mut path, &mut indexes)?;

        if prefix.is_empty() {
            self.cache.insert(class, indexes.clone());
        }
        Ok(indexes)
    }

    /// Number of class visits since creation, cached derivations excluded.
    pub fn walks(&self) -> usize {
        self.walks
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    fn walk(
        &mut self,
        registry: &Registry,
        class: ClassId,
        prefix: &str,
        path: &mut Vec<ClassId>,
        out: &mut Vec<IndexSpec>,
    ) -> Result<()> {
        if !registry.contains(class) {
            return Err(MetadataError::UnknownClass { id: class.index() });
        }
        self.walks += 1;
        debug!("deriving indexes for `{}` at `{prefix}`", registry.class_name(class));

        path.push(class);
        let result = self.walk_fields(registry, class, prefix, path, out);
        path.pop();
        result
    }

    fn walk_fields(
        &mut self,
        registry: &Registry,
        class: ClassId,
        prefix: &str,
        path: &mut Vec<ClassId>,
        out: &mut Vec<IndexSpec>,
    ) -> Result<()> {
        for field in registry.fields_of(class) {
            let full_key = if prefix.is_empty() {
                field.key.clone()
            } else {
                format!("{prefix}.{}", field.key)
            };

            if let Some(index) = &field.options.index
                && (prefix.is_empty() || !field.options.exclude_from_parent_index)
            {
                out.push(IndexSpec::from_options(full_key.clone(), prefix, index));
            }

            if field.options.class_reference && !field.options.exclude_sub_indexes {
                let target = nested_target(registry, class, field)?;
                if path.contains(&target) {
                    return Err(MetadataError::CircularReference {
                        class: registry.class_name(target),
                        field: full_key,
                    });
                }
                self.walk(registry, target, &full_key, path, out)?;
            }
        }
        Ok(())
    }
}

fn nested_target(registry: &Registry, class: ClassId, field: &FieldDescriptor) -> Result<ClassId> {
    field
        .target
        .filter(|target| registry.contains(*target))
        .ok_or_else(|| MetadataError::MissingTypeReference {
            class: registry.class_name(class),
            field: field.key.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaNode;
    use crate::types::FieldOptions;
    use serde_json::json;

    fn indexed(key: &str, index: IndexOptions) -> FieldDescriptor {
        FieldDescriptor::new(
            key,
            SchemaNode::default(),
            FieldOptions {
                index: Some(index),
                ..FieldOptions::default()
            },
        )
    }

    fn reference(key: &str, target: ClassId) -> FieldDescriptor {
        FieldDescriptor {
            target: Some(target),
            ..FieldDescriptor::new(
                key,
                SchemaNode::object(),
                FieldOptions {
                    class_reference: true,
                    ..FieldOptions::default()
                },
            )
        }
    }

    fn nested_registry() -> (Registry, ClassId, ClassId) {
        let mut registry = Registry::new();
        let sub = registry.declare("Sub");
        let top = registry.declare("Top");
        registry.record_field(sub, indexed("name", IndexOptions::default()));
        registry.record_field(
            top,
            indexed(
                "id",
                IndexOptions {
                    unique: true,
                    ..IndexOptions::default()
                },
            ),
        );
        registry.record_field(top, reference("ref", sub));
        (registry, sub, top)
    }

    #[test]
    fn nested_paths_follow_declaration_order() {
        let (registry, _, top) = nested_registry();
        let indexes = IndexDeriver::new().derive(&registry, top).unwrap();
        assert_eq!(
            indexes,
            vec![
                IndexSpec::new("id", IndexDirection::Ascending).unique(),
                IndexSpec::new("ref.name", IndexDirection::Ascending),
            ]
        );
    }

    #[test]
    fn exclude_sub_indexes_prunes_the_branch() {
        let (mut registry, sub, _) = nested_registry();
        let host = registry.declare("Host");
        let mut field = reference("ref", sub);
        field.options.exclude_sub_indexes = true;
        registry.record_field(host, field);

        assert!(IndexDeriver::new().derive(&registry, host).unwrap().is_empty());
    }

    #[test]
    fn exclude_from_parent_index_only_applies_when_nested() {
        let mut registry = Registry::new();
        let sub = registry.declare("Sub");
        let top = registry.declare("Top");
        let mut name = indexed("name", IndexOptions::default());
        name.options.exclude_from_parent_index = true;
        registry.record_field(sub, name);
        registry.record_field(sub, indexed("code", IndexOptions::new(IndexDirection::Descending)));
        registry.record_field(top, reference("ref", sub));

        let mut deriver = IndexDeriver::new();
        let nested = deriver.derive(&registry, top).unwrap();
        assert_eq!(nested, vec![IndexSpec::new("ref.code", IndexDirection::Descending)]);

        let direct = deriver.derive(&registry, sub).unwrap();
        let paths: Vec<_> = direct.iter().map(IndexSpec::path).collect();
        assert_eq!(paths, ["name", "code"]);
    }

    #[test]
    fn indexed_references_also_recurse() {
        let mut registry = Registry::new();
        let point = registry.declare("Point");
        let place = registry.declare("Place");
        registry.record_field(point, indexed("label", IndexOptions::new(IndexDirection::Text)));
        let mut location = reference("location", point);
        location.options.index = Some(IndexOptions::new(IndexDirection::Geo2dSphere));
        registry.record_field(place, location);

        let indexes = IndexDeriver::new().derive(&registry, place).unwrap();
        assert_eq!(
            serde_json::to_value(&indexes).unwrap(),
            json!([
                { "key": { "location": "2dsphere" } },
                { "key": { "location.label": "text" } }
            ])
        );
    }

    #[test]
    fn ttl_and_sparse_are_serialized() {
        let mut registry = Registry::new();
        let session = registry.declare("Session");
        registry.record_field(
            session,
            indexed(
                "expires_at",
                IndexOptions {
                    sparse: true,
                    expire_after_seconds: Some(3600),
                    name: Some("session_ttl".into()),
                    ..IndexOptions::default()
                },
            ),
        );
        let indexes = IndexDeriver::new().derive(&registry, session).unwrap();
        assert_eq!(
            serde_json::to_value(&indexes).unwrap(),
            json!([{
                "key": { "expires_at": 1 },
                "name": "session_ttl",
                "sparse": true,
                "expireAfterSeconds": 3600
            }])
        );
    }

    #[test]
    fn nested_index_names_are_prefixed() {
        let mut registry = Registry::new();
        let sub = registry.declare("Sub");
        let top = registry.declare("Top");
        registry.record_field(
            sub,
            indexed(
                "slug",
                IndexOptions {
                    name: Some("slug_idx".into()),
                    ..IndexOptions::default()
                },
            ),
        );
        registry.record_field(top, reference("meta", sub));
        let indexes = IndexDeriver::new().derive(&registry, top).unwrap();
        assert_eq!(indexes[0].name.as_deref(), Some("meta_slug_idx"));
    }

    #[test]
    fn missing_target_is_fatal() {
        let mut registry = Registry::new();
        let top = registry.declare("Top");
        let mut field = reference("ref", ClassId::new(0, 42));
        field.target = None;
        registry.record_field(top, field);

        let err = IndexDeriver::new().derive(&registry, top).unwrap_err();
        assert_eq!(
            err,
            MetadataError::MissingTypeReference {
                class: "Top".into(),
                field: "ref".into()
            }
        );
    }

    #[test]
    fn self_references_are_cycles() {
        let mut registry = Registry::new();
        let node = registry.declare("Node");
        registry.record_field(node, reference("next", node));
        let err = IndexDeriver::new().derive(&registry, node).unwrap_err();
        assert_eq!(
            err,
            MetadataError::CircularReference {
                class: "Node".into(),
                field: "next".into()
            }
        );
    }

    #[test]
    fn top_level_results_are_cached() {
        let (registry, sub, top) = nested_registry();
        let mut deriver = IndexDeriver::new();
        deriver.derive(&registry, top).unwrap();
        assert_eq!(deriver.walks(), 2);
        deriver.derive(&registry, top).unwrap();
        assert_eq!(deriver.walks(), 2);

        let prefixed = deriver.derive_prefixed(&registry, sub, "outer").unwrap();
        assert_eq!(prefixed[0].path(), "outer.name");
        deriver.derive_prefixed(&registry, sub, "outer").unwrap();
        assert_eq!(deriver.walks(), 4);
    }
}
