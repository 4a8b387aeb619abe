//! Builds the object schema of a described class.
//!
//! Construction order for a class:
//!
//! 1. own fields, in declaration order (`required` follows the same order);
//! 2. the parent's schema, built recursively. Parent `required` entries come first and
//!    child properties replace parent properties of the same name;
//! 3. merge sources, which only fill in names that are still missing;
//! 4. `pick` / `omit`;
//! 5. `rename`, which skips names that are not present.
//!
//! Results are cached per class, so a class referenced from many places is built once.

use std::collections::HashMap;

use indexmap::IndexMap;
use log::debug;

use super::SchemaNode;
use crate::errors::{MetadataError, Result};
use crate::registry::Registry;
use crate::types::{ClassDescriptor, ClassId};

/// Memoizing schema builder over a [`Registry`].
#[derive(Debug, Default)]
pub struct SchemaSynthesizer {
    cache: HashMap<ClassId, SchemaNode>,
    builds: usize,
}

impl SchemaSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the schema of `class`, building and caching it on first use.
    pub fn synthesize(&mut self, registry: &Registry, class: ClassId) -> Result<SchemaNode> {
        let mut lineage = Vec::new();
        self.build(registry, class, &mut lineage)
    }

    pub fn cached(&self, class: ClassId) -> Option<&SchemaNode> {
        self.cache.get(&class)
    }

    /// Number of cache misses since creation.
    pub fn builds(&self) -> usize {
        self.builds
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    fn build(&mut self, registry: &Registry, class: ClassId, lineage: &mut Vec<ClassId>) -> Result<SchemaNode> {
        if let Some(node) = self.cache.get(&class) {
            return Ok(node.clone());
        }
        if !registry.contains(class) {
            return Err(MetadataError::UnknownClass { id: class.index() });
        }
        let class_name = registry.class_name(class);
        if lineage.contains(&class) {
            return Err(MetadataError::CircularInheritance { class: class_name });
        }

        let fallback = ClassDescriptor::default();
        let options = match registry.class_descriptor(class) {
            Some(options) => options,
            None => {
                debug!("`{class_name}` has no class options, using defaults");
                &fallback
            }
        };
        if options.pick.is_some() && options.omit.is_some() {
            return Err(MetadataError::ConflictingFieldSelection { class: class_name });
        }

        debug!("synthesizing schema for `{class_name}`");
        self.builds += 1;

        let mut node = SchemaNode::object();
        for field in registry.fields_of(class) {
            let Some(fragment) = &field.schema else {
                return Err(MetadataError::MissingSchemaFragment {
                    class: class_name,
                    field: field.key.clone(),
                });
            };
            if field.options.required && field.options.nullable {
                return Err(MetadataError::RequiredAndNullable {
                    field: field.key.clone(),
                });
            }
            node.properties.insert(field.key.clone(), fragment.clone());
            if field.options.required {
                push_unique(&mut node.required, &field.key);
            }
        }

        if let Some(parent) = options.parent {
            lineage.push(class);
            let parent_node = self.build(registry, parent, lineage);
            lineage.pop();
            node = merge_parent(parent_node?, node);
        }

        for source in &options.merge_sources {
            merge_defaults(&mut node, source);
        }

        apply_selection(&mut node, options);
        apply_rename(&mut node, &options.rename, &class_name);

        self.cache.insert(class, node.clone());
        Ok(node)
    }
}

/// Parent entries first; the child's fragments replace same-named parent fragments.
fn merge_parent(parent: SchemaNode, mut child: SchemaNode) -> SchemaNode {
    let own_properties = std::mem::replace(&mut child.properties, parent.properties);
    for (key, fragment) in own_properties {
        child.properties.insert(key, fragment);
    }
    let own_required = std::mem::replace(&mut child.required, parent.required);
    for key in &own_required {
        push_unique(&mut child.required, key);
    }
    child
}

/// Merge sources never override what the class or its parents already define.
fn merge_defaults(node: &mut SchemaNode, source: &SchemaNode) {
    for key in &source.required {
        push_unique(&mut node.required, key);
    }
    for (key, fragment) in &source.properties {
        node.properties.entry(key.clone()).or_insert_with(|| fragment.clone());
    }
}

fn apply_selection(node: &mut SchemaNode, options: &ClassDescriptor) {
    if let Some(pick) = &options.pick {
        node.properties.retain(|key, _| pick.contains(key));
        node.required.retain(|key| pick.contains(key));
    } else if let Some(omit) = &options.omit {
        node.properties.retain(|key, _| !omit.contains(key));
        node.required.retain(|key| !omit.contains(key));
    }
}

fn apply_rename(node: &mut SchemaNode, rename: &IndexMap<String, String>, class_name: &str) {
    for (from, to) in rename {
        if from == to {
            continue;
        }
        if !node.properties.contains_key(from) {
            debug!("`{class_name}`: rename source `{from}` not present, skipped");
            continue;
        }
        // The displaced property's requirement goes with it.
        node.properties.shift_remove(to);
        node.required.retain(|key| key != to);
        node.properties = std::mem::take(&mut node.properties)
            .into_iter()
            .map(|(key, fragment)| if key == *from { (to.clone(), fragment) } else { (key, fragment) })
            .collect();

        let mut required = Vec::with_capacity(node.required.len());
        for key in node.required.drain(..) {
            let key = if key == *from { to.clone() } else { key };
            push_unique(&mut required, &key);
        }
        node.required = required;
    }
}

fn push_unique(list: &mut Vec<String>, key: &str) {
    if !list.iter().any(|existing| existing == key) {
        list.push(key.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BsonType;
    use crate::types::{FieldDescriptor, FieldOptions};
    use pretty_assertions::assert_eq;

    fn field(key: &str, ty: BsonType, required: bool) -> FieldDescriptor {
        FieldDescriptor::new(
            key,
            SchemaNode::typed(ty),
            FieldOptions {
                required,
                ..FieldOptions::default()
            },
        )
    }

    fn keys(node: &SchemaNode) -> Vec<&str> {
        node.properties.keys().map(String::as_str).collect()
    }

    #[test]
    fn own_fields_in_declaration_order() {
        let mut registry = Registry::new();
        let cat = registry.declare("Cat");
        registry.record_field(cat, field("name", BsonType::String, true));
        registry.record_field(cat, field("age", BsonType::Number, true));
        registry.record_field(cat, field("nickname", BsonType::String, false));

        let node = SchemaSynthesizer::new().synthesize(&registry, cat).unwrap();
        assert_eq!(keys(&node), ["name", "age", "nickname"]);
        assert_eq!(node.required, ["name", "age"]);
    }

    #[test]
    fn parent_required_first_and_child_wins_collisions() {
        let mut registry = Registry::new();
        let base = registry.declare("Base");
        let child = registry.declare("Child");
        registry.record_field(base, field("id", BsonType::ObjectId, true));
        registry.record_field(base, field("created", BsonType::Date, true));
        registry.record_field(child, field("name", BsonType::String, true));
        registry.record_field(child, field("id", BsonType::String, true));
        registry.record_class(child, ClassDescriptor::new().extends(base));

        let node = SchemaSynthesizer::new().synthesize(&registry, child).unwrap();
        assert_eq!(keys(&node), ["id", "created", "name"]);
        assert_eq!(node.properties["id"], SchemaNode::typed(BsonType::String));
        assert_eq!(node.required, ["id", "created", "name"]);
    }

    #[test]
    fn merge_sources_only_supply_defaults() {
        let mut source = SchemaNode::object();
        source.properties.insert("name".into(), SchemaNode::typed(BsonType::Bool));
        source.properties.insert("extra".into(), SchemaNode::typed(BsonType::Number));
        source.required = vec!["extra".into(), "name".into()];

        let mut registry = Registry::new();
        let doc = registry.declare("Doc");
        registry.record_field(doc, field("name", BsonType::String, true));
        registry.record_class(doc, ClassDescriptor::new().merge_with(source));

        let node = SchemaSynthesizer::new().synthesize(&registry, doc).unwrap();
        assert_eq!(keys(&node), ["name", "extra"]);
        assert_eq!(node.properties["name"], SchemaNode::typed(BsonType::String));
        assert_eq!(node.required, ["name", "extra"]);
    }

    #[test]
    fn pick_and_omit_conflict() {
        let mut registry = Registry::new();
        let doc = registry.declare("Doc");
        registry.record_field(doc, field("a", BsonType::String, false));
        registry.record_class(doc, ClassDescriptor::new().pick(["a"]).omit(["b"]));

        let err = SchemaSynthesizer::new().synthesize(&registry, doc).unwrap_err();
        assert_eq!(err, MetadataError::ConflictingFieldSelection { class: "Doc".into() });
    }

    #[test]
    fn selection_and_rename() {
        let mut registry = Registry::new();
        let doc = registry.declare("Doc");
        registry.record_field(doc, field("a", BsonType::String, true));
        registry.record_field(doc, field("b", BsonType::String, true));
        registry.record_field(doc, field("c", BsonType::String, false));
        registry.record_class(
            doc,
            ClassDescriptor::new().omit(["b"]).rename("a", "alpha").rename("b", "beta"),
        );

        let node = SchemaSynthesizer::new().synthesize(&registry, doc).unwrap();
        assert_eq!(keys(&node), ["alpha", "c"]);
        assert_eq!(node.required, ["alpha"]);

        let picked = registry.declare("Picked");
        registry.record_field(picked, field("a", BsonType::String, true));
        registry.record_field(picked, field("b", BsonType::String, true));
        registry.record_class(picked, ClassDescriptor::new().pick(["b"]));
        let node = SchemaSynthesizer::new().synthesize(&registry, picked).unwrap();
        assert_eq!(keys(&node), ["b"]);
        assert_eq!(node.required, ["b"]);
    }

    #[test]
    fn rename_onto_existing_name_moves_the_renamed_fragment() {
        let mut registry = Registry::new();
        let doc = registry.declare("Doc");
        registry.record_field(doc, field("a", BsonType::String, true));
        registry.record_field(doc, field("b", BsonType::Number, false));
        registry.record_class(doc, ClassDescriptor::new().rename("b", "a"));

        let node = SchemaSynthesizer::new().synthesize(&registry, doc).unwrap();
        assert_eq!(keys(&node), ["a"]);
        assert_eq!(node.properties["a"], SchemaNode::typed(BsonType::Number));
        assert!(node.required.is_empty());

        let swapped = registry.declare("Swapped");
        registry.record_field(swapped, field("name", BsonType::String, false));
        registry.record_field(swapped, field("legacy", BsonType::Number, true));
        registry.record_class(swapped, ClassDescriptor::new().rename("legacy", "name"));
        let node = SchemaSynthesizer::new().synthesize(&registry, swapped).unwrap();
        assert_eq!(node.properties["name"], SchemaNode::typed(BsonType::Number));
        assert_eq!(node.required, ["name"]);
    }

    #[test]
    fn missing_fragment_is_reported() {
        let mut registry = Registry::new();
        let doc = registry.declare("Doc");
        registry.record_field(
            doc,
            FieldDescriptor {
                key: "broken".into(),
                ..FieldDescriptor::default()
            },
        );
        let err = SchemaSynthesizer::new().synthesize(&registry, doc).unwrap_err();
        assert_eq!(
            err,
            MetadataError::MissingSchemaFragment {
                class: "Doc".into(),
                field: "broken".into()
            }
        );
    }

    #[test]
    fn inheritance_cycles_fail() {
        let mut registry = Registry::new();
        let a = registry.declare("A");
        let b = registry.declare("B");
        registry.record_class(a, ClassDescriptor::new().extends(b));
        registry.record_class(b, ClassDescriptor::new().extends(a));

        let err = SchemaSynthesizer::new().synthesize(&registry, a).unwrap_err();
        assert_eq!(err, MetadataError::CircularInheritance { class: "A".into() });
    }

    #[test]
    fn cached_results_skip_rebuilding() {
        let mut registry = Registry::new();
        let base = registry.declare("Base");
        let child = registry.declare("Child");
        registry.record_field(base, field("id", BsonType::ObjectId, true));
        registry.record_class(child, ClassDescriptor::new().extends(base));

        let mut synthesizer = SchemaSynthesizer::new();
        let first = synthesizer.synthesize(&registry, child).unwrap();
        assert_eq!(synthesizer.builds(), 2);
        let second = synthesizer.synthesize(&registry, child).unwrap();
        let parent = synthesizer.synthesize(&registry, base).unwrap();
        assert_eq!(first, second);
        assert_eq!(parent.required, ["id"]);
        assert_eq!(synthesizer.builds(), 2);
    }

    #[test]
    fn undeclared_class_is_unknown() {
        let registry = Registry::new();
        let err = SchemaSynthesizer::new().synthesize(&registry, ClassId::new(0, 7)).unwrap_err();
        assert_eq!(err, MetadataError::UnknownClass { id: 7 });
    }
}
