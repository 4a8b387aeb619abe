//! Schema fragments for individual fields.
//!
//! A fragment is computed once, when the field is defined, and stored on its
//! [`FieldDescriptor`](crate::types::FieldDescriptor).

use log::warn;

use super::{BsonType, SchemaNode, TypeSet};
use crate::errors::{MetadataError, Result};
use crate::resolver::FieldShape;
use crate::types::{ArrayBounds, ClassId, FieldSpec, SchemaBounds};

/// Builds the fragment for `spec`, classified as `shape`.
///
/// `class_schema` supplies the object schema of referenced classes.
pub fn build_fragment<F>(spec: &FieldSpec, shape: &FieldShape, mut class_schema: F) -> Result<SchemaNode>
where
    F: FnMut(ClassId) -> Result<SchemaNode>,
{
    let options = &spec.options;
    if options.required && options.nullable {
        return Err(MetadataError::RequiredAndNullable {
            field: spec.key.clone(),
        });
    }

    let mut node = match shape {
        FieldShape::ArrayOf(inner) => {
            let items = element_node(&spec.key, inner, &options.bounds, &mut class_schema)?;
            let mut array = SchemaNode::array(items);
            apply_array_bounds(&mut array, &options.array);
            array
        }
        other => {
            if !options.array.is_empty() {
                warn!("field `{}`: array bounds ignored on a non-array field", spec.key);
            }
            element_node(&spec.key, other, &options.bounds, &mut class_schema)?
        }
    };

    if options.nullable {
        node.make_nullable();
    }
    if let Some(description) = &options.description {
        node.description = Some(description.clone());
    }
    Ok(node)
}

fn element_node<F>(field: &str, shape: &FieldShape, bounds: &SchemaBounds, class_schema: &mut F) -> Result<SchemaNode>
where
    F: FnMut(ClassId) -> Result<SchemaNode>,
{
    match shape {
        FieldShape::Scalar(ty) => {
            let mut node = SchemaNode::typed(*ty);
            apply_bounds(field, *ty, &mut node, bounds);
            Ok(node)
        }
        FieldShape::Enumeration(values) => {
            if !bounds.is_empty() {
                warn!("field `{field}`: bounds ignored on an enumeration");
            }
            Ok(SchemaNode::enumeration(values.clone()))
        }
        FieldShape::Class(id) => {
            if !bounds.is_empty() {
                warn!("field `{field}`: bounds ignored on a class reference");
            }
            let mut node = class_schema(*id)?;
            node.bson_type = Some(TypeSet::Single(BsonType::Object));
            Ok(node)
        }
        FieldShape::ArrayOf(inner) => {
            let items = element_node(field, inner, bounds, class_schema)?;
            Ok(SchemaNode::array(items))
        }
    }
}

fn apply_bounds(field: &str, ty: BsonType, node: &mut SchemaNode, bounds: &SchemaBounds) {
    if bounds.has_numeric() {
        if ty.is_numeric() {
            node.minimum = bounds.minimum;
            node.exclusive_minimum = (bounds.exclusive_minimum && bounds.minimum.is_some()).then_some(true);
            node.maximum = bounds.maximum;
            node.exclusive_maximum = (bounds.exclusive_maximum && bounds.maximum.is_some()).then_some(true);
            node.multiple_of = bounds.multiple_of;
        } else {
            warn!("field `{field}`: numeric bounds ignored on `{ty}`");
        }
    }
    if bounds.has_textual() {
        if ty == BsonType::String {
            node.min_length = bounds.min_length;
            node.max_length = bounds.max_length;
            node.pattern = bounds.pattern.clone();
        } else {
            warn!("field `{field}`: length and pattern bounds ignored on `{ty}`");
        }
    }
}

fn apply_array_bounds(node: &mut SchemaNode, array: &ArrayBounds) {
    node.min_items = array.min_items;
    node.max_items = array.max_items;
    node.unique_items = array.unique_items.then_some(true);
}
