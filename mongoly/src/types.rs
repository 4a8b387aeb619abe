use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::errors::MetadataError;
use crate::resolver::TypeRef;
use crate::schema::SchemaNode;

/// Identity of a described document class.
///
/// Ids are minted by the [`Registry`](crate::registry::Registry) that declares the class, so two
/// classes sharing a name in different modules never collide. Each id also carries its
/// registry's identity, so an id from another registry is never mistaken for a local class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId {
    pub(crate) registry: u32,
    pub(crate) index: u32,
}

impl ClassId {
    pub(crate) const fn new(registry: u32, index: u32) -> Self {
        Self { registry, index }
    }

    /// Position of the class in its registry's declaration order.
    pub fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Key direction or special index kind for a single indexed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexDirection {
    #[default]
    Ascending,
    Descending,
    Text,
    Geo2dSphere,
}

impl IndexDirection {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            IndexDirection::Ascending => "1",
            IndexDirection::Descending => "-1",
            IndexDirection::Text => "text",
            IndexDirection::Geo2dSphere => "2dsphere",
        }
    }
}

impl fmt::Display for IndexDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Wire form used by index descriptions: numeric directions, string kinds.
impl Serialize for IndexDirection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            IndexDirection::Ascending => serializer.serialize_i32(1),
            IndexDirection::Descending => serializer.serialize_i32(-1),
            IndexDirection::Text => serializer.serialize_str("text"),
            IndexDirection::Geo2dSphere => serializer.serialize_str("2dsphere"),
        }
    }
}

impl FromStr for IndexDirection {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "asc" | "ascending" => Ok(IndexDirection::Ascending),
            "-1" | "desc" | "descending" => Ok(IndexDirection::Descending),
            "text" => Ok(IndexDirection::Text),
            "2dsphere" | "geo" => Ok(IndexDirection::Geo2dSphere),
            other => Err(MetadataError::invalid_option(
                "index",
                format!("unknown index kind `{other}`, expected asc, desc, text or 2dsphere"),
            )),
        }
    }
}

/// How a field is indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub direction: IndexDirection,
    pub unique: bool,
    pub sparse: bool,
    pub expire_after_seconds: Option<u64>,
    pub name: Option<String>,
}

impl IndexOptions {
    pub fn new(direction: IndexDirection) -> Self {
        Self {
            direction,
            ..Self::default()
        }
    }
}

/// Scalar validation bounds. Applied to the field node, or to `items` for arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaBounds {
    pub minimum: Option<f64>,
    pub exclusive_minimum: bool,
    pub maximum: Option<f64>,
    pub exclusive_maximum: bool,
    pub multiple_of: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
}

impl SchemaBounds {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn has_numeric(&self) -> bool {
        self.minimum.is_some() || self.maximum.is_some() || self.multiple_of.is_some()
    }

    pub(crate) fn has_textual(&self) -> bool {
        self.min_length.is_some() || self.max_length.is_some() || self.pattern.is_some()
    }
}

/// Bounds that only apply to array fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArrayBounds {
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
}

impl ArrayBounds {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Option flags carried by a registered field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldOptions {
    pub required: bool,
    pub nullable: bool,
    /// The field's type is another described class (or an array of one).
    pub class_reference: bool,
    pub description: Option<String>,
    pub bounds: SchemaBounds,
    pub array: ArrayBounds,
    pub index: Option<IndexOptions>,
    /// Skip this field's index when the owning class is nested inside another.
    pub exclude_from_parent_index: bool,
    /// Do not descend into the referenced class when deriving indexes.
    pub exclude_sub_indexes: bool,
}

/// A registered field: its key, the schema fragment computed when it was
/// defined, and its options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDescriptor {
    pub key: String,
    pub schema: Option<SchemaNode>,
    pub options: FieldOptions,
    /// Referenced class when `options.class_reference` is set.
    pub target: Option<ClassId>,
}

impl FieldDescriptor {
    pub fn new(key: impl Into<String>, schema: SchemaNode, options: FieldOptions) -> Self {
        Self {
            key: key.into(),
            schema: Some(schema),
            options,
            target: None,
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.options.index.is_some()
    }
}

/// Class-level schema options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassDescriptor {
    pub parent: Option<ClassId>,
    pub merge_sources: Vec<SchemaNode>,
    pub omit: Option<Vec<String>>,
    pub pick: Option<Vec<String>>,
    /// Declared field name -> output property name, applied in insertion order.
    pub rename: IndexMap<String, String>,
}

impl ClassDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extends(mut self, parent: ClassId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn merge_with(mut self, source: SchemaNode) -> Self {
        self.merge_sources.push(source);
        self
    }

    pub fn omit<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.omit = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn pick<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pick = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rename.insert(from.into(), to.into());
        self
    }
}

/// Annotation input for one field, before its schema fragment is resolved.
///
/// ```
/// use mongoly::{FieldSpec, IndexDirection, TypeRef};
///
/// let spec = FieldSpec::new("name", TypeRef::named("String"))
///     .required()
///     .indexed(IndexDirection::Ascending)
///     .unique();
/// assert!(spec.options.required);
/// assert!(spec.options.index.as_ref().is_some_and(|index| index.unique));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub key: String,
    pub type_ref: TypeRef,
    pub enum_values: Option<Vec<Value>>,
    pub options: FieldOptions,
}

impl FieldSpec {
    pub fn new(key: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            key: key.into(),
            type_ref,
            enum_values: None,
            options: FieldOptions::default(),
        }
    }

    pub fn required(mut self) -> Self {
        self.options.required = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.options.nullable = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.options.description = Some(description.into());
        self
    }

    pub fn enumeration<I>(mut self, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn bounds(mut self, bounds: SchemaBounds) -> Self {
        self.options.bounds = bounds;
        self
    }

    pub fn array_bounds(mut self, array: ArrayBounds) -> Self {
        self.options.array = array;
        self
    }

    pub fn indexed(mut self, direction: IndexDirection) -> Self {
        self.options.index.get_or_insert_with(IndexOptions::default).direction = direction;
        self
    }

    /// Marks the index unique, adding an ascending index if none was configured.
    pub fn unique(mut self) -> Self {
        self.options.index.get_or_insert_with(IndexOptions::default).unique = true;
        self
    }

    pub fn sparse(mut self) -> Self {
        self.options.index.get_or_insert_with(IndexOptions::default).sparse = true;
        self
    }

    pub fn expire_after(mut self, seconds: u64) -> Self {
        self.options.index.get_or_insert_with(IndexOptions::default).expire_after_seconds = Some(seconds);
        self
    }

    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.options.index.get_or_insert_with(IndexOptions::default).name = Some(name.into());
        self
    }

    pub fn exclude_from_parent_index(mut self) -> Self {
        self.options.exclude_from_parent_index = true;
        self
    }

    pub fn exclude_sub_indexes(mut self) -> Self {
        self.options.exclude_sub_indexes = true;
        self
    }
}
