use std::collections::HashSet;

use log::debug;

use crate::collection::{CollectionOptions, CollectionPlan};
use crate::errors::{MetadataError, Result};
use crate::indexes::{IndexDeriver, IndexSpec};
use crate::registration::{Document, registered_documents};
use crate::registry::Registry;
use crate::resolver::classify;
use crate::schema::SchemaNode;
use crate::schema::fragment::build_fragment;
use crate::schema::synthesis::SchemaSynthesizer;
use crate::types::{ClassDescriptor, ClassId, FieldDescriptor, FieldSpec};

/// Cache-miss counters for the two engines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthesisStats {
    pub schema_builds: usize,
    pub index_walks: usize,
}

/// Registry plus the schema and index engines built over it.
///
/// Classes are described first (`declare`, `record_class`, `define_field`, `seal`) and
/// queried afterwards (`synthesize`, `derive_indexes`, `plan`).
///
/// ```
/// use mongoly::{Catalog, ClassDescriptor, FieldSpec, TypeRef};
///
/// let mut catalog = Catalog::new();
/// let cat = catalog
///     .define_class(
///         "Cat",
///         ClassDescriptor::new(),
///         [FieldSpec::new("name", TypeRef::named("String")).required()],
///     )
///     .unwrap();
/// let schema = catalog.synthesize(cat).unwrap();
/// assert_eq!(schema.required, ["name"]);
/// ```
#[derive(Debug, Default)]
pub struct Catalog {
    registry: Registry,
    schemas: SchemaSynthesizer,
    indexes: IndexDeriver,
    pending: HashSet<ClassId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describes every type registered through `#[derive(Document)]`.
    pub fn from_registered() -> Result<Self> {
        let mut catalog = Self::new();
        for registration in registered_documents() {
            debug!("describing registered document `{}`", registration.type_name);
            (registration.describe)(&mut catalog)?;
        }
        Ok(catalog)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Declares a new class. It stays pending until [`Catalog::seal`].
    pub fn declare(&mut self, name: impl Into<String>) -> ClassId {
        let id = self.registry.declare(name);
        self.pending.insert(id);
        id
    }

    /// Declares the class bound to `T`, or returns the existing identity.
    pub fn declare_type<T: 'static>(&mut self, name: impl Into<String>) -> ClassId {
        if let Some(id) = self.registry.class_of::<T>() {
            return id;
        }
        let id = self.registry.declare_type::<T>(name);
        self.pending.insert(id);
        id
    }

    pub fn class_of<T: 'static>(&self) -> Option<ClassId> {
        self.registry.class_of::<T>()
    }

    /// Marks a class as fully defined so other classes may reference it.
    pub fn seal(&mut self, class: ClassId) {
        self.pending.remove(&class);
    }

    pub fn is_pending(&self, class: ClassId) -> bool {
        self.pending.contains(&class)
    }

    pub fn record_class(&mut self, class: ClassId, descriptor: ClassDescriptor) {
        self.invalidate(class);
        self.registry.record_class(class, descriptor);
    }

    /// Appends an already-resolved field descriptor without validating it.
    pub fn record_field(&mut self, class: ClassId, descriptor: FieldDescriptor) {
        self.invalidate(class);
        self.registry.record_field(class, descriptor);
    }

    /// Resolves a field's type and schema fragment, then records it on `class`.
    pub fn define_field(&mut self, class: ClassId, spec: FieldSpec) -> Result<()> {
        let shape = classify(&spec.key, &spec.type_ref, spec.enum_values.as_deref())?;
        let target = shape.target_class();
        if let Some(target) = target {
            if !self.registry.contains(target) {
                return Err(MetadataError::MissingTypeReference {
                    class: self.registry.class_name(class),
                    field: spec.key,
                });
            }
            if target == class || self.pending.contains(&target) {
                return Err(MetadataError::CircularReference {
                    class: self.registry.class_name(target),
                    field: spec.key,
                });
            }
        }

        let registry = &self.registry;
        let schemas = &mut self.schemas;
        let schema = build_fragment(&spec, &shape, |id| schemas.synthesize(registry, id))?;

        let mut options = spec.options;
        options.class_reference = target.is_some();
        self.record_field(
            class,
            FieldDescriptor {
                key: spec.key,
                schema: Some(schema),
                options,
                target,
            },
        );
        Ok(())
    }

    /// Declares, configures and seals a class in one step.
    pub fn define_class<I>(&mut self, name: impl Into<String>, descriptor: ClassDescriptor, fields: I) -> Result<ClassId>
    where
        I: IntoIterator<Item = FieldSpec>,
    {
        let class = self.declare(name);
        self.build_class(class, |catalog| {
            catalog.record_class(class, descriptor);
            for field in fields {
                catalog.define_field(class, field)?;
            }
            Ok(())
        })
    }

    /// Runs `define` against a pending class, sealing it on success.
    ///
    /// On failure the class is abandoned and the error returned, so no partially described
    /// class is left behind.
    pub fn build_class<F>(&mut self, class: ClassId, define: F) -> Result<ClassId>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        match define(self) {
            Ok(()) => {
                self.seal(class);
                Ok(class)
            }
            Err(err) => {
                self.abandon(class);
                Err(err)
            }
        }
    }

    /// Removes a class's fields, options and type binding. The identity stays retired.
    pub fn abandon(&mut self, class: ClassId) {
        self.invalidate(class);
        self.pending.remove(&class);
        self.registry.retire(class);
    }

    pub fn synthesize(&mut self, class: ClassId) -> Result<SchemaNode> {
        self.schemas.synthesize(&self.registry, class)
    }

    pub fn derive_indexes(&mut self, class: ClassId) -> Result<Vec<IndexSpec>> {
        self.indexes.derive(&self.registry, class)
    }

    pub fn describe<T: Document>(&mut self) -> Result<ClassId> {
        T::describe(self)
    }

    pub fn schema_of<T: Document>(&mut self) -> Result<SchemaNode> {
        let class = T::describe(self)?;
        self.synthesize(class)
    }

    pub fn indexes_of<T: Document>(&mut self) -> Result<Vec<IndexSpec>> {
        let class = T::describe(self)?;
        self.derive_indexes(class)
    }

    /// Schema, indexes and collection name for `class`, ready to hand to a database collaborator.
    pub fn plan(&mut self, class: ClassId, options: &CollectionOptions) -> Result<CollectionPlan> {
        let schema = self.synthesize(class)?;
        let indexes = self.derive_indexes(class)?;
        let name = self.registry.class_name(class);
        let collection_name = options.collection_name_for(&name);
        Ok(CollectionPlan {
            name,
            collection_name,
            schema,
            indexes,
            drop_old_indexes: options.drop_old_indexes,
        })
    }

    pub fn plan_document<T: Document>(&mut self) -> Result<CollectionPlan> {
        let class = T::describe(self)?;
        self.plan(class, &T::collection_options())
    }

    pub fn stats(&self) -> SynthesisStats {
        SynthesisStats {
            schema_builds: self.schemas.builds(),
            index_walks: self.indexes.walks(),
        }
    }

    // Any cached schema that depends on `class` implies `class` itself is cached.
    fn invalidate(&mut self, class: ClassId) {
        if self.schemas.cached(class).is_some() {
            debug!("`{}` changed after synthesis, clearing schema cache", self.registry.class_name(class));
            self.schemas.clear();
        }
        if !self.indexes.is_empty() {
            self.indexes.clear();
        }
    }
}
