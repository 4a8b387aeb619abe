use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

use log::debug;

use crate::types::{ClassDescriptor, ClassId, FieldDescriptor};

static NEXT_REGISTRY: AtomicU32 = AtomicU32::new(1);

/// Field and class metadata for every described class, keyed by class identity.
///
/// The registry only stores what it is given. It never validates descriptors and never
/// resolves inheritance: `fields_of` returns a class's own fields only.
#[derive(Debug)]
pub struct Registry {
    id: u32,
    names: Vec<String>,
    retired: HashSet<u32>,
    types: HashMap<TypeId, ClassId>,
    fields: HashMap<ClassId, Vec<FieldDescriptor>>,
    classes: HashMap<ClassId, ClassDescriptor>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            id: NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed),
            names: Vec::new(),
            retired: HashSet::new(),
            types: HashMap::new(),
            fields: HashMap::new(),
            classes: HashMap::new(),
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a new class identity. Names are informational and need not be unique.
    pub fn declare(&mut self, name: impl Into<String>) -> ClassId {
        let id = ClassId::new(self.id, self.names.len() as u32);
        self.names.push(name.into());
        id
    }

    /// Returns the identity bound to `T`, declaring it on first use.
    pub fn declare_type<T: 'static>(&mut self, name: impl Into<String>) -> ClassId {
        if let Some(id) = self.class_of::<T>() {
            return id;
        }
        let id = self.declare(name);
        self.types.insert(TypeId::of::<T>(), id);
        id
    }

    /// Drops everything recorded for `class` and unbinds its type.
    ///
    /// The identity is never reused. Declaring the type again mints a fresh class.
    pub fn retire(&mut self, class: ClassId) {
        if !self.contains(class) {
            return;
        }
        debug!("retiring `{}`", self.class_name(class));
        self.fields.remove(&class);
        self.classes.remove(&class);
        self.types.retain(|_, id| *id != class);
        self.retired.insert(class.index);
    }

    pub fn class_of<T: 'static>(&self) -> Option<ClassId> {
        self.types.get(&TypeId::of::<T>()).copied()
    }

    pub fn contains(&self, class: ClassId) -> bool {
        class.registry == self.id && (class.index as usize) < self.names.len() && !self.retired.contains(&class.index)
    }

    /// Name the class was declared under, including retired classes.
    pub fn name_of(&self, class: ClassId) -> Option<&str> {
        if class.registry != self.id {
            return None;
        }
        self.names.get(class.index as usize).map(String::as_str)
    }

    /// Display name used in error messages; falls back to the raw id.
    pub fn class_name(&self, class: ClassId) -> String {
        self.name_of(class).map_or_else(|| class.to_string(), str::to_string)
    }

    /// First live class declared under `name`.
    pub fn find(&self, name: &str) -> Option<ClassId> {
        self.classes().find(|class| self.names[class.index as usize] == name)
    }

    /// All live classes in declaration order.
    pub fn classes(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.names.len() as u32)
            .filter(|index| !self.retired.contains(index))
            .map(|index| ClassId::new(self.id, index))
    }

    pub fn len(&self) -> usize {
        self.names.len() - self.retired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a field to the class's own field list.
    pub fn record_field(&mut self, class: ClassId, descriptor: FieldDescriptor) {
        self.fields.entry(class).or_default().push(descriptor);
    }

    /// Sets (or overwrites) the class-level descriptor.
    pub fn record_class(&mut self, class: ClassId, descriptor: ClassDescriptor) {
        self.classes.insert(class, descriptor);
    }

    pub fn fields_of(&self, class: ClassId) -> &[FieldDescriptor] {
        self.fields.get(&class).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn class_descriptor(&self, class: ClassId) -> Option<&ClassDescriptor> {
        self.classes.get(&class)
    }
}
