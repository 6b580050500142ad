use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use once_cell::sync::OnceCell;

use crate::{
    binding::Binding,
    error::Result,
    injector::Injector,
    instance::Instance,
    key::{marker, BindingKey, Qualifier, TypeKey},
    provider::ValueSource,
};

/// Position of an entry within a list, or its key within a map.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Index(usize),
    Name(String),
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::Index(index) => write!(f, "[{index}]"),
            EntryKey::Name(name) => write!(f, "[\"{name}\"]"),
        }
    }
}

/// Produces one entry. Receives the binding name and the entry's position or
/// key.
pub type EntryClosure =
    Arc<dyn Fn(&Injector, &Qualifier, &EntryKey) -> Result<Instance> + Send + Sync>;

#[derive(Clone)]
pub enum EntrySource {
    Value(ValueSource),
    Closure(EntryClosure),
}

impl EntrySource {
    fn produce(&self, injector: &Injector, name: &Qualifier, key: &EntryKey) -> Result<Instance> {
        match self {
            EntrySource::Value(source) => source.produce(injector, Some(name)),
            EntrySource::Closure(closure) => closure(injector, name, key),
        }
    }
}

impl fmt::Debug for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntrySource::Value(source) => write!(f, "{source:?}"),
            EntrySource::Closure(_) => write!(f, "EntryClosure"),
        }
    }
}

/// Checks an entry against the element type the collection was declared with.
/// Collections declared by name only accept anything.
fn check_element(
    injector: &Injector,
    kind: &str,
    name: &Qualifier,
    element: Option<TypeKey>,
    key: &EntryKey,
    instance: &Instance,
) -> Result<()> {
    match element {
        Some(expected) if instance.type_key() != expected => Err(injector.misconfigured(format!(
            "{kind} {name}{key} must be an instance of {expected}, got {}",
            instance.type_key()
        ))),
        _ => Ok(()),
    }
}

/// Ordered accumulation of entries, resolved together once into a
/// `Vec<Instance>`.
#[derive(Clone, Debug)]
pub struct ListBinding {
    name: Qualifier,
    element: Option<TypeKey>,
    entries: Vec<EntrySource>,
    resolved: OnceCell<Instance>,
}

impl ListBinding {
    pub fn new(name: Qualifier, element: Option<TypeKey>) -> Self {
        Self {
            name,
            element,
            entries: vec![],
            resolved: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &Qualifier {
        &self.name
    }

    pub fn element(&self) -> Option<TypeKey> {
        self.element
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn set_element(&mut self, element: TypeKey) {
        self.element = Some(element);
    }

    pub(crate) fn push(&mut self, entry: EntrySource) {
        self.entries.push(entry);
    }

    fn resolve(&self, injector: &Injector) -> Result<Instance> {
        let mut items = Vec::with_capacity(self.entries.len());
        for (index, entry) in self.entries.iter().enumerate() {
            let key = EntryKey::Index(index);
            let item = entry.produce(injector, &self.name, &key)?;
            check_element(injector, "list", &self.name, self.element, &key, &item)?;
            items.push(item);
        }
        tracing::debug!(list = %self.name, len = items.len(), "list binding resolved");
        Ok(Instance::new(items))
    }
}

impl Binding for ListBinding {
    fn key(&self) -> BindingKey {
        BindingKey::new(TypeKey::of::<marker::List>(), Some(self.name.clone()))
    }

    fn get_instance(&self, injector: &Injector, _qualifier: Option<&Qualifier>) -> Result<Instance> {
        self.resolved
            .get_or_try_init(|| self.resolve(injector))
            .cloned()
    }
}

/// Keyed accumulation of entries, resolved together once into an
/// `IndexMap<String, Instance>` in first-insertion order.
#[derive(Clone, Debug)]
pub struct MapBinding {
    name: Qualifier,
    element: Option<TypeKey>,
    entries: IndexMap<String, EntrySource>,
    resolved: OnceCell<Instance>,
}

impl MapBinding {
    pub fn new(name: Qualifier, element: Option<TypeKey>) -> Self {
        Self {
            name,
            element,
            entries: IndexMap::new(),
            resolved: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &Qualifier {
        &self.name
    }

    pub fn element(&self) -> Option<TypeKey> {
        self.element
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn set_element(&mut self, element: TypeKey) {
        self.element = Some(element);
    }

    /// Replaces any entry already registered under `key`.
    pub(crate) fn insert(&mut self, key: String, entry: EntrySource) {
        self.entries.insert(key, entry);
    }

    fn resolve(&self, injector: &Injector) -> Result<Instance> {
        let mut items = IndexMap::with_capacity(self.entries.len());
        for (name, entry) in &self.entries {
            let key = EntryKey::Name(name.clone());
            let item = entry.produce(injector, &self.name, &key)?;
            check_element(injector, "map", &self.name, self.element, &key, &item)?;
            items.insert(name.clone(), item);
        }
        tracing::debug!(map = %self.name, len = items.len(), "map binding resolved");
        Ok(Instance::new(items))
    }
}

impl Binding for MapBinding {
    fn key(&self) -> BindingKey {
        BindingKey::new(TypeKey::of::<marker::Map>(), Some(self.name.clone()))
    }

    fn get_instance(&self, injector: &Injector, _qualifier: Option<&Qualifier>) -> Result<Instance> {
        self.resolved
            .get_or_try_init(|| self.resolve(injector))
            .cloned()
    }
}
