use std::{collections::HashMap, marker::PhantomData, path::Path, sync::Arc};

use indexmap::IndexMap;

use crate::{
    binding::{
        Binding, ClassBinding, ConstantBinding, EntryKey, EntrySource, InstanceBinding,
        ListBinding, MapBinding, PropertyBinding,
    },
    descriptor::{Implements, Injectable, Target, TypeRef},
    error::{InjectError, Result},
    injection::{Dependency, Element},
    injector::Injector,
    instance::Instance,
    key::{BindingKey, Qualifier, TypeKey},
    properties::Properties,
    provider::{Provider, ProviderType, ValueSource},
    scope::{Scope, Scopes},
};

/// Qualifier under which the raw property table is bound.
pub const PROPERTIES: &str = "properties";

enum Pending {
    Class(ClassBinding),
    Constant(ConstantBinding),
    Prebuilt(Arc<dyn Binding>),
}

/// Accumulates bindings before any resolution happens.
///
/// Type and constant bindings registered later overwrite earlier ones with the
/// same key. List and map bindings accumulate entries under their name.
pub struct Binder {
    bindings: Vec<Pending>,
    lists: IndexMap<Qualifier, ListBinding>,
    maps: IndexMap<Qualifier, MapBinding>,
    scopes: Arc<Scopes>,
    environment: Option<String>,
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

impl Binder {
    pub fn new() -> Self {
        Self::with_scopes(Arc::new(Scopes::new()))
    }

    /// Shares scope caches with other binders, e.g. across bootstraps.
    pub fn with_scopes(scopes: Arc<Scopes>) -> Self {
        Self {
            bindings: vec![],
            lists: IndexMap::new(),
            maps: IndexMap::new(),
            scopes,
            environment: None,
        }
    }

    /// Builds an injector from a fresh binder configured by each callback in
    /// order.
    pub fn create_injector(configurators: &[&dyn Fn(&mut Binder)]) -> Injector {
        let mut binder = Binder::new();
        for configure in configurators {
            configure(&mut binder);
        }
        binder.get_injector()
    }

    /// Binds a type, initially to itself.
    pub fn bind<T: ?Sized + Injectable>(&mut self) -> ClassBindingBuilder<'_, T> {
        let scopes = self.scopes.clone();
        self.bindings
            .push(Pending::Class(ClassBinding::new(TypeRef::of::<T>())));
        let binding = match self.bindings.last_mut() {
            Some(Pending::Class(binding)) => binding,
            _ => unreachable!("a class binding was just pushed"),
        };
        ClassBindingBuilder {
            binding,
            scopes,
            _type: PhantomData,
        }
    }

    pub fn bind_constant(&mut self, name: impl Into<String>) -> ConstantBindingBuilder<'_> {
        self.bindings
            .push(Pending::Constant(ConstantBinding::new(name)));
        let binding = match self.bindings.last_mut() {
            Some(Pending::Constant(binding)) => binding,
            _ => unreachable!("a constant binding was just pushed"),
        };
        ConstantBindingBuilder { binding }
    }

    /// Adds to the list with this name, creating it on first use.
    pub fn bind_list(&mut self, name: impl Into<Qualifier>) -> ListBindingBuilder<'_> {
        let name = name.into();
        let binding = self
            .lists
            .entry(name.clone())
            .or_insert_with(|| ListBinding::new(name, None));
        ListBindingBuilder { binding }
    }

    /// Adds to the list of `T`, whose entries must all be instances of `T`.
    pub fn bind_list_of<T: ?Sized + Injectable>(&mut self) -> ListBindingBuilder<'_> {
        let builder = self.bind_list(Qualifier::of::<T>());
        builder.binding.set_element(TypeKey::of::<T>());
        builder
    }

    /// Adds to the map with this name, creating it on first use.
    pub fn bind_map(&mut self, name: impl Into<Qualifier>) -> MapBindingBuilder<'_> {
        let name = name.into();
        let binding = self
            .maps
            .entry(name.clone())
            .or_insert_with(|| MapBinding::new(name, None));
        MapBindingBuilder { binding }
    }

    /// Adds to the map of `T`, whose entries must all be instances of `T`.
    pub fn bind_map_of<T: ?Sized + Injectable>(&mut self) -> MapBindingBuilder<'_> {
        let builder = self.bind_map(Qualifier::of::<T>());
        builder.binding.set_element(TypeKey::of::<T>());
        builder
    }

    /// Makes properties resolvable for `environment`, and binds the table
    /// itself as `Properties` named [`PROPERTIES`].
    pub fn bind_properties(&mut self, properties: Properties, environment: &str) {
        let table = Arc::new(properties);
        self.bindings.push(Pending::Prebuilt(Arc::new(PropertyBinding::new(
            table.clone(),
            environment,
        ))));
        let key = BindingKey::new(TypeKey::of::<Properties>(), Some(Qualifier::named(PROPERTIES)));
        self.bindings.push(Pending::Prebuilt(Arc::new(InstanceBinding::new(
            key,
            Instance::from_arc(table),
        ))));
    }

    pub fn bind_properties_from_file(
        &mut self,
        path: impl AsRef<Path>,
        environment: &str,
    ) -> anyhow::Result<()> {
        let properties = Properties::from_file(path)?;
        self.bind_properties(properties, environment);
        Ok(())
    }

    /// The environment implicit `ImplementedBy` resolution prefers.
    pub fn set_environment(&mut self, name: impl Into<String>) {
        self.environment = Some(name.into());
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    pub fn scopes(&self) -> &Arc<Scopes> {
        &self.scopes
    }

    /// Snapshots the bindings into a new injector. The binder can keep being
    /// used; injectors already created are unaffected.
    pub fn get_injector(&self) -> Injector {
        let mut index: HashMap<BindingKey, Arc<dyn Binding>> = HashMap::new();
        let bindings = self.bindings.iter().map(|pending| -> Arc<dyn Binding> {
            match pending {
                Pending::Class(binding) => Arc::new(binding.clone()),
                Pending::Constant(binding) => Arc::new(binding.clone()),
                Pending::Prebuilt(binding) => binding.clone(),
            }
        });
        let collections = self
            .lists
            .values()
            .map(|list| Arc::new(list.clone()) as Arc<dyn Binding>)
            .chain(
                self.maps
                    .values()
                    .map(|map| Arc::new(map.clone()) as Arc<dyn Binding>),
            );
        for binding in bindings.chain(collections) {
            index.insert(binding.key(), binding);
        }
        tracing::info!(
            bindings = index.len(),
            environment = self.environment.as_deref().unwrap_or("(none)"),
            "injector created"
        );
        Injector::new(index, self.scopes.clone(), self.environment.clone())
    }
}

/// Configures a type binding. Each `to*` call replaces the previous value
/// source.
pub struct ClassBindingBuilder<'a, T: ?Sized> {
    binding: &'a mut ClassBinding,
    scopes: Arc<Scopes>,
    _type: PhantomData<fn(&T)>,
}

impl<T: ?Sized + Injectable> ClassBindingBuilder<'_, T> {
    pub fn to<U: Implements<T>>(self) -> Self {
        self.source(ValueSource::Implementation(Target::of::<T, U>()))
    }

    pub fn to_instance(self, instance: Arc<T>) -> Self {
        self.source(ValueSource::Literal(Instance::from_arc(instance)))
    }

    /// Binds a type-erased value, which must be an instance of `T`.
    pub fn to_any_instance(self, instance: Instance) -> Result<Self> {
        if !instance.is::<T>() {
            return Err(InjectError::InvalidArgument(format!(
                "cannot bind an instance of {} to {}",
                instance.type_key(),
                TypeKey::of::<T>()
            )));
        }
        Ok(self.source(ValueSource::Literal(instance)))
    }

    /// The provider must produce instances of `T`.
    pub fn to_provider<P: Provider + 'static>(self, provider: P) -> Self {
        self.source(ValueSource::Provider(Arc::new(provider)))
    }

    /// The provider is itself built by the injector.
    pub fn to_provider_type<P: Provider + Injectable>(self) -> Self {
        self.source(ValueSource::ProviderType(ProviderType::of::<P>()))
    }

    pub fn to_closure<F>(self, closure: F) -> Self
    where
        F: Fn(&Injector) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        self.source(ValueSource::Closure(Arc::new(move |injector, _| {
            closure(injector).map(Instance::from_arc)
        })))
    }

    pub fn as_singleton(self) -> Self {
        let scope = self.scopes.singleton();
        self.in_scope(scope)
    }

    /// Requires a session to be attached with `Injector::set_session`.
    pub fn in_session(self) -> Self {
        let scope = self.scopes.session();
        self.in_scope(scope)
    }

    pub fn in_scope(self, scope: Arc<dyn Scope>) -> Self {
        self.binding.set_scope(scope);
        self
    }

    pub fn named(self, qualifier: impl Into<Qualifier>) -> Self {
        self.binding.set_qualifier(qualifier.into());
        self
    }

    fn source(self, source: ValueSource) -> Self {
        self.binding.set_source(source);
        self
    }
}

/// Configures a named constant. Each call replaces the previous value source.
pub struct ConstantBindingBuilder<'a> {
    binding: &'a mut ConstantBinding,
}

impl ConstantBindingBuilder<'_> {
    pub fn to<D: Dependency>(self, value: D) -> Self {
        self.source(ValueSource::Literal(value.into_instance()))
    }

    /// The provider receives the constant's name as qualifier.
    pub fn to_provider<P: Provider + 'static>(self, provider: P) -> Self {
        self.source(ValueSource::Provider(Arc::new(provider)))
    }

    pub fn to_provider_type<P: Provider + Injectable>(self) -> Self {
        self.source(ValueSource::ProviderType(ProviderType::of::<P>()))
    }

    pub fn to_closure<D, F>(self, closure: F) -> Self
    where
        D: Dependency,
        F: Fn(&Injector) -> Result<D> + Send + Sync + 'static,
    {
        self.source(ValueSource::Closure(Arc::new(move |injector, _| {
            closure(injector).map(D::into_instance)
        })))
    }

    fn source(self, source: ValueSource) -> Self {
        self.binding.set_source(source);
        self
    }
}

pub struct ListBindingBuilder<'a> {
    binding: &'a mut ListBinding,
}

impl ListBindingBuilder<'_> {
    pub fn add<E: Element>(self, value: E) -> Self {
        self.entry(EntrySource::Value(ValueSource::Literal(value.into_element())))
    }

    /// Adds an instance of `U`, built by the injector.
    pub fn add_type<U: Injectable>(self) -> Self {
        self.entry(EntrySource::Value(ValueSource::Implementation(
            Target::of::<U, U>(),
        )))
    }

    /// Adds an instance of `U`, built by the injector and upcast to `I`.
    pub fn add_type_as<I, U>(self) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        U: Implements<I>,
    {
        self.entry(EntrySource::Value(ValueSource::Implementation(
            Target::of::<I, U>(),
        )))
    }

    /// The provider receives the list's name as qualifier.
    pub fn add_provider<P: Provider + 'static>(self, provider: P) -> Self {
        self.entry(EntrySource::Value(ValueSource::Provider(Arc::new(provider))))
    }

    pub fn add_provider_type<P: Provider + Injectable>(self) -> Self {
        self.entry(EntrySource::Value(ValueSource::ProviderType(
            ProviderType::of::<P>(),
        )))
    }

    /// The closure receives the list's name and the entry's index.
    pub fn add_closure<E, F>(self, closure: F) -> Self
    where
        E: Element,
        F: Fn(&Injector, &Qualifier, &EntryKey) -> Result<E> + Send + Sync + 'static,
    {
        self.entry(EntrySource::Closure(Arc::new(move |injector, name, key| {
            closure(injector, name, key).map(E::into_element)
        })))
    }

    fn entry(self, entry: EntrySource) -> Self {
        self.binding.push(entry);
        self
    }
}

/// Entries added under a key that already exists replace the earlier entry.
pub struct MapBindingBuilder<'a> {
    binding: &'a mut MapBinding,
}

impl MapBindingBuilder<'_> {
    pub fn add<E: Element>(self, key: impl Into<String>, value: E) -> Self {
        self.entry(
            key,
            EntrySource::Value(ValueSource::Literal(value.into_element())),
        )
    }

    pub fn add_type<U: Injectable>(self, key: impl Into<String>) -> Self {
        self.entry(
            key,
            EntrySource::Value(ValueSource::Implementation(Target::of::<U, U>())),
        )
    }

    pub fn add_type_as<I, U>(self, key: impl Into<String>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        U: Implements<I>,
    {
        self.entry(
            key,
            EntrySource::Value(ValueSource::Implementation(Target::of::<I, U>())),
        )
    }

    pub fn add_provider<P: Provider + 'static>(self, key: impl Into<String>, provider: P) -> Self {
        self.entry(
            key,
            EntrySource::Value(ValueSource::Provider(Arc::new(provider))),
        )
    }

    pub fn add_provider_type<P: Provider + Injectable>(self, key: impl Into<String>) -> Self {
        self.entry(
            key,
            EntrySource::Value(ValueSource::ProviderType(ProviderType::of::<P>())),
        )
    }

    /// The closure receives the map's name and the entry's key.
    pub fn add_closure<E, F>(self, key: impl Into<String>, closure: F) -> Self
    where
        E: Element,
        F: Fn(&Injector, &Qualifier, &EntryKey) -> Result<E> + Send + Sync + 'static,
    {
        self.entry(
            key,
            EntrySource::Closure(Arc::new(move |injector, name, key| {
                closure(injector, name, key).map(E::into_element)
            })),
        )
    }

    fn entry(self, key: impl Into<String>, entry: EntrySource) -> Self {
        self.binding.insert(key.into(), entry);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_constants_overwrite_earlier_ones() {
        let mut binder = Binder::new();
        binder.bind_constant("answer").to(41i64);
        binder.bind_constant("answer").to(42i64);
        let injector = binder.get_injector();
        assert_eq!(42, injector.get_constant::<i64>("answer").unwrap());
    }

    #[test]
    fn unfinished_constants_are_misconfigured() {
        let mut binder = Binder::new();
        binder.bind_constant("answer");
        let error = binder.get_injector().get_constant::<i64>("answer").unwrap_err();
        assert!(matches!(error, InjectError::Misconfigured { .. }), "{error}");
    }

    #[test]
    fn bind_list_returns_the_same_accumulator() {
        let mut binder = Binder::new();
        binder.bind_list("ports").add(80i64);
        binder.bind_list("ports").add(443i64).add(8080i64);
        let ports: Vec<i64> = binder.get_injector().get_list("ports").unwrap();
        assert_eq!(vec![80, 443, 8080], ports);
    }

    #[test]
    fn injectors_are_snapshots() {
        let mut binder = Binder::new();
        binder.bind_constant("answer").to(1i64);
        let before = binder.get_injector();
        binder.bind_constant("answer").to(2i64);
        let after = binder.get_injector();
        assert_eq!(1, before.get_constant::<i64>("answer").unwrap());
        assert_eq!(2, after.get_constant::<i64>("answer").unwrap());
    }

    #[test]
    fn create_injector_applies_configurators_in_order() {
        let injector = Binder::create_injector(&[
            &|binder: &mut Binder| {
                binder.bind_constant("name").to("first".to_string());
            },
            &|binder: &mut Binder| {
                binder.bind_constant("name").to("second".to_string());
                binder.set_environment("TEST");
            },
        ]);
        assert_eq!("second", injector.get_constant::<String>("name").unwrap());
        assert_eq!(Some("TEST"), injector.environment());
    }

    #[test]
    fn raw_properties_are_bound_by_name() {
        let mut binder = Binder::new();
        binder.bind_properties(Properties::new().with("config", "debug", true), "DEV");
        let properties = binder
            .get_injector()
            .get_named::<Properties>(PROPERTIES)
            .unwrap();
        assert!(properties.get("config", "debug").is_some());
    }
}
