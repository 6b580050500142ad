use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    thread::{self, ThreadId},
};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::{
    binding::{Binding, ClassBinding, InstanceBinding},
    descriptor::{Descriptor, Injectable, Kind, TypeRef},
    error::{InjectError, Result},
    injection::{Dependency, Element},
    instance::Instance,
    key::{marker, BindingKey, Qualifier, TypeKey},
    provider::ValueSource,
    scope::{Scopes, Session},
};

/// Resolves `(type, qualifier)` pairs to instances, recursively building
/// their dependencies.
///
/// Cloning is cheap and yields a handle to the same injector. The injector is
/// itself injectable: a constructor parameter of type `Injector` receives the
/// injector that builds it.
#[derive(Clone)]
pub struct Injector {
    inner: Arc<Inner>,
}

struct Inner {
    /// Bindings registered with the binder. Never modified.
    explicit: HashMap<BindingKey, Arc<dyn Binding>>,
    /// Implicit bindings memoized on first resolution and bindings added at
    /// runtime. Consulted before `explicit`.
    derived: RwLock<HashMap<BindingKey, Arc<dyn Binding>>>,
    scopes: Arc<Scopes>,
    environment: Option<String>,
    /// In-progress resolutions per thread. Threads without one have no entry.
    stacks: Mutex<HashMap<ThreadId, Vec<BindingKey>>>,
}

impl Injectable for Injector {
    fn descriptor() -> Descriptor {
        Descriptor::opaque::<Self>()
    }
}

impl Injector {
    pub(crate) fn new(
        explicit: HashMap<BindingKey, Arc<dyn Binding>>,
        scopes: Arc<Scopes>,
        environment: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                explicit,
                derived: RwLock::new(HashMap::new()),
                scopes,
                environment,
                stacks: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn get_instance<T: ?Sized + Injectable>(&self) -> Result<Arc<T>> {
        self.get_typed::<T>(None)
    }

    pub fn get_named<T: ?Sized + Injectable>(&self, qualifier: impl Into<Qualifier>) -> Result<Arc<T>> {
        self.get_typed::<T>(Some(&qualifier.into()))
    }

    pub fn get_constant<D: Dependency>(&self, name: &str) -> Result<D> {
        self.get_marked::<marker::Constant, D>(Qualifier::named(name))
    }

    /// A configuration value for the active environment, coerced into `D`.
    pub fn get_property<D: Dependency>(&self, name: &str) -> Result<D> {
        self.get_marked::<marker::Property, D>(Qualifier::named(name))
    }

    pub fn get_list<E: Element>(&self, name: impl Into<Qualifier>) -> Result<Vec<E>> {
        self.get_marked::<marker::List, Vec<E>>(name.into())
    }

    /// The list declared with `Binder::bind_list_of::<T>()`.
    pub fn get_list_of<T: ?Sized + Injectable>(&self) -> Result<Vec<Arc<T>>> {
        self.get_list(Qualifier::of::<T>())
    }

    pub fn get_map<E: Element>(&self, name: impl Into<Qualifier>) -> Result<IndexMap<String, E>> {
        self.get_marked::<marker::Map, IndexMap<String, E>>(name.into())
    }

    /// The map declared with `Binder::bind_map_of::<T>()`.
    pub fn get_map_of<T: ?Sized + Injectable>(&self) -> Result<IndexMap<String, Arc<T>>> {
        self.get_map(Qualifier::of::<T>())
    }

    fn get_typed<T: ?Sized + Injectable>(&self, qualifier: Option<&Qualifier>) -> Result<Arc<T>> {
        let instance = self.resolve(&TypeRef::of::<T>(), qualifier)?;
        instance.downcast::<T>().ok_or_else(|| {
            self.misconfigured(format!(
                "{} resolved to an instance of {}",
                TypeKey::of::<T>(),
                instance.type_key()
            ))
        })
    }

    fn get_marked<M: 'static, D: Dependency>(&self, qualifier: Qualifier) -> Result<D> {
        let instance = self.resolve(&TypeRef::marker::<M>(), Some(&qualifier))?;
        D::from_instance(&instance).ok_or_else(|| {
            self.misconfigured(format!(
                "{}#{qualifier} is {}, which cannot be converted to {}",
                TypeKey::of::<M>(),
                instance.type_key(),
                crate::short_name::<D>()
            ))
        })
    }

    /// Resolves a value. The qualifier is passed to the binding, so it
    /// selects the constant, property or multi-binding for the reserved
    /// marker types.
    pub fn resolve(&self, ty: &TypeRef, qualifier: Option<&Qualifier>) -> Result<Instance> {
        if ty.key() == TypeKey::of::<Injector>() {
            return Ok(Instance::new(self.clone()));
        }
        let key = BindingKey::new(ty.key(), qualifier.cloned());
        let _frame = self.enter(&key)?;
        let binding = self
            .find_binding(ty, qualifier, true)?
            .ok_or_else(|| InjectError::BindingNotFound {
                key: key.to_string(),
                stack: self.stack(),
            })?;
        tracing::trace!(%key, "resolving");
        binding.get_instance(self, qualifier)
    }

    /// Whether `resolve` would find a binding, explicit or implicit. For
    /// properties, whether the named property is defined.
    pub fn has_binding(&self, ty: &TypeRef, qualifier: Option<&Qualifier>) -> bool {
        self.probe(ty, qualifier).unwrap_or(false)
    }

    pub fn has<T: ?Sized + Injectable>(&self) -> bool {
        self.has_binding(&TypeRef::of::<T>(), None)
    }

    /// Whether a binding is already registered or memoized, without deriving
    /// one. For properties, whether the named property is defined.
    pub fn has_explicit_binding(&self, ty: TypeKey, qualifier: Option<&Qualifier>) -> bool {
        match self.lookup_qualified(ty, qualifier) {
            Some(binding) if ty == TypeKey::of::<marker::Property>() => binding.has_value(qualifier),
            Some(_) => true,
            None => ty == TypeKey::of::<Injector>(),
        }
    }

    pub fn has_explicit<T: ?Sized + 'static>(&self) -> bool {
        self.has_explicit_binding(TypeKey::of::<T>(), None)
    }

    /// Like `has_binding`, but reports misconfigured implicit bindings.
    pub(crate) fn probe(&self, ty: &TypeRef, qualifier: Option<&Qualifier>) -> Result<bool> {
        if ty.key() == TypeKey::of::<Injector>() {
            return Ok(true);
        }
        if ty.key() == TypeKey::of::<marker::Property>() {
            return Ok(self.has_explicit_binding(ty.key(), qualifier));
        }
        Ok(self.find_binding(ty, qualifier, false)?.is_some())
    }

    /// Attaches a session to the session scope and makes the session itself
    /// injectable under its own type.
    pub fn set_session<S: Session + 'static>(&self, session: Arc<S>, qualifier: Option<Qualifier>) {
        self.inner.scopes.sessions().attach(session.clone());
        let key = BindingKey::new(TypeKey::of::<S>(), qualifier);
        tracing::debug!(%key, "session attached");
        self.inner.derived.write().insert(
            key.clone(),
            Arc::new(InstanceBinding::new(key, Instance::from_arc(session))),
        );
    }

    /// The current thread's in-progress resolutions, outermost first, as
    /// `Type#qualifier` labels.
    pub fn stack(&self) -> Vec<String> {
        self.inner
            .stacks
            .lock()
            .get(&thread::current().id())
            .map(|stack| labels(stack))
            .unwrap_or_default()
    }

    pub fn environment(&self) -> Option<&str> {
        self.inner.environment.as_deref()
    }

    pub fn scopes(&self) -> &Scopes {
        &self.inner.scopes
    }

    /// A misconfiguration error carrying the current resolution stack.
    pub fn misconfigured(&self, message: impl Into<String>) -> InjectError {
        InjectError::misconfigured(message, self.stack())
    }

    fn enter(&self, key: &BindingKey) -> Result<Frame<'_>> {
        let mut stacks = self.inner.stacks.lock();
        let stack = stacks.entry(thread::current().id()).or_default();
        if stack.contains(key) {
            let mut cycle = labels(stack);
            cycle.push(key.to_string());
            return Err(InjectError::CircularDependency {
                key: key.to_string(),
                stack: cycle,
            });
        }
        stack.push(key.clone());
        Ok(Frame { injector: self })
    }

    fn lookup(&self, key: &BindingKey) -> Option<Arc<dyn Binding>> {
        if let Some(binding) = self.inner.derived.read().get(key) {
            return Some(binding.clone());
        }
        self.inner.explicit.get(key).cloned()
    }

    /// The qualified binding, else the unqualified one.
    fn lookup_qualified(&self, ty: TypeKey, qualifier: Option<&Qualifier>) -> Option<Arc<dyn Binding>> {
        qualifier
            .and_then(|qualifier| self.lookup(&BindingKey::new(ty, Some(qualifier.clone()))))
            .or_else(|| self.lookup(&BindingKey::unqualified(ty)))
    }

    fn find_binding(
        &self,
        ty: &TypeRef,
        qualifier: Option<&Qualifier>,
        memoize: bool,
    ) -> Result<Option<Arc<dyn Binding>>> {
        if let Some(binding) = self.lookup_qualified(ty.key(), qualifier) {
            return Ok(Some(binding));
        }
        if ty.key().is_marker() {
            return Ok(None);
        }
        let Some(binding) = self.derive(ty)? else {
            return Ok(None);
        };
        if !memoize {
            return Ok(Some(binding));
        }
        let key = BindingKey::unqualified(ty.key());
        tracing::debug!(%key, "implicit binding memoized");
        Ok(Some(
            self.inner
                .derived
                .write()
                .entry(key)
                .or_insert(binding)
                .clone(),
        ))
    }

    /// The implicit binding for a type that was never bound explicitly.
    fn derive(&self, ty: &TypeRef) -> Result<Option<Arc<dyn Binding>>> {
        let Some(descriptor) = ty.descriptor() else {
            return Ok(None);
        };
        let binding = ClassBinding::new(*ty);
        let implementations = descriptor.implemented_by();
        if !implementations.is_empty() {
            let environment = self.environment();
            let chosen = implementations
                .iter()
                .find(|implementation| implementation.matches(environment))
                .or_else(|| {
                    implementations
                        .iter()
                        .find(|implementation| implementation.environment().is_none())
                })
                .ok_or_else(|| {
                    self.misconfigured(format!(
                        "{} declares implementations but none is the default for environment {}",
                        ty.key(),
                        environment.unwrap_or("(none)")
                    ))
                })?;
            return Ok(Some(Arc::new(
                binding.with_source(ValueSource::Implementation(*chosen.target())),
            )));
        }
        if let Some(provider) = descriptor.provided_by() {
            let scope = descriptor
                .is_singleton()
                .then(|| self.inner.scopes.singleton());
            return Ok(Some(Arc::new(
                binding
                    .with_source(ValueSource::ProviderType(*provider))
                    .with_scope(scope),
            )));
        }
        match descriptor.kind() {
            Kind::Class(_) => Ok(Some(Arc::new(binding))),
            Kind::Interface(_) => Ok(None),
        }
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("environment", &self.inner.environment)
            .field("explicit", &self.inner.explicit.len())
            .field("derived", &self.inner.derived.read().len())
            .finish()
    }
}

/// Pops its key off the resolution stack when dropped, including when
/// resolution fails.
struct Frame<'a> {
    injector: &'a Injector,
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        let thread = thread::current().id();
        let mut stacks = self.injector.inner.stacks.lock();
        if let Some(stack) = stacks.get_mut(&thread) {
            stack.pop();
            if stack.is_empty() {
                stacks.remove(&thread);
            }
        }
    }
}

fn labels(stack: &[BindingKey]) -> Vec<String> {
    stack.iter().map(BindingKey::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::Binder;

    #[derive(Default)]
    struct Clock;

    impl Injectable for Clock {
        fn descriptor() -> Descriptor {
            Descriptor::class::<Self>().build()
        }
    }

    trait Unbound: Send + Sync {}

    impl Injectable for dyn Unbound {
        fn descriptor() -> Descriptor {
            Descriptor::opaque::<Self>()
        }
    }

    #[test]
    fn concrete_types_are_bound_implicitly_on_first_use() {
        let injector = Binder::new().get_injector();
        assert!(injector.has::<Clock>());
        assert!(!injector.has_explicit::<Clock>());
        injector.get_instance::<Clock>().unwrap();
        assert!(injector.has_explicit::<Clock>());
    }

    #[test]
    fn unbound_interfaces_are_not_found() {
        let injector = Binder::new().get_injector();
        assert!(!injector.has::<dyn Unbound>());
        let error = injector.get_instance::<dyn Unbound>().err().unwrap();
        assert!(error.is_not_found(), "{error}");
        assert!(injector.stack().is_empty());
    }

    #[test]
    fn the_injector_resolves_itself() {
        let injector = Binder::new().get_injector();
        assert!(injector.has::<Injector>());
        let resolved = injector.get_instance::<Injector>().unwrap();
        assert!(Arc::ptr_eq(&injector.inner, &resolved.inner));
        assert!(!injector.has_explicit::<Clock>());
    }

    #[test]
    fn markers_have_no_implicit_binding() {
        let injector = Binder::new().get_injector();
        let constant = TypeRef::marker::<marker::Constant>();
        assert!(!injector.has_binding(&constant, Some(&"answer".into())));
        assert!(injector.get_constant::<i64>("answer").unwrap_err().is_not_found());
    }
}
