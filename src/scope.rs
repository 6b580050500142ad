use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, RwLock};

use crate::{
    error::{InjectError, Result},
    instance::Instance,
    key::TypeKey,
};

/// Instance lifetime policy, independent of how instances are built.
///
/// On the first request for a type the scope invokes `provider` once and
/// caches the result. Later requests return the cached instance. Scopes never
/// evict on their own.
pub trait Scope: Send + Sync {
    fn get_instance(
        &self,
        key: TypeKey,
        provider: &mut dyn FnMut() -> Result<Instance>,
    ) -> Result<Instance>;
}

/// One instance per type for the life of the scope.
#[derive(Default)]
pub struct SingletonScope {
    instances: Mutex<HashMap<TypeKey, Instance>>,
}

impl SingletonScope {
    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.instances.lock().contains_key(key)
    }

    pub fn reset(&self) {
        self.instances.lock().clear();
    }
}

impl Scope for SingletonScope {
    fn get_instance(
        &self,
        key: TypeKey,
        provider: &mut dyn FnMut() -> Result<Instance>,
    ) -> Result<Instance> {
        if let Some(instance) = self.instances.lock().get(&key) {
            return Ok(instance.clone());
        }
        // the lock is released while building, since the provider may
        // resolve other singletons
        let instance = provider()?;
        tracing::debug!(%key, "singleton instantiated");
        Ok(self
            .instances
            .lock()
            .entry(key)
            .or_insert(instance)
            .clone())
    }
}

/// Key-value storage owned by the caller, e.g. a user session. Session-scoped
/// instances live exactly as long as the session's storage.
pub trait Session: Send + Sync {
    fn get(&self, key: &str) -> Option<Instance>;
    fn set(&self, key: &str, value: Instance);
}

/// In-memory session storage.
#[derive(Default)]
pub struct MemorySession {
    values: Mutex<HashMap<String, Instance>>,
}

impl MemorySession {
    pub fn invalidate(&self) {
        self.values.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl Session for MemorySession {
    fn get(&self, key: &str) -> Option<Instance> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: Instance) {
        self.values.lock().insert(key.to_owned(), value);
    }
}

/// One instance per type per attached session.
#[derive(Default)]
pub struct SessionScope {
    session: RwLock<Option<Arc<dyn Session>>>,
}

impl SessionScope {
    pub fn attach(&self, session: Arc<dyn Session>) {
        *self.session.write() = Some(session);
    }

    pub fn detach(&self) {
        *self.session.write() = None;
    }

    pub fn is_attached(&self) -> bool {
        self.session.read().is_some()
    }

    fn slot(key: &TypeKey) -> String {
        format!("ioc.session.{}", key.name())
    }
}

impl Scope for SessionScope {
    fn get_instance(
        &self,
        key: TypeKey,
        provider: &mut dyn FnMut() -> Result<Instance>,
    ) -> Result<Instance> {
        let session = self.session.read().clone().ok_or_else(|| {
            InjectError::ScopeViolation(format!(
                "{key} is session scoped but no session is attached"
            ))
        })?;
        let slot = Self::slot(&key);
        if let Some(instance) = session.get(&slot) {
            return Ok(instance);
        }
        let instance = provider()?;
        tracing::debug!(%key, "session instance stored");
        session.set(&slot, instance.clone());
        Ok(instance)
    }
}

/// The scopes shared by a binder and the injectors it produces.
#[derive(Default)]
pub struct Scopes {
    singleton: Arc<SingletonScope>,
    session: Arc<SessionScope>,
}

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(&self) -> Arc<dyn Scope> {
        self.singleton.clone()
    }

    pub fn session(&self) -> Arc<dyn Scope> {
        self.session.clone()
    }

    pub fn singletons(&self) -> &SingletonScope {
        &self.singleton
    }

    pub fn sessions(&self) -> &SessionScope {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting(calls: &AtomicUsize) -> impl FnMut() -> Result<Instance> + '_ {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok(Instance::new(n))
        }
    }

    #[test]
    fn singleton_invokes_provider_once_per_type() {
        let scope = SingletonScope::default();
        let calls = AtomicUsize::new(0);
        let first = scope
            .get_instance(TypeKey::of::<usize>(), &mut counting(&calls))
            .unwrap();
        let second = scope
            .get_instance(TypeKey::of::<usize>(), &mut counting(&calls))
            .unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(1, calls.load(Ordering::SeqCst));

        scope
            .get_instance(TypeKey::of::<String>(), &mut counting(&calls))
            .unwrap();
        assert_eq!(2, calls.load(Ordering::SeqCst));
        assert_eq!(2, scope.len());
    }

    #[test]
    fn singleton_does_not_cache_failures() {
        let scope = SingletonScope::default();
        let result = scope.get_instance(TypeKey::of::<usize>(), &mut || {
            Err(InjectError::InvalidArgument("boom".into()))
        });
        assert!(result.is_err());
        assert!(scope.is_empty());
    }

    #[test]
    fn session_scope_requires_a_session() {
        let scope = SessionScope::default();
        let calls = AtomicUsize::new(0);
        let error = scope
            .get_instance(TypeKey::of::<usize>(), &mut counting(&calls))
            .unwrap_err();
        assert!(matches!(error, InjectError::ScopeViolation(_)));
        assert_eq!(0, calls.load(Ordering::SeqCst));
    }

    #[test]
    fn session_scope_caches_in_the_session() {
        let scope = SessionScope::default();
        let session = Arc::new(MemorySession::default());
        scope.attach(session.clone());
        let calls = AtomicUsize::new(0);
        let first = scope
            .get_instance(TypeKey::of::<usize>(), &mut counting(&calls))
            .unwrap();
        let second = scope
            .get_instance(TypeKey::of::<usize>(), &mut counting(&calls))
            .unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(1, session.len());

        session.invalidate();
        let third = scope
            .get_instance(TypeKey::of::<usize>(), &mut counting(&calls))
            .unwrap();
        assert!(!first.ptr_eq(&third));
        assert_eq!(2, calls.load(Ordering::SeqCst));
    }

    #[test]
    fn detached_sessions_are_not_used() {
        let scope = SessionScope::default();
        scope.attach(Arc::new(MemorySession::default()));
        assert!(scope.is_attached());
        scope.detach();
        assert!(!scope.is_attached());
    }
}
