use std::{any::Any, fmt, sync::Arc};

use crate::key::TypeKey;

/// A type-erased, shared value produced by a binding.
///
/// Internally stores an `Arc<T>` for the bound type `T`, which may be unsized
/// (e.g. `dyn Repository`). The type key is the "instance of" check used by
/// bindings and multi-bindings.
#[derive(Clone)]
pub struct Instance {
    key: TypeKey,
    value: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            key: TypeKey::of::<T>(),
            value: Arc::new(value),
        }
    }

    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.key == TypeKey::of::<T>()
    }

    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    /// Whether both handles point at the same stored value.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    #[test]
    fn downcasts_to_the_stored_type_only() {
        let instance = Instance::new(42i64);
        assert!(instance.is::<i64>());
        assert_eq!(Some(42), instance.downcast::<i64>().map(|v| *v));
        assert!(instance.downcast::<i32>().is_none());
    }

    #[test]
    fn stores_trait_objects() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let instance = Instance::from_arc(greeter.clone());
        assert!(instance.is::<dyn Greeter>());
        assert!(!instance.is::<English>());
        let back = instance.downcast::<dyn Greeter>().unwrap();
        assert_eq!("hello", back.greet());
        assert!(Arc::ptr_eq(&greeter, &back));
    }

    #[test]
    fn clones_share_the_value() {
        let instance = Instance::new(String::from("x"));
        assert!(instance.ptr_eq(&instance.clone()));
        assert!(!instance.ptr_eq(&Instance::new(String::from("x"))));
    }
}
