//! Rules for producing a value for a `(type, qualifier)` key.

use crate::{
    error::Result,
    injector::Injector,
    instance::Instance,
    key::{BindingKey, Qualifier},
};

mod class;
mod constant;
mod multi;
mod property;

pub use class::ClassBinding;
pub use constant::ConstantBinding;
pub use multi::{EntryClosure, EntryKey, EntrySource, ListBinding, MapBinding};
pub use property::PropertyBinding;

pub trait Binding: Send + Sync {
    /// The key this binding is registered under.
    fn key(&self) -> BindingKey;

    /// Produces the value. The qualifier is the one the value was requested
    /// with, which matters for constants, properties and multi-bindings.
    fn get_instance(&self, injector: &Injector, qualifier: Option<&Qualifier>) -> Result<Instance>;

    /// Whether a value exists for the qualifier. Only properties, whose
    /// presence is per key, can say no.
    fn has_value(&self, _qualifier: Option<&Qualifier>) -> bool {
        true
    }
}

/// Wraps a pre-built value and always returns the same reference.
#[derive(Clone, Debug)]
pub struct InstanceBinding {
    key: BindingKey,
    instance: Instance,
}

impl InstanceBinding {
    pub fn new(key: BindingKey, instance: Instance) -> Self {
        Self { key, instance }
    }
}

impl Binding for InstanceBinding {
    fn key(&self) -> BindingKey {
        self.key.clone()
    }

    fn get_instance(&self, _injector: &Injector, _qualifier: Option<&Qualifier>) -> Result<Instance> {
        Ok(self.instance.clone())
    }
}
