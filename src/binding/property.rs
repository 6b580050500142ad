use std::sync::Arc;

use crate::{
    binding::Binding,
    error::{InjectError, Result},
    injector::Injector,
    instance::Instance,
    key::{marker, BindingKey, Qualifier, TypeKey},
    properties::{PropertySource, DEFAULT_SCOPE},
};

/// Resolves named configuration values against the active environment's
/// section, falling back to the shared section.
#[derive(Clone)]
pub struct PropertyBinding {
    source: Arc<dyn PropertySource>,
    environment: String,
}

impl PropertyBinding {
    pub fn new(source: Arc<dyn PropertySource>, environment: impl Into<String>) -> Self {
        Self {
            source,
            environment: environment.into(),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Whether the property is defined for the environment or the shared
    /// section.
    pub fn contains(&self, name: &str) -> bool {
        self.source.contains(&self.environment, name) || self.source.contains(DEFAULT_SCOPE, name)
    }
}

impl std::fmt::Debug for PropertyBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PropertyBinding({})", self.environment)
    }
}

impl Binding for PropertyBinding {
    fn key(&self) -> BindingKey {
        BindingKey::unqualified(TypeKey::of::<marker::Property>())
    }

    fn get_instance(&self, injector: &Injector, qualifier: Option<&Qualifier>) -> Result<Instance> {
        let name = qualifier
            .and_then(Qualifier::as_name)
            .ok_or_else(|| InjectError::InvalidArgument("property name required".into()))?;
        let value = self
            .source
            .resolve(&self.environment, name)
            .or_else(|| self.source.resolve(DEFAULT_SCOPE, name))
            .ok_or_else(|| InjectError::BindingNotFound {
                key: format!("property `{name}` (environment {})", self.environment),
                stack: injector.stack(),
            })?;
        Ok(Instance::new(value.coerce()))
    }

    fn has_value(&self, qualifier: Option<&Qualifier>) -> bool {
        qualifier
            .and_then(Qualifier::as_name)
            .is_some_and(|name| self.contains(name))
    }
}
