use std::sync::Arc;

use crate::{
    binding::Binding,
    descriptor::{Target, TypeRef},
    error::Result,
    injection::DefaultInjectionProvider,
    injector::Injector,
    instance::Instance,
    key::{BindingKey, Qualifier},
    provider::ValueSource,
    scope::Scope,
};

/// Binds a type to a value source, optionally cached by a scope.
///
/// A fresh binding targets its own type, so concrete types build themselves
/// through their constructor.
#[derive(Clone)]
pub struct ClassBinding {
    ty: TypeRef,
    qualifier: Option<Qualifier>,
    source: ValueSource,
    scope: Option<Arc<dyn Scope>>,
}

impl ClassBinding {
    pub fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            qualifier: None,
            source: ValueSource::Implementation(Target::itself(ty)),
            scope: None,
        }
    }

    pub fn with_source(mut self, source: ValueSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_scope(mut self, scope: Option<Arc<dyn Scope>>) -> Self {
        self.scope = scope;
        self
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn source(&self) -> &ValueSource {
        &self.source
    }

    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }

    pub(crate) fn set_source(&mut self, source: ValueSource) {
        self.source = source;
    }

    pub(crate) fn set_scope(&mut self, scope: Arc<dyn Scope>) {
        self.scope = Some(scope);
    }

    pub(crate) fn set_qualifier(&mut self, qualifier: Qualifier) {
        self.qualifier = Some(qualifier);
    }

    /// Builds the bound type itself, or resolves the implementation through
    /// the injector so that its own binding applies. Instances are cached by
    /// implementation type.
    fn build(&self, injector: &Injector, target: &Target) -> Result<Instance> {
        let built = if target.ty().key() == self.ty.key() {
            self.construct(injector)?
        } else {
            let mut produce = || injector.resolve(target.ty(), None);
            match &self.scope {
                Some(scope) => scope.get_instance(target.ty().key(), &mut produce)?,
                None => produce()?,
            }
        };
        target.cast(&built).ok_or_else(|| {
            injector.misconfigured(format!(
                "{} cannot be bound to {}",
                built.type_key(),
                self.ty.key()
            ))
        })
    }

    /// Constructs the bound type, in the binding's scope or, for types
    /// declared as singletons, in the singleton scope.
    fn construct(&self, injector: &Injector) -> Result<Instance> {
        let descriptor = self.ty.descriptor().ok_or_else(|| {
            injector.misconfigured(format!("{} cannot be constructed", self.ty.key()))
        })?;
        let scope = self.scope.clone().or_else(|| {
            descriptor
                .is_singleton()
                .then(|| injector.scopes().singleton())
        });
        let mut produce = || DefaultInjectionProvider::new(injector).construct(&descriptor);
        match scope {
            Some(scope) => scope.get_instance(self.ty.key(), &mut produce),
            None => produce(),
        }
    }

    fn expect_bound_type(&self, injector: &Injector, produced: Instance) -> Result<Instance> {
        if produced.type_key() == self.ty.key() {
            Ok(produced)
        } else {
            Err(injector.misconfigured(format!(
                "binding for {} produced an instance of {}",
                self.key(),
                produced.type_key()
            )))
        }
    }
}

impl Binding for ClassBinding {
    fn key(&self) -> BindingKey {
        BindingKey::new(self.ty.key(), self.qualifier.clone())
    }

    fn get_instance(&self, injector: &Injector, qualifier: Option<&Qualifier>) -> Result<Instance> {
        match &self.source {
            ValueSource::Literal(instance) => Ok(instance.clone()),
            ValueSource::Implementation(target) => self.build(injector, target),
            source => {
                let produced = match &self.scope {
                    Some(scope) => scope.get_instance(self.ty.key(), &mut || {
                        source.produce(injector, qualifier)
                    })?,
                    None => source.produce(injector, qualifier)?,
                };
                self.expect_bound_type(injector, produced)
            }
        }
    }
}
