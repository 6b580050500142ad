use std::sync::Arc;

use crate::{
    descriptor::{Injectable, Target, TypeRef},
    error::Result,
    injector::Injector,
    instance::Instance,
    key::Qualifier,
};

/// A custom strategy producing values on demand.
///
/// The qualifier the value was requested with is passed through, so one
/// provider can serve several named constants.
pub trait Provider: Send + Sync {
    fn get(&self, qualifier: Option<&Qualifier>) -> Result<Instance>;
}

/// A provider that is itself constructed by the injector.
#[derive(Clone, Copy)]
pub struct ProviderType {
    ty: TypeRef,
    cast: fn(&Instance) -> Option<Arc<dyn Provider>>,
}

impl ProviderType {
    pub fn of<P: Provider + Injectable>() -> Self {
        Self {
            ty: TypeRef::of::<P>(),
            cast: as_provider::<P>,
        }
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// Asks the injector for the provider type and checks that whatever is
    /// bound to it actually is the provider.
    pub fn instantiate(&self, injector: &Injector) -> Result<Arc<dyn Provider>> {
        let instance = injector.resolve(&self.ty, None)?;
        (self.cast)(&instance).ok_or_else(|| {
            injector.misconfigured(format!(
                "{} is bound to {}, which does not implement Provider",
                self.ty.key(),
                instance.type_key()
            ))
        })
    }
}

impl std::fmt::Debug for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProviderType({})", self.ty.key())
    }
}

fn as_provider<P: Provider + 'static>(instance: &Instance) -> Option<Arc<dyn Provider>> {
    instance
        .downcast::<P>()
        .map(|provider| provider as Arc<dyn Provider>)
}

pub type Closure = Arc<dyn Fn(&Injector, Option<&Qualifier>) -> Result<Instance> + Send + Sync>;

/// Where a binding gets its value from. A binding holds exactly one source.
#[derive(Clone)]
pub enum ValueSource {
    Literal(Instance),
    /// Built by the injector, then upcast to the bound type.
    Implementation(Target),
    Provider(Arc<dyn Provider>),
    ProviderType(ProviderType),
    Closure(Closure),
}

impl ValueSource {
    /// Produces a value. Implementations are resolved through the injector,
    /// so their own bindings and scopes apply.
    pub fn produce(&self, injector: &Injector, qualifier: Option<&Qualifier>) -> Result<Instance> {
        match self {
            ValueSource::Literal(instance) => Ok(instance.clone()),
            ValueSource::Implementation(target) => {
                let built = injector.resolve(target.ty(), None)?;
                target.cast(&built).ok_or_else(|| {
                    injector.misconfigured(format!(
                        "{} resolved to an instance of {}",
                        target.ty().key(),
                        built.type_key()
                    ))
                })
            }
            ValueSource::Provider(provider) => provider.get(qualifier),
            ValueSource::ProviderType(provider_type) => {
                provider_type.instantiate(injector)?.get(qualifier)
            }
            ValueSource::Closure(closure) => closure(injector, qualifier),
        }
    }
}

impl std::fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::Literal(instance) => write!(f, "Literal({})", instance.type_key()),
            ValueSource::Implementation(target) => {
                write!(f, "Implementation({})", target.ty().key())
            }
            ValueSource::Provider(_) => write!(f, "Provider"),
            ValueSource::ProviderType(provider_type) => {
                write!(f, "ProviderType({})", provider_type.ty().key())
            }
            ValueSource::Closure(_) => write!(f, "Closure"),
        }
    }
}
