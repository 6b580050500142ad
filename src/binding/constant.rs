use crate::{
    binding::Binding,
    error::Result,
    injector::Injector,
    instance::Instance,
    key::{marker, BindingKey, Qualifier, TypeKey},
    provider::ValueSource,
};

/// A named scalar or opaque value, or a provider producing one.
#[derive(Clone, Debug)]
pub struct ConstantBinding {
    name: String,
    source: Option<ValueSource>,
}

impl ConstantBinding {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_source(&mut self, source: ValueSource) {
        self.source = Some(source);
    }
}

impl Binding for ConstantBinding {
    fn key(&self) -> BindingKey {
        BindingKey::new(
            TypeKey::of::<marker::Constant>(),
            Some(Qualifier::named(self.name.as_str())),
        )
    }

    fn get_instance(&self, injector: &Injector, qualifier: Option<&Qualifier>) -> Result<Instance> {
        match &self.source {
            Some(source) => source.produce(injector, qualifier),
            None => Err(injector.misconfigured(format!(
                "constant `{}` was bound without a value",
                self.name
            ))),
        }
    }
}
