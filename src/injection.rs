use std::{collections::VecDeque, sync::Arc};

use indexmap::IndexMap;

use crate::{
    descriptor::{
        Annotation, AnnotationKind, Construction, Constructor, Descriptor, Hint, Injectable,
        Kind, Parameter, TypeRef,
    },
    error::{InjectError, Result},
    injector::Injector,
    instance::Instance,
    key::{marker, Qualifier, TypeKey},
    parse::{FromValue, Value},
};

/// A constructor argument type: declares how it is looked up and converts the
/// resolved instance.
pub trait Dependency: Sized + Send + Sync + 'static {
    fn hint() -> Hint {
        Hint::Scalar
    }

    fn from_instance(instance: &Instance) -> Option<Self>;

    fn into_instance(self) -> Instance {
        Instance::new(self)
    }
}

/// A value that can be an element of a list or map binding.
pub trait Element: Clone + Send + Sync + 'static {
    fn from_element(instance: &Instance) -> Option<Self>;

    fn into_element(self) -> Instance;
}

impl<T: ?Sized + Injectable> Dependency for Arc<T> {
    fn hint() -> Hint {
        Hint::Class(TypeRef::of::<T>())
    }

    fn from_instance(instance: &Instance) -> Option<Self> {
        instance.downcast::<T>()
    }

    fn into_instance(self) -> Instance {
        Instance::from_arc(self)
    }
}

impl<T: ?Sized + Send + Sync + 'static> Element for Arc<T> {
    fn from_element(instance: &Instance) -> Option<Self> {
        instance.downcast::<T>()
    }

    fn into_element(self) -> Instance {
        Instance::from_arc(self)
    }
}

impl Dependency for Instance {
    fn from_instance(instance: &Instance) -> Option<Self> {
        Some(instance.clone())
    }

    fn into_instance(self) -> Instance {
        self
    }
}

impl Element for Instance {
    fn from_element(instance: &Instance) -> Option<Self> {
        Some(instance.clone())
    }

    fn into_element(self) -> Instance {
        self
    }
}

impl Dependency for Injector {
    fn hint() -> Hint {
        Hint::Class(TypeRef::of::<Injector>())
    }

    fn from_instance(instance: &Instance) -> Option<Self> {
        instance.downcast::<Injector>().map(|injector| (*injector).clone())
    }
}

/// Scalars are bound as constants or properties. A literal of the exact type
/// is taken as is, otherwise a coerced property value is converted.
macro_rules! scalar {
    ($($Scalar:ty),*) => {
        $(
            impl Dependency for $Scalar {
                fn from_instance(instance: &Instance) -> Option<Self> {
                    scalar_from_instance(instance)
                }
            }

            impl Element for $Scalar {
                fn from_element(instance: &Instance) -> Option<Self> {
                    scalar_from_instance(instance)
                }

                fn into_element(self) -> Instance {
                    Instance::new(self)
                }
            }
        )*
    };
}
scalar!(i64, i32, u16, u32, u64, usize, f64, bool, String, Value);

fn scalar_from_instance<S>(instance: &Instance) -> Option<S>
where
    S: FromValue + Clone + Send + Sync + 'static,
{
    if let Some(value) = instance.downcast::<S>() {
        return Some((*value).clone());
    }
    instance
        .downcast::<Value>()
        .and_then(|value| S::from_value(&value))
}

impl<E: Element> Dependency for Vec<E> {
    fn from_instance(instance: &Instance) -> Option<Self> {
        if let Some(items) = instance.downcast::<Vec<Instance>>() {
            return items.iter().map(E::from_element).collect();
        }
        if let Some(value) = instance.downcast::<Value>() {
            if let Value::List(items) = &*value {
                return items
                    .iter()
                    .map(|item| E::from_element(&Instance::new(item.clone())))
                    .collect();
            }
        }
        instance.downcast::<Self>().map(|items| (*items).clone())
    }

    fn into_instance(self) -> Instance {
        Instance::new(self.into_iter().map(E::into_element).collect::<Vec<_>>())
    }
}

impl<E: Element> Dependency for IndexMap<String, E> {
    fn from_instance(instance: &Instance) -> Option<Self> {
        if let Some(entries) = instance.downcast::<IndexMap<String, Instance>>() {
            return entries
                .iter()
                .map(|(key, item)| Some((key.clone(), E::from_element(item)?)))
                .collect();
        }
        if let Some(value) = instance.downcast::<Value>() {
            if let Value::Map(entries) = &*value {
                return entries
                    .iter()
                    .map(|(key, item)| {
                        Some((key.clone(), E::from_element(&Instance::new(item.clone()))?))
                    })
                    .collect();
            }
        }
        instance.downcast::<Self>().map(|entries| (*entries).clone())
    }

    fn into_instance(self) -> Instance {
        Instance::new(
            self.into_iter()
                .map(|(key, item)| (key, item.into_element()))
                .collect::<IndexMap<_, _>>(),
        )
    }
}

/// Resolved constructor arguments, consumed in parameter order.
pub struct Arguments {
    owner: TypeKey,
    values: std::vec::IntoIter<(&'static str, Instance)>,
    stack: Vec<String>,
}

impl Arguments {
    pub fn new(owner: TypeKey, values: Vec<(&'static str, Instance)>) -> Self {
        Self {
            owner,
            values: values.into_iter(),
            stack: vec![],
        }
    }

    fn with_stack(mut self, stack: Vec<String>) -> Self {
        self.stack = stack;
        self
    }

    /// Takes the next argument as `D`.
    pub fn next<D: Dependency>(&mut self) -> Result<D> {
        let (name, instance) = self.values.next().ok_or_else(|| {
            InjectError::InvalidArgument(format!(
                "constructor of {} takes more arguments than it declares",
                self.owner
            ))
        })?;
        D::from_instance(&instance).ok_or_else(|| {
            InjectError::misconfigured(
                format!(
                    "parameter `{name}` of {}::new expects {}, but {} was injected",
                    self.owner,
                    crate::short_name::<D>(),
                    instance.type_key()
                ),
                self.stack.clone(),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.len() == 0
    }
}

/// Builds instances of classes that have no custom provider, by resolving each
/// constructor parameter through the injector.
pub struct DefaultInjectionProvider<'a> {
    injector: &'a Injector,
}

impl<'a> DefaultInjectionProvider<'a> {
    pub fn new(injector: &'a Injector) -> Self {
        Self { injector }
    }

    pub fn construct(&self, descriptor: &Descriptor) -> Result<Instance> {
        match descriptor.kind() {
            Kind::Class(Construction::NoArgs(create)) => Ok(create()),
            Kind::Class(Construction::Constructor(constructor)) => {
                self.invoke(descriptor.key(), constructor)
            }
            Kind::Interface(_) => Err(self
                .injector
                .misconfigured(format!("{} cannot be instantiated", descriptor.key()))),
        }
    }

    fn invoke(&self, owner: TypeKey, constructor: &Constructor) -> Result<Instance> {
        let mut untargeted: VecDeque<&Annotation> = constructor
            .annotations()
            .iter()
            .filter(|annotation| annotation.parameter().is_none())
            .collect();
        let mut values = Vec::with_capacity(constructor.params().len());
        for param in constructor.params() {
            let annotation = param
                .annotation()
                .or_else(|| {
                    constructor
                        .annotations()
                        .iter()
                        .find(|annotation| annotation.parameter() == Some(param.name()))
                })
                .or_else(|| untargeted.pop_front());
            let (ty, qualifier) = resolution_for(param, annotation);
            let qualifier = qualifier.as_ref();

            let value = if !self.injector.has_explicit_binding(ty.key(), qualifier)
                && param.has_default()
            {
                param.default()
            } else {
                None
            };
            let value = match value {
                Some(default) => default,
                None if !self.injector.probe(&ty, qualifier)? => {
                    return Err(self.injector.misconfigured(format!(
                        "cannot resolve parameter `{}: {}` of {owner}::new, no binding for {}",
                        param.name(),
                        crate::util::abs_to_rel_paths(param.type_name()),
                        label(&ty, qualifier),
                    )));
                }
                None => self.injector.resolve(&ty, qualifier)?,
            };
            values.push((param.name(), value));
        }
        constructor
            .invoke(&mut Arguments::new(owner, values).with_stack(self.injector.stack()))
    }
}

/// The type and qualifier a parameter is resolved with.
fn resolution_for(param: &Parameter, annotation: Option<&Annotation>) -> (TypeRef, Option<Qualifier>) {
    let qualifier = annotation.map(|annotation| annotation.qualifier().clone());
    let ty = match annotation.map(Annotation::kind) {
        Some(AnnotationKind::Property) => TypeRef::marker::<marker::Property>(),
        Some(AnnotationKind::List) => TypeRef::marker::<marker::List>(),
        Some(AnnotationKind::Map) => TypeRef::marker::<marker::Map>(),
        Some(AnnotationKind::Named) | None => match param.hint() {
            Hint::Class(ty) => ty,
            Hint::Scalar => TypeRef::marker::<marker::Constant>(),
        },
    };
    (ty, qualifier)
}

fn label(ty: &TypeRef, qualifier: Option<&Qualifier>) -> String {
    match qualifier {
        Some(qualifier) => format!("{}#{qualifier}", ty.key()),
        None => ty.key().to_string(),
    }
}
