//! Explicit, strongly-typed metadata describing how a type is injected.
//!
//! Every type the injector can look up implements [`Injectable`], which
//! returns a [`Descriptor`]: whether the type is a class with a constructor or
//! an interface with candidate implementations, whether it is provided by a
//! provider type, and whether it is a singleton. Descriptors are normally
//! generated by the `inject!` and `interface!` macros.

use std::{marker::PhantomData, sync::Arc};

use crate::{
    error::Result,
    injection::{Arguments, Dependency},
    instance::Instance,
    key::{Qualifier, TypeKey},
    provider::{Provider, ProviderType},
};

/// A type that can be requested from the injector.
///
/// Interfaces are trait objects: implement this for `dyn MyTrait` (the trait
/// must have `Send + Sync` supertraits) to make `Arc<dyn MyTrait>` injectable.
pub trait Injectable: Send + Sync + 'static {
    fn descriptor() -> Descriptor;
}

/// Compile-time proof that `Self` can stand in for the interface `I`.
pub trait Implements<I: ?Sized>: Injectable {
    fn upcast(this: Arc<Self>) -> Arc<I>;
}

impl<T: Injectable> Implements<T> for T {
    fn upcast(this: Arc<Self>) -> Arc<T> {
        this
    }
}

/// A requested type: its key, plus the means to derive an implicit binding
/// for it. Reserved marker types have no descriptor.
#[derive(Clone, Copy)]
pub struct TypeRef {
    key: TypeKey,
    descriptor: Option<fn() -> Descriptor>,
}

impl TypeRef {
    pub fn of<T: ?Sized + Injectable>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            descriptor: Some(T::descriptor),
        }
    }

    /// A type that is only ever looked up in the binding index.
    pub fn marker<M: ?Sized + 'static>() -> Self {
        Self {
            key: TypeKey::of::<M>(),
            descriptor: None,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn descriptor(&self) -> Option<Descriptor> {
        self.descriptor.map(|describe| describe())
    }
}

impl std::fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

/// Converts an instance of an implementation into an instance of the bound
/// type. Returns `None` if the instance is not of the implementation type.
pub type Caster = fn(&Instance) -> Option<Instance>;

/// An implementation type together with its upcast to the bound type.
#[derive(Clone, Copy)]
pub struct Target {
    ty: TypeRef,
    cast: Caster,
}

impl Target {
    pub fn of<I, U>() -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        U: Implements<I>,
    {
        Self {
            ty: TypeRef::of::<U>(),
            cast: upcast::<I, U>,
        }
    }

    /// Binds a type to itself.
    pub fn itself(ty: TypeRef) -> Self {
        Self { ty, cast: identity }
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn cast(&self, instance: &Instance) -> Option<Instance> {
        (self.cast)(instance)
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Target({})", self.ty.key())
    }
}

fn upcast<I, U>(instance: &Instance) -> Option<Instance>
where
    I: ?Sized + Send + Sync + 'static,
    U: Implements<I>,
{
    instance
        .downcast::<U>()
        .map(|this| Instance::from_arc(U::upcast(this)))
}

fn identity(instance: &Instance) -> Option<Instance> {
    Some(instance.clone())
}

/// How the injector builds or locates a type.
pub struct Descriptor {
    key: TypeKey,
    kind: Kind,
    provided_by: Option<ProviderType>,
    singleton: bool,
}

pub enum Kind {
    /// A concrete type the injector can construct.
    Class(Construction),
    /// A type the injector cannot construct itself: a trait object with
    /// candidate implementations, or an externally supplied type when the list
    /// is empty.
    Interface(Vec<ImplementedBy>),
}

pub enum Construction {
    /// No declared constructor; built with no arguments.
    NoArgs(fn() -> Instance),
    Constructor(Constructor),
}

/// Candidate implementation of an interface, optionally restricted to one
/// environment.
#[derive(Clone, Debug)]
pub struct ImplementedBy {
    target: Target,
    environment: Option<String>,
}

impl ImplementedBy {
    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    /// Case-insensitive environment match. Unrestricted declarations never
    /// match a specific environment.
    pub fn matches(&self, environment: Option<&str>) -> bool {
        match (self.environment.as_deref(), environment) {
            (Some(own), Some(active)) => own.eq_ignore_ascii_case(active),
            _ => false,
        }
    }
}

impl Descriptor {
    /// A concrete type without a declared constructor.
    pub fn class<T: Injectable + Default>() -> DescriptorBuilder<T> {
        DescriptorBuilder::new(Kind::Class(Construction::NoArgs(default_instance::<T>)))
    }

    /// A concrete type built by the given constructor.
    pub fn constructed<T: Injectable>(constructor: Constructor) -> DescriptorBuilder<T> {
        DescriptorBuilder::new(Kind::Class(Construction::Constructor(constructor)))
    }

    pub fn interface<T: ?Sized + Injectable>() -> DescriptorBuilder<T> {
        DescriptorBuilder::new(Kind::Interface(vec![]))
    }

    /// A type that can only be bound explicitly, such as a handle created by
    /// the application itself.
    pub fn opaque<T: ?Sized + Injectable>() -> Descriptor {
        Self::interface::<T>().build()
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.kind, Kind::Interface(_))
    }

    pub fn implemented_by(&self) -> &[ImplementedBy] {
        match &self.kind {
            Kind::Interface(implementations) => implementations,
            Kind::Class(_) => &[],
        }
    }

    pub fn provided_by(&self) -> Option<&ProviderType> {
        self.provided_by.as_ref()
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }
}

fn default_instance<T: Default + Send + Sync + 'static>() -> Instance {
    Instance::new(T::default())
}

pub struct DescriptorBuilder<T: ?Sized> {
    descriptor: Descriptor,
    _type: PhantomData<fn(&T)>,
}

impl<T: ?Sized + Injectable> DescriptorBuilder<T> {
    fn new(kind: Kind) -> Self {
        Self {
            descriptor: Descriptor {
                key: TypeKey::of::<T>(),
                kind,
                provided_by: None,
                singleton: false,
            },
            _type: PhantomData,
        }
    }

    pub fn singleton(mut self) -> Self {
        self.descriptor.singleton = true;
        self
    }

    pub fn provided_by<P: Provider + Injectable>(mut self) -> Self {
        self.descriptor.provided_by = Some(ProviderType::of::<P>());
        self
    }

    /// Declares a candidate implementation. Has no effect on classes.
    pub fn implemented_by<U: Implements<T>>(mut self, environment: Option<&str>) -> Self {
        if let Kind::Interface(implementations) = &mut self.descriptor.kind {
            implementations.push(ImplementedBy {
                target: Target::of::<T, U>(),
                environment: environment.map(str::to_owned),
            });
        }
        self
    }

    pub fn build(self) -> Descriptor {
        self.descriptor
    }
}

type Factory = Arc<dyn Fn(&mut Arguments) -> Result<Instance> + Send + Sync>;

/// Parameter list and factory of a constructor.
pub struct Constructor {
    params: Vec<Parameter>,
    annotations: Vec<Annotation>,
    factory: Factory,
}

impl Constructor {
    /// `factory` receives the resolved arguments in parameter order.
    pub fn new<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&mut Arguments) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            params: vec![],
            annotations: vec![],
            factory: Arc::new(move |args| factory(args).map(Instance::new)),
        }
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    /// Constructor-level annotation. Applies to the parameter it targets (see
    /// [`Annotation::on`]) or else to the first parameter without its own
    /// annotation.
    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn invoke(&self, args: &mut Arguments) -> Result<Instance> {
        (self.factory)(args)
    }
}

/// The declared type of a constructor parameter.
#[derive(Clone, Copy, Debug)]
pub enum Hint {
    Class(TypeRef),
    /// Primitive or untyped; resolved as a constant.
    Scalar,
}

pub struct Parameter {
    name: &'static str,
    type_name: &'static str,
    hint: Hint,
    annotation: Option<Annotation>,
    default: Option<Arc<dyn Fn() -> Instance + Send + Sync>>,
}

impl Parameter {
    pub fn new<D: Dependency>(name: &'static str) -> Self {
        Self {
            name,
            type_name: std::any::type_name::<D>(),
            hint: D::hint(),
            annotation: None,
            default: None,
        }
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    /// Value used when nothing is explicitly bound for this parameter.
    pub fn default_value<D, F>(mut self, default: F) -> Self
    where
        D: Dependency,
        F: Fn() -> D + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(move || default().into_instance()));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn hint(&self) -> Hint {
        self.hint
    }

    pub fn annotation(&self) -> Option<&Annotation> {
        self.annotation.as_ref()
    }

    pub fn default(&self) -> Option<Instance> {
        self.default.as_ref().map(|default| default())
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotationKind {
    Named,
    Property,
    List,
    Map,
}

/// Qualifies how a parameter is resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    kind: AnnotationKind,
    qualifier: Qualifier,
    parameter: Option<&'static str>,
}

impl Annotation {
    pub fn named(qualifier: impl Into<Qualifier>) -> Self {
        Self::new(AnnotationKind::Named, qualifier.into())
    }

    pub fn property(name: impl Into<String>) -> Self {
        Self::new(AnnotationKind::Property, Qualifier::Named(name.into()))
    }

    pub fn list(qualifier: impl Into<Qualifier>) -> Self {
        Self::new(AnnotationKind::List, qualifier.into())
    }

    pub fn map(qualifier: impl Into<Qualifier>) -> Self {
        Self::new(AnnotationKind::Map, qualifier.into())
    }

    fn new(kind: AnnotationKind, qualifier: Qualifier) -> Self {
        Self {
            kind,
            qualifier,
            parameter: None,
        }
    }

    /// Targets a constructor-level annotation at one parameter.
    pub fn on(mut self, parameter: &'static str) -> Self {
        self.parameter = Some(parameter);
        self
    }

    pub fn kind(&self) -> AnnotationKind {
        self.kind
    }

    pub fn qualifier(&self) -> &Qualifier {
        &self.qualifier
    }

    pub fn parameter(&self) -> Option<&'static str> {
        self.parameter
    }
}
