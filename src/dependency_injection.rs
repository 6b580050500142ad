//! Declarative macros that generate [`Injectable`](crate::Injectable)
//! descriptors, so types don't need hand-written metadata.

/// Defines a struct and makes it injectable through a constructor that takes
/// every field, in declaration order.
///
/// Fields may carry one annotation, `#[named(..)]`, `#[property(..)]`,
/// `#[list(..)]` or `#[map(..)]`, and a default used when nothing is bound
/// explicitly for them. Flags before the struct (`@singleton`) are applied to
/// the descriptor.
///
/// ```rust
/// use std::sync::Arc;
/// use ioc_frame::{inject, Binder};
///
/// inject!(
///     @singleton
///     pub struct Server {
///         #[property("port")]
///         pub port: u16 = 8080,
///         #[named("greeting")]
///         pub greeting: String,
///     }
/// );
///
/// let mut binder = Binder::new();
/// binder.bind_constant("greeting").to("hello".to_string());
/// let server = binder.get_injector().get_instance::<Server>().unwrap();
/// assert_eq!(8080, server.port);
/// assert_eq!("hello", server.greeting);
/// ```
#[macro_export]
macro_rules! inject {
    (
        $(#[$outer:meta])*
        $(@$flag:ident)*
        $viz:vis struct $Name:ident {
            $(
                $(#[$kind:ident($q:expr)])?
                $fviz:vis $field:ident: $FieldType:ty $(= $default:expr)?
            ),*$(,)?
        }
    ) => {
        $(#[$outer])*
        $viz struct $Name {
            $($fviz $field: $FieldType),*
        }
        impl $crate::Injectable for $Name {
            fn descriptor() -> $crate::Descriptor {
                $crate::Descriptor::constructed::<$Name>(
                    $crate::Constructor::new(|args: &mut $crate::Arguments| {
                        Ok($Name { $($field: args.next()?),* })
                    })
                    $(
                        .param(
                            $crate::Parameter::new::<$FieldType>(stringify!($field))
                                $(.annotated($crate::Annotation::$kind($q)))?
                                $(.default_value::<$FieldType, _>(|| $default))?
                        )
                    )*
                )
                $(.$flag())*
                .build()
            }
        }
    };
}

/// Declares upcasts from an implementation to the interfaces it implements,
/// for use with `Binder::bind::<dyn I>().to::<Impl>()` and typed lists.
#[macro_export]
macro_rules! implements {
    ($Impl:ty => $($Iface:ty),+ $(,)?) => {
        $(
            impl $crate::Implements<$Iface> for $Impl {
                fn upcast(this: std::sync::Arc<Self>) -> std::sync::Arc<$Iface> {
                    this
                }
            }
        )+
    };
}

/// Makes a trait object injectable, optionally with implementations the
/// injector picks by environment when the interface is not bound explicitly.
///
/// An implementation without environment is the default. The upcast of each
/// listed implementation is generated, so it must not also be declared with
/// `implements!`.
///
/// ```rust
/// use ioc_frame::{inject, interface, Binder};
///
/// pub trait Mailer: Send + Sync {
///     fn send(&self) -> &'static str;
/// }
///
/// inject!(pub struct Smtp {});
/// inject!(pub struct Outbox {});
///
/// impl Mailer for Smtp {
///     fn send(&self) -> &'static str { "smtp" }
/// }
/// impl Mailer for Outbox {
///     fn send(&self) -> &'static str { "outbox" }
/// }
///
/// interface!(dyn Mailer => [Outbox: "DEV", Smtp]);
///
/// let mut binder = Binder::new();
/// binder.set_environment("dev");
/// let mailer = binder.get_injector().get_instance::<dyn Mailer>().unwrap();
/// assert_eq!("outbox", mailer.send());
/// ```
#[macro_export]
macro_rules! interface {
    (@env) => {
        None
    };
    (@env $env:literal) => {
        Some($env)
    };
    ($Iface:ty $(=> [$($Impl:ty $(: $env:literal)?),* $(,)?])?) => {
        impl $crate::Injectable for $Iface {
            fn descriptor() -> $crate::Descriptor {
                $crate::Descriptor::interface::<$Iface>()
                    $($(.implemented_by::<$Impl>($crate::interface!(@env $($env)?)))*)?
                    .build()
            }
        }
        $($(
            $crate::implements!($Impl => $Iface);
        )*)?
    };
}
