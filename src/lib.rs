//! IoC Frame is a runtime dependency injection container with a small
//! application bootstrap layer.
//!
//! Types describe how they are built through an explicit [`Descriptor`],
//! normally generated with the [`inject!`] and [`interface!`] macros. A
//! [`Binder`] collects bindings: types to implementations, instances,
//! providers or closures, named constants, lists, maps and configuration
//! properties. The [`Injector`] it produces resolves a requested type by
//! recursively building its constructor arguments. Concrete types that were
//! never bound are built implicitly, and interfaces can declare which
//! implementation to use per environment.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ioc_frame::{inject, interface, Binder};
//!
//! pub trait Repository: Send + Sync {
//!     fn find(&self, id: i64) -> Option<String>;
//! }
//!
//! inject!(
//!     @singleton
//!     pub struct MemoryRepository {}
//! );
//!
//! impl Repository for MemoryRepository {
//!     fn find(&self, id: i64) -> Option<String> {
//!         (id == 1).then(|| "alice".to_string())
//!     }
//! }
//!
//! interface!(dyn Repository => [MemoryRepository]);
//!
//! inject!(
//!     pub struct UserService {
//!         repository: Arc<dyn Repository>,
//!         #[named("greeting")]
//!         greeting: String,
//!         #[property("page_size")]
//!         page_size: i64 = 20,
//!     }
//! );
//!
//! impl UserService {
//!     fn greet(&self, id: i64) -> String {
//!         let name = self.repository.find(id).unwrap_or_default();
//!         format!("{} {name} ({})", self.greeting, self.page_size)
//!     }
//! }
//!
//! let mut binder = Binder::new();
//! binder.bind_constant("greeting").to("hello".to_string());
//! let injector = binder.get_injector();
//!
//! let service = injector.get_instance::<UserService>().unwrap();
//! assert_eq!("hello alice (20)", service.greet(1));
//! ```
//!
//! Applications usually go through [`App`](app::App), which binds the
//! environment, project path, resources and `config.toml` properties before
//! running the application's own modules:
//!
//! ```rust
//! use std::{path::Path, sync::Arc};
//!
//! use ioc_frame::{
//!     app::{App, Runtime},
//!     environment::{Environment, Testing},
//!     Binder,
//! };
//!
//! let mut runtime = Runtime::new();
//! let application = App::new(std::env::temp_dir())
//!     .with_environment(Arc::new(Testing))
//!     .with_module(|binder: &mut Binder, _: &Path| -> anyhow::Result<()> {
//!         binder.bind_constant("name").to("demo".to_string());
//!         Ok(())
//!     })
//!     .bootstrap(&mut runtime)
//!     .unwrap();
//!
//! let name = application
//!     .run(|injector| Ok(injector.get_constant::<String>("name")?))
//!     .unwrap();
//! assert_eq!("demo", name);
//! assert_eq!("TEST", application.environment().name());
//! ```

/// Application bootstrap: runtime state, modules and the running application.
pub mod app;
/// Collects bindings and produces injectors.
pub mod binder;
/// Type, constant, multi-value and property bindings.
pub mod binding;
/// Define a type as injectable with declarative macros.
pub mod dependency_injection;
/// Explicit type metadata consumed by the injector.
pub mod descriptor;
/// Deployment environments and top-level error reporting.
pub mod environment;
/// Simple and versatile error handling and logging.
pub mod error;
/// Constructor injection and typed argument conversion.
pub mod injection;
/// The resolution engine.
pub mod injector;
/// Type-erased instances.
pub mod instance;
/// Type identities, qualifiers and binding keys.
pub mod key;
/// Units of application configuration.
pub mod module;
/// Heuristic coercion of configuration strings into typed values.
pub mod parse;
/// Environment-scoped configuration values.
pub mod properties;
/// Custom value-producing strategies.
pub mod provider;
/// Project-relative resource loading.
pub mod resource;
/// Instance lifetime policies.
pub mod scope;

pub use binder::Binder;
pub use descriptor::{Annotation, Constructor, Descriptor, Implements, Injectable, Parameter};
pub use error::{InjectError, Result};
pub use injection::{Arguments, Dependency, Element};
pub use injector::Injector;
pub use instance::Instance;
pub use key::{BindingKey, Qualifier, TypeKey};
pub use provider::Provider;
pub use scope::{Scope, Session};

/// misc items that are too small to get their own files,
/// kept out of this file to reduce clutter.
mod util;
pub use util::*;
