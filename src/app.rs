use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;

use crate::{
    binder::Binder,
    environment::{self, Environment, ExceptionHandler},
    error::LogError,
    injector::Injector,
    module::Module,
    resource::{ProjectPath, ResourceLoader},
    scope::Scopes,
};

/// Property file loaded from the project root when present.
pub const CONFIG_FILE: &str = "config.toml";

/// Process-level bootstrap state shared by successive bootstraps.
///
/// Error handlers are registered by the first bootstrap only. Singletons live
/// in the runtime's scopes, so they survive rebuilding the injector until
/// `reset` is called.
pub struct Runtime {
    initialized: bool,
    scopes: Arc<Scopes>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            initialized: false,
            scopes: Arc::new(Scopes::new()),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn scopes(&self) -> &Arc<Scopes> {
        &self.scopes
    }

    pub fn reset(&mut self) {
        self.initialized = false;
        self.scopes = Arc::new(Scopes::new());
    }
}

/// Describes an application before it is bootstrapped.
pub struct App {
    project_path: PathBuf,
    environment: Option<Arc<dyn Environment>>,
    modules: Vec<Box<dyn Module>>,
}

impl App {
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            environment: None,
            modules: vec![],
        }
    }

    /// Defaults to the environment named by `APP_ENV`.
    pub fn with_environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_module(mut self, module: impl Module + 'static) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Configures every module, in registration order after the built-in
    /// runtime bindings, and builds the injector.
    pub fn bootstrap(self, runtime: &mut Runtime) -> anyhow::Result<Application> {
        let environment = self.environment.unwrap_or_else(environment::detect);
        let project_path = self.project_path;
        tracing::info!(
            environment = environment.name(),
            project = %project_path.display(),
            "Bootstrapping application."
        );
        if !runtime.initialized {
            environment.register_error_handler(&project_path);
            runtime.initialized = true;
        }

        let mut binder = Binder::with_scopes(runtime.scopes.clone());
        binder.set_environment(environment.name());
        let modules = std::iter::once(Box::new(RuntimeModule {
            environment: environment.clone(),
        }) as Box<dyn Module>)
        .chain(self.modules);
        for module in modules {
            let name = module.name();
            tracing::debug!(module = %name, "Configuring module.");
            module
                .configure(&mut binder, &project_path)
                .with_context(|| format!("failed to configure module {name}"))
                .log_context_passthrough("bootstrap")?;
        }

        let exception_handler = environment.exception_handler(&project_path);
        Ok(Application {
            injector: binder.get_injector(),
            environment,
            exception_handler,
        })
    }
}

/// Binds what every application gets: the environment, the project path, a
/// resource loader, and the project's property file.
struct RuntimeModule {
    environment: Arc<dyn Environment>,
}

impl Module for RuntimeModule {
    fn configure(&self, binder: &mut Binder, project_path: &Path) -> anyhow::Result<()> {
        binder
            .bind::<dyn Environment>()
            .to_instance(self.environment.clone());
        binder
            .bind::<ProjectPath>()
            .to_instance(Arc::new(ProjectPath::new(project_path.to_path_buf())));
        binder
            .bind::<ResourceLoader>()
            .to_instance(Arc::new(ResourceLoader::new(
                project_path,
                self.environment.is_cache_enabled(),
            )));
        let config = project_path.join(CONFIG_FILE);
        if config.is_file() {
            binder.bind_properties_from_file(&config, self.environment.name())?;
        }
        Ok(())
    }
}

/// A bootstrapped application.
pub struct Application {
    injector: Injector,
    environment: Arc<dyn Environment>,
    exception_handler: ExceptionHandler,
}

impl Application {
    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    pub fn environment(&self) -> &Arc<dyn Environment> {
        &self.environment
    }

    /// Runs the entry point. Errors are reported through the environment's
    /// exception handler and returned.
    pub fn run<T>(&self, main: impl FnOnce(&Injector) -> anyhow::Result<T>) -> anyhow::Result<T> {
        tracing::info!("Running application.");
        main(&self.injector).map_err(|error| {
            self.exception_handler.handle(&error);
            error
        })
    }
}
