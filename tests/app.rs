use std::{path::Path, sync::Arc};

use anyhow::{bail, Context};
use ioc_frame::{
    app::{App, Runtime, CONFIG_FILE},
    environment::{Environment, Production, Testing},
    inject,
    module::Module,
    properties::Properties,
    resource::{ProjectPath, ResourceLoader},
    Binder,
};
use tempfile::TempDir;

inject!(@singleton pub struct Catalog {});

inject!(
    pub struct Greeting {
        #[property("greeting")]
        pub text: String,
    }
);

struct Plugins;

impl Module for Plugins {
    fn configure(&self, binder: &mut Binder, _project_path: &Path) -> anyhow::Result<()> {
        binder.bind_list("plugins").add("core".to_string());
        binder.bind_constant("title").to("plugins".to_string());
        Ok(())
    }
}

struct Extras;

impl Module for Extras {
    fn configure(&self, binder: &mut Binder, _project_path: &Path) -> anyhow::Result<()> {
        binder.bind_list("plugins").add("extra".to_string());
        binder.bind_constant("title").to("extras".to_string());
        Ok(())
    }
}

struct Broken;

impl Module for Broken {
    fn configure(&self, _binder: &mut Binder, _project_path: &Path) -> anyhow::Result<()> {
        bail!("database url missing")
    }
}

fn project(config: Option<&str>) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    if let Some(config) = config {
        std::fs::write(dir.path().join(CONFIG_FILE), config).unwrap();
    }
    dir
}

const CONFIG: &str = r#"
greeting = "hello"

[TEST]
greeting = "hello from tests"
"#;

#[test]
fn bootstrap_binds_the_runtime() {
    let dir = project(Some(CONFIG));
    std::fs::write(dir.path().join("motd.txt"), "welcome").unwrap();
    let mut runtime = Runtime::new();
    let application = App::new(dir.path())
        .with_environment(Arc::new(Testing))
        .bootstrap(&mut runtime)
        .unwrap();
    let injector = application.injector();

    assert_eq!("TEST", injector.get_instance::<dyn Environment>().unwrap().name());
    assert_eq!(Some("TEST"), injector.environment());
    assert_eq!(
        dir.path(),
        injector.get_instance::<ProjectPath>().unwrap().as_path()
    );
    let loader = injector.get_instance::<ResourceLoader>().unwrap();
    assert_eq!("welcome", &*loader.load("motd.txt").unwrap());
    assert!(injector.get_named::<Properties>("properties").is_ok());
}

#[test]
fn config_properties_follow_the_environment() {
    let dir = project(Some(CONFIG));
    let mut runtime = Runtime::new();
    let testing = App::new(dir.path())
        .with_environment(Arc::new(Testing))
        .bootstrap(&mut runtime)
        .unwrap();
    assert_eq!(
        "hello from tests",
        testing.injector().get_instance::<Greeting>().unwrap().text
    );

    let production = App::new(dir.path())
        .with_environment(Arc::new(Production))
        .bootstrap(&mut runtime)
        .unwrap();
    assert_eq!(
        "hello",
        production.injector().get_property::<String>("greeting").unwrap()
    );
}

#[test]
fn projects_without_config_have_no_properties() {
    let dir = project(None);
    let application = App::new(dir.path())
        .with_environment(Arc::new(Testing))
        .bootstrap(&mut Runtime::new())
        .unwrap();
    assert!(application
        .injector()
        .get_property::<String>("greeting")
        .unwrap_err()
        .is_not_found());
}

#[test]
fn invalid_config_fails_the_bootstrap() {
    let dir = project(Some("greeting = "));
    let error = App::new(dir.path())
        .with_environment(Arc::new(Testing))
        .bootstrap(&mut Runtime::new())
        .err()
        .unwrap();
    assert!(format!("{error:#}").contains("invalid property file"), "{error:#}");
}

#[test]
fn modules_run_in_order() {
    let dir = project(None);
    let application = App::new(dir.path())
        .with_environment(Arc::new(Testing))
        .with_module(Plugins)
        .with_module(Extras)
        .bootstrap(&mut Runtime::new())
        .unwrap();
    let injector = application.injector();
    assert_eq!("extras", injector.get_constant::<String>("title").unwrap());
    assert_eq!(
        vec!["core".to_string(), "extra".to_string()],
        injector.get_list::<String>("plugins").unwrap()
    );
    assert_eq!("Plugins", Plugins.name());
}

#[test]
fn closures_are_modules() {
    let dir = project(None);
    let application = App::new(dir.path())
        .with_environment(Arc::new(Testing))
        .with_module(|binder: &mut Binder, project_path: &Path| -> anyhow::Result<()> {
            binder
                .bind_constant("root")
                .to(project_path.display().to_string());
            Ok(())
        })
        .bootstrap(&mut Runtime::new())
        .unwrap();
    assert_eq!(
        dir.path().display().to_string(),
        application.injector().get_constant::<String>("root").unwrap()
    );
}

#[test]
fn module_failures_name_the_module() {
    let dir = project(None);
    let error = App::new(dir.path())
        .with_environment(Arc::new(Testing))
        .with_module(Broken)
        .bootstrap(&mut Runtime::new())
        .err()
        .unwrap();
    let message = format!("{error:#}");
    assert!(message.contains("failed to configure module Broken"), "{message}");
    assert!(message.contains("database url missing"), "{message}");
}

#[test]
fn runtime_keeps_singletons_until_reset() {
    let dir = project(None);
    let mut runtime = Runtime::new();
    assert!(!runtime.is_initialized());
    let boot = |runtime: &mut Runtime| {
        App::new(dir.path())
            .with_environment(Arc::new(Testing))
            .bootstrap(runtime)
            .unwrap()
    };

    let first = boot(&mut runtime);
    assert!(runtime.is_initialized());
    let second = boot(&mut runtime);
    let a = first.injector().get_instance::<Catalog>().unwrap();
    let b = second.injector().get_instance::<Catalog>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    runtime.reset();
    assert!(!runtime.is_initialized());
    let third = boot(&mut runtime);
    let c = third.injector().get_instance::<Catalog>().unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn run_returns_the_result_of_the_entry_point() {
    let dir = project(None);
    let application = App::new(dir.path())
        .with_environment(Arc::new(Testing))
        .with_module(Plugins)
        .bootstrap(&mut Runtime::new())
        .unwrap();

    let title = application
        .run(|injector| Ok(injector.get_constant::<String>("title")?))
        .unwrap();
    assert_eq!("plugins", title);

    let error = application
        .run(|injector| -> anyhow::Result<()> {
            injector
                .get_constant::<String>("missing")
                .context("loading the missing constant")?;
            Ok(())
        })
        .unwrap_err();
    assert!(error.to_string().contains("loading the missing constant"));
}
