use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    descriptor::{Descriptor, Injectable},
    error::{display_error, display_error_chain},
};

/// Variable read by [`detect`].
pub const ENV_VAR: &str = "APP_ENV";

/// The deployment environment the application runs in.
///
/// Its name selects environment-specific implementations and property
/// sections. The environment itself is bound as `dyn Environment`.
pub trait Environment: Send + Sync {
    fn name(&self) -> &str;

    /// Whether loaded resources are kept in memory.
    fn is_cache_enabled(&self) -> bool;

    /// Installs the process-wide panic hook.
    fn register_error_handler(&self, project_path: &Path) {
        install_panic_hook(project_path);
    }

    /// Reporter for errors that escape `Application::run`.
    fn exception_handler(&self, project_path: &Path) -> ExceptionHandler {
        ExceptionHandler::new(project_path, false)
    }
}

impl Injectable for dyn Environment {
    fn descriptor() -> Descriptor {
        Descriptor::opaque::<Self>()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Development;

impl Environment for Development {
    fn name(&self) -> &str {
        "DEV"
    }

    fn is_cache_enabled(&self) -> bool {
        false
    }

    fn exception_handler(&self, project_path: &Path) -> ExceptionHandler {
        ExceptionHandler::new(project_path, true)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Production;

impl Environment for Production {
    fn name(&self) -> &str {
        "PROD"
    }

    fn is_cache_enabled(&self) -> bool {
        true
    }
}

/// Leaves the panic hook alone so the test harness keeps reporting panics.
#[derive(Clone, Copy, Debug, Default)]
pub struct Testing;

impl Environment for Testing {
    fn name(&self) -> &str {
        "TEST"
    }

    fn is_cache_enabled(&self) -> bool {
        false
    }

    fn register_error_handler(&self, _project_path: &Path) {}
}

/// Built-in environment by name or alias, case-insensitive.
pub fn from_name(name: &str) -> Option<Arc<dyn Environment>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "dev" | "development" => Some(Arc::new(Development)),
        "prod" | "production" => Some(Arc::new(Production)),
        "test" | "testing" => Some(Arc::new(Testing)),
        _ => None,
    }
}

/// The environment named by `APP_ENV`, or production.
pub fn detect() -> Arc<dyn Environment> {
    detect_from(std::env::var(ENV_VAR).ok().as_deref())
}

pub fn detect_from(name: Option<&str>) -> Arc<dyn Environment> {
    match name {
        Some(name) => from_name(name).unwrap_or_else(|| {
            tracing::warn!("Unknown environment `{name}` in {ENV_VAR}, using PROD.");
            Arc::new(Production)
        }),
        None => Arc::new(Production),
    }
}

fn install_panic_hook(project_path: &Path) {
    let root = project_path.to_path_buf();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(project = %root.display(), "panic: {info}");
    }));
}

/// Logs errors that reach the top of the application.
#[derive(Clone, Debug)]
pub struct ExceptionHandler {
    project_path: PathBuf,
    backtrace: bool,
}

impl ExceptionHandler {
    pub fn new(project_path: impl Into<PathBuf>, backtrace: bool) -> Self {
        Self {
            project_path: project_path.into(),
            backtrace,
        }
    }

    /// Logs the error with its cause chain, and returns what was logged.
    pub fn handle(&self, error: &anyhow::Error) -> String {
        let rendered = if self.backtrace {
            display_error(error)
        } else {
            display_error_chain(error)
        };
        tracing::error!(project = %self.project_path.display(), "Unhandled error: {rendered}");
        rendered
    }

    pub fn shows_backtrace(&self) -> bool {
        self.backtrace
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("DEV", "DEV")]
    #[case("development", "DEV")]
    #[case("Prod", "PROD")]
    #[case(" test ", "TEST")]
    #[case("testing", "TEST")]
    fn built_in_environments_by_name(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(expected, from_name(name).unwrap().name());
    }

    #[test]
    fn unknown_names_fall_back_to_production() {
        assert!(from_name("staging").is_none());
        assert_eq!("PROD", detect_from(Some("staging")).name());
        assert_eq!("PROD", detect_from(None).name());
        assert_eq!("DEV", detect_from(Some("dev")).name());
    }

    #[test]
    fn only_production_caches() {
        assert!(Production.is_cache_enabled());
        assert!(!Development.is_cache_enabled());
        assert!(!Testing.is_cache_enabled());
    }

    #[test]
    fn development_reports_backtraces() {
        let root = Path::new("/srv/app");
        assert!(Development.exception_handler(root).shows_backtrace());
        assert!(!Production.exception_handler(root).shows_backtrace());
        let handled = Production
            .exception_handler(root)
            .handle(&anyhow!("disk full").context("saving order"));
        assert_eq!("saving order, caused by: disk full", handled);
    }
}
