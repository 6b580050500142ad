use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use parking_lot::Mutex;

use crate::{
    descriptor::{Descriptor, Injectable},
    newtype,
};

newtype!(
    /// Root directory of the application, bound during bootstrap.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub ProjectPath(pub PathBuf)
);

impl Injectable for ProjectPath {
    fn descriptor() -> Descriptor {
        Descriptor::opaque::<Self>()
    }
}

/// Loads text resources relative to the project root.
pub struct ResourceLoader {
    root: PathBuf,
    cache: Option<Mutex<HashMap<PathBuf, Arc<str>>>>,
}

impl ResourceLoader {
    pub fn new(root: impl Into<PathBuf>, cache_enabled: bool) -> Self {
        Self {
            root: root.into(),
            cache: cache_enabled.then(Default::default),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute names are used as is.
    pub fn path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.root.join(name)
    }

    pub fn exists(&self, name: impl AsRef<Path>) -> bool {
        self.path(name).is_file()
    }

    pub fn load(&self, name: impl AsRef<Path>) -> anyhow::Result<Arc<str>> {
        let path = self.path(name);
        if let Some(cache) = &self.cache {
            if let Some(text) = cache.lock().get(&path) {
                return Ok(text.clone());
            }
        }
        let text: Arc<str> = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to load resource {}", path.display()))?
            .into();
        if let Some(cache) = &self.cache {
            tracing::debug!(path = %path.display(), "resource cached");
            cache.lock().insert(path, text.clone());
        }
        Ok(text)
    }
}

impl Injectable for ResourceLoader {
    fn descriptor() -> Descriptor {
        Descriptor::opaque::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_relative_to_the_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("templates")).unwrap();
        std::fs::write(dir.path().join("templates/hello.txt"), "hello").unwrap();
        let loader = ResourceLoader::new(dir.path(), false);
        assert!(loader.exists("templates/hello.txt"));
        assert!(!loader.exists("templates"));
        assert_eq!("hello", &*loader.load("templates/hello.txt").unwrap());
        let error = loader.load("missing.txt").unwrap_err();
        assert!(error.to_string().contains("missing.txt"));
    }

    #[test]
    fn cached_resources_survive_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.html");
        std::fs::write(&file, "v1").unwrap();
        let cached = ResourceLoader::new(dir.path(), true);
        let uncached = ResourceLoader::new(dir.path(), false);
        assert_eq!("v1", &*cached.load("page.html").unwrap());
        std::fs::write(&file, "v2").unwrap();
        assert_eq!("v1", &*cached.load("page.html").unwrap());
        assert_eq!("v2", &*uncached.load("page.html").unwrap());
    }
}
