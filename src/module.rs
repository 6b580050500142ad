use std::path::Path;

use crate::{binder::Binder, util::short_name};

/// A unit of application configuration, applied to the binder during
/// bootstrap.
///
/// Modules run in registration order. Later modules overwrite type and
/// constant bindings of earlier ones and append to their list and map
/// bindings.
pub trait Module {
    fn configure(&self, binder: &mut Binder, project_path: &Path) -> anyhow::Result<()>;

    /// Used in logs.
    fn name(&self) -> String {
        short_name::<Self>()
    }
}

impl<F> Module for F
where
    F: Fn(&mut Binder, &Path) -> anyhow::Result<()>,
{
    fn configure(&self, binder: &mut Binder, project_path: &Path) -> anyhow::Result<()> {
        self(binder, project_path)
    }

    fn name(&self) -> String {
        "closure".into()
    }
}
