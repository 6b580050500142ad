/// Failures raised while binding or resolving dependencies.
///
/// Every variant is terminal for the resolution that raised it. Variants that
/// arise mid-resolution carry the injection stack at the time of failure,
/// outermost request first.
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    /// No explicit or implicit binding exists for the requested key.
    #[error("no binding found for {key}; injection stack: {}", render_stack(.stack))]
    BindingNotFound { key: String, stack: Vec<String> },

    /// A binding exists but cannot produce a value of the expected shape:
    /// providers that are not providers, interfaces without an applicable
    /// implementation, element type mismatches, unresolvable parameters.
    #[error("{message}; injection stack: {}", render_stack(.stack))]
    Misconfigured { message: String, stack: Vec<String> },

    /// Malformed call pattern, e.g. a property lookup without a name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A scope was used before its preconditions were met.
    #[error("scope precondition violated: {0}")]
    ScopeViolation(String),

    /// A constructor dependency chain led back to a key still being resolved.
    #[error("circular dependency on {key}; injection stack: {}", render_stack(.stack))]
    CircularDependency { key: String, stack: Vec<String> },
}

pub type Result<T, E = InjectError> = std::result::Result<T, E>;

impl InjectError {
    pub fn misconfigured(message: impl Into<String>, stack: Vec<String>) -> Self {
        Self::Misconfigured {
            message: message.into(),
            stack,
        }
    }

    /// The injection stack recorded with the error, if any.
    pub fn stack(&self) -> &[String] {
        match self {
            InjectError::BindingNotFound { stack, .. }
            | InjectError::Misconfigured { stack, .. }
            | InjectError::CircularDependency { stack, .. } => stack.as_slice(),
            InjectError::InvalidArgument(_) | InjectError::ScopeViolation(_) => &[],
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, InjectError::BindingNotFound { .. })
    }
}

fn render_stack(stack: &[String]) -> String {
    if stack.is_empty() {
        "(empty)".into()
    } else {
        stack.join(" -> ")
    }
}

/// Logs errors on their way up without swallowing them.
pub trait LogError<T>: Sized {
    /// Logs if there was an error and converts the result into an option
    fn log(self) -> Option<T>;

    /// Logs if there was an error and returns the result unchanged
    fn log_passthrough(self) -> Self {
        self.log_as_passthrough(tracing::log::Level::Error)
    }

    /// Logs if there was an error with a message and returns the result unchanged
    fn log_context_passthrough(self, ctx: &str) -> Self {
        self.log_with_context_as_passthrough(tracing::log::Level::Error, || ctx.into())
    }

    /// Logs if there was an error at the provided log level, and returns the result unchanged
    fn log_as_passthrough(self, level: tracing::log::Level) -> Self;

    /// Lazily logs if there was an error with a message at the provided log level, and returns the result unchanged
    fn log_with_context_as_passthrough<Ctx: Fn() -> String>(
        self,
        level: tracing::log::Level,
        ctx: Ctx,
    ) -> Self;
}

impl<T, E: std::fmt::Display + 'static> LogError<T> for Result<T, E> {
    fn log(self) -> Option<T> {
        self.log_passthrough().ok()
    }

    fn log_as_passthrough(self, level: tracing::log::Level) -> Self {
        self.map_err(|e| {
            let es = display_error(&e);
            log!(level, "{es}");
            e
        })
    }

    fn log_with_context_as_passthrough<Ctx: Fn() -> String>(
        self,
        level: tracing::log::Level,
        ctx: Ctx,
    ) -> Self {
        self.map_err(|e| {
            let ctx = ctx();
            let es = display_error(&e);
            log!(level, "error: `{ctx}` - {es}");
            e
        })
    }
}

macro_rules! log {
    ($level:expr, $($args:tt),*) => {
        match $level {
            tracing::log::Level::Error => tracing::error!($($args),*),
            tracing::log::Level::Warn => tracing::warn!($($args),*),
            tracing::log::Level::Info => tracing::info!($($args),*),
            tracing::log::Level::Debug => tracing::debug!($($args),*),
            tracing::log::Level::Trace => tracing::trace!($($args),*),
        };
    };
}
pub(crate) use log;

/// Renders anyhow errors with their cause chain and backtrace, and any other
/// error with its plain display string.
pub fn display_error<E: std::fmt::Display + 'static>(e: &E) -> String {
    match (e as &dyn std::any::Any).downcast_ref::<anyhow::Error>() {
        Some(error) => {
            let mut s = String::new();
            // writing into a String cannot fail
            let _ = format_anyhow(error, &mut s, true);
            s
        }
        None => format!("{e}"),
    }
}

/// Like `display_error` for anyhow errors, without the backtrace.
pub fn display_error_chain(e: &anyhow::Error) -> String {
    let mut s = String::new();
    let _ = format_anyhow(e, &mut s, false);
    s
}

fn format_anyhow<W: std::fmt::Write>(
    e: &anyhow::Error,
    f: &mut W,
    backtrace: bool,
) -> std::fmt::Result {
    write!(f, "{}", e)?;
    for i in e.chain().skip(1) {
        write!(f, ", caused by: {}", i)?;
    }
    if backtrace {
        write!(f, "\nstack backtrace:\n{}", e.backtrace())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn messages_include_the_injection_stack() {
        let error = InjectError::BindingNotFound {
            key: "dyn Repository".into(),
            stack: vec!["UserService".into(), "dyn Repository".into()],
        };
        assert_eq!(
            "no binding found for dyn Repository; injection stack: UserService -> dyn Repository",
            error.to_string()
        );
        assert!(error.is_not_found());
        assert_eq!(2, error.stack().len());
    }

    #[test]
    fn empty_stacks_are_labelled() {
        let error = InjectError::misconfigured("bad provider", vec![]);
        assert_eq!("bad provider; injection stack: (empty)", error.to_string());
    }

    #[test]
    fn anyhow_chains_are_rendered() {
        let error = Err::<(), _>(InjectError::InvalidArgument("property name required".into()))
            .context("resolving greeting")
            .unwrap_err();
        assert_eq!(
            "resolving greeting, caused by: invalid argument: property name required",
            display_error_chain(&error)
        );
        assert!(display_error(&error).starts_with("resolving greeting, caused by"));
    }

    #[test]
    fn passthrough_keeps_the_error() {
        let result: Result<(), InjectError> =
            Err(InjectError::ScopeViolation("no session".into()));
        assert!(result.log_context_passthrough("testing").is_err());
        let ok: Result<u8, InjectError> = Ok(1);
        assert_eq!(Some(1), ok.log());
        let failed: Result<u8, InjectError> = Err(InjectError::InvalidArgument("bad".into()));
        assert_eq!(None, failed.log());
    }
}
