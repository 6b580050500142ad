use once_cell::sync::Lazy;
use regex::Regex;

#[macro_export]
macro_rules! newtype {
    (
        $(#[$outer:meta])*
        $viz:vis $Name:ident $(<$($G:ident),+>)? ($iviz:vis $Inner:ty)
    ) => {
        $(#[$outer])*
        $viz struct $Name $(<$($G),+>)? ($iviz $Inner);
        impl$(<$($G),+>)? $Name$(<$($G),+>)? {
            pub fn new(inner: $Inner) -> Self {
                Self(inner)
            }
        }
        impl $(<$($G),+>)? std::ops::Deref for $Name $(<$($G),+>)? {
            type Target = $Inner;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

pub fn short_name<T: ?Sized>() -> String {
    abs_to_rel_paths(std::any::type_name::<T>())
}

static MODULE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new("[_a-zA-Z0-9]*::").expect("module path pattern is valid"));

pub(crate) fn abs_to_rel_paths(s: &str) -> String {
    MODULE_PATH.replace_all(s, "").into()
}

#[test]
fn abs_to_rel_paths_works() {
    assert_eq!(
        "Arc<dyn Repository>",
        abs_to_rel_paths("alloc::sync::Arc<dyn my_app::storage::Repository>")
    );
    assert_eq!(
        "Vec<Instance>",
        abs_to_rel_paths("alloc::vec::Vec<ioc_frame::instance::Instance>")
    );
    assert_eq!(
        "IndexMap<String, Arc<dyn Handler>>",
        abs_to_rel_paths(
            "indexmap::map::IndexMap<alloc::string::String, alloc::sync::Arc<dyn my_app::http::Handler>>"
        )
    );
    assert_eq!(
        "dyn Environment",
        abs_to_rel_paths("dyn ioc_frame::environment::Environment")
    );
    assert_eq!("Injector", abs_to_rel_paths("ioc_frame::injector::Injector"));
    assert_eq!("UserService", abs_to_rel_paths("my_app::service::UserService"));
    assert_eq!("i64", abs_to_rel_paths("i64"));
}

#[test]
fn short_name_strips_paths_from_generic_arguments() {
    assert_eq!(
        "Option<Vec<String>>",
        short_name::<Option<Vec<String>>>()
    );
}
