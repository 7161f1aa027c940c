//! Catch-all handler for loaders no registered handler recognises.
//!
//! Assumes the common shape of a URL-style loader: a `getParent()` to
//! delegate to and one of a handful of conventionally named members that
//! hold its classpath.

use crate::discovery::classpath::is_url;
use loaderscope_api::{ObjRef, TypeRef, Value};
use loaderscope_plugin::{ClasspathSink, LoaderHandler, OrderBuilder};

const CLASSPATH_METHODS: &[&str] = &[
    "getURLs",
    "getClassPath",
    "getClasspath",
    "getPath",
    "getPaths",
];

const CLASSPATH_FIELDS: &[&str] = &["classpath", "classPath", "cp", "urls", "path", "paths"];

pub struct FallbackClassLoaderHandler;

impl FallbackClassLoaderHandler {
    fn add_value(value: Value, loader: &ObjRef, out: &dyn ClasspathSink) {
        match value {
            Value::List(items) => {
                for item in items {
                    if !matches!(item, Value::List(_)) {
                        Self::add_value(item, loader, out);
                    }
                }
            }
            // A URL is one entry; the sink knows how to read it.
            Value::Str(url) if is_url(&url) => {
                out.add_entry(Some(Value::Str(url)), loader);
            }
            // A path-separator-delimited classpath string
            Value::Str(classpath) => {
                for path in std::env::split_paths(&classpath) {
                    if !path.as_os_str().is_empty() {
                        out.add_entry(Some(Value::File(path)), loader);
                    }
                }
            }
            other => {
                out.add_entry(other.non_null(), loader);
            }
        }
    }
}

impl LoaderHandler for FallbackClassLoaderHandler {
    fn name(&self) -> &str {
        "FallbackClassLoaderHandler"
    }

    fn can_handle(&self, _loader_type: &TypeRef) -> bool {
        true
    }

    fn find_loader_order(&self, loader: &ObjRef, order: &mut dyn OrderBuilder) {
        let parent = order.reflection().invoke_object(loader, "getParent");
        order.delegate_to(parent.as_ref(), true);
        order.add(loader);
    }

    fn find_classpath_entries(&self, loader: &ObjRef, out: &dyn ClasspathSink) {
        let reflection = out.reflection();
        for method in CLASSPATH_METHODS {
            if let Some(value) = reflection.invoke_method(loader, method, &[]) {
                Self::add_value(value, loader, out);
            }
        }
        for field in CLASSPATH_FIELDS {
            if let Some(value) = reflection.get_field(loader, field) {
                Self::add_value(value, loader, out);
            }
        }
    }
}
