//! Handler for `org.jboss.modules.ModuleClassLoader`.
//!
//! A module class loader only knows its own module, but the module loader
//! that created it knows every module it has loaded (`moduleMap`), and the
//! module's dependency paths reach the loaders of modules it imports. Both
//! are walked, each distinct module once per extraction.

use crate::vfs;
use loaderscope_api::{
    IdentitySet, ObjRef, TypeRef, Value, describe_object, type_is_or_extends_or_implements,
};
use loaderscope_plugin::{ClasspathSink, LoaderHandler, OrderBuilder, ReflectionUtils};
use tracing::trace;

pub const MODULE_CLASS_LOADER: &str = "org.jboss.modules.ModuleClassLoader";

#[derive(Debug, Default, Clone, Copy)]
pub struct JBossClassLoaderHandler;

impl JBossClassLoaderHandler {
    pub fn new() -> Self {
        Self
    }

    /// Register the three candidate paths of one resource loader.
    fn handle_resource_loader(&self, resource_loader: &ObjRef, loader: &ObjRef, out: &dyn ClasspathSink) {
        let reflection = out.reflection();
        // VirtualFile for VFS loaders, Path for PathResourceLoader.
        let root = reflection.get_field(resource_loader, "root").unwrap_or(Value::Null);

        out.add_entry(vfs::jar_path_from_mount(&root, reflection), loader);
        out.add_entry(vfs::jar_path_from_physical_file(&root, reflection), loader);
        // JarFileResourceLoader
        out.add_entry(reflection.get_field(resource_loader, "fileOfJar"), loader);
    }

    fn handle_real_module(
        &self,
        module: Option<&ObjRef>,
        visited: &mut IdentitySet,
        loader: &ObjRef,
        out: &dyn ClasspathSink,
    ) {
        let Some(module) = module else {
            return;
        };
        if !visited.insert(module) {
            return;
        }
        let reflection = out.reflection();

        let module_loader = reflection
            .invoke_object(module, "getClassLoader")
            .unwrap_or_else(|| loader.clone());
        let resource_loaders = reflection
            .invoke_method(&module_loader, "getResourceLoaders", &[])
            .and_then(Value::into_list)
            .unwrap_or_default();
        trace!(
            "Module {} has {} resource loaders",
            describe(reflection, module),
            resource_loaders.len()
        );

        for resource_loader in resource_loaders {
            if let Some(resource_loader) = resource_loader.as_object() {
                self.handle_resource_loader(resource_loader, &module_loader, out);
            }
        }
    }
}

impl LoaderHandler for JBossClassLoaderHandler {
    fn name(&self) -> &str {
        "JBossClassLoaderHandler"
    }

    fn can_handle(&self, loader_type: &TypeRef) -> bool {
        type_is_or_extends_or_implements(loader_type, MODULE_CLASS_LOADER)
    }

    fn find_loader_order(&self, loader: &ObjRef, order: &mut dyn OrderBuilder) {
        let parent = order.reflection().invoke_object(loader, "getParent");
        order.delegate_to(parent.as_ref(), true);
        order.add(loader);
    }

    fn find_classpath_entries(&self, loader: &ObjRef, out: &dyn ClasspathSink) {
        let reflection = out.reflection();
        let module = reflection.invoke_object(loader, "getModule");
        let mut visited = IdentitySet::new();

        // Every module the caller's module loader knows about.
        let module_map = module
            .as_ref()
            .and_then(|m| reflection.invoke_object(m, "getCallerModuleLoader"))
            .and_then(|module_loader| reflection.get_field(&module_loader, "moduleMap"))
            .and_then(Value::into_map)
            .unwrap_or_default();
        for (_, future_module) in module_map {
            let real_module = future_module
                .as_object()
                .and_then(|f| reflection.invoke_object(f, "getModule"));
            self.handle_real_module(real_module.as_ref(), &mut visited, loader, out);
        }

        // Modules reachable through dependency paths: each local loader is an
        // inner class of a ModuleClassLoader, whose `module` is the target.
        let paths = module
            .as_ref()
            .and_then(|m| reflection.invoke_method(m, "getPaths", &[]))
            .and_then(Value::into_map)
            .unwrap_or_default();
        for (_, local_loaders) in paths {
            for local_loader in local_loaders.into_list().unwrap_or_default() {
                let real_module = local_loader
                    .as_object()
                    .and_then(|l| reflection.field_object(l, "this$0"))
                    .and_then(|module_class_loader| reflection.field_object(&module_class_loader, "module"));
                self.handle_real_module(real_module.as_ref(), &mut visited, loader, out);
            }
        }
    }
}

fn describe(reflection: &ReflectionUtils, module: &ObjRef) -> String {
    reflection
        .invoke_method(module, "getName", &[])
        .map(|name| name.describe())
        .unwrap_or_else(|| describe_object(module))
}
