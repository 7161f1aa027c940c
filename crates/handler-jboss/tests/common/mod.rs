#![allow(dead_code)]

use loaderscope_api::{DescribedObject, DescribedRuntime, DescribedType, ObjRef, TypeRef, Value};
use loaderscope_core::discovery::ClasspathOrder;
use loaderscope_core::handler::HandlerRegistry;
use loaderscope_core::{LoaderFinder, ScanSpec};
use loaderscope_jboss::JBossClassLoaderHandler;
use loaderscope_plugin::ReflectionUtils;
use std::path::Path;
use std::sync::Arc;

/// The JBoss Modules object graph, declared member by member.
pub struct JBossFixture {
    pub runtime: Arc<DescribedRuntime>,
    pub module_class_loader: TypeRef,
    pub local_loader: TypeRef,
    pub module: TypeRef,
    pub module_loader: TypeRef,
    pub future_module: TypeRef,
    pub jar_resource_loader: TypeRef,
    pub path_resource_loader: TypeRef,
    pub vfs_resource_loader: TypeRef,
    /// Kept concrete so tests can set its defining loader.
    pub virtual_file: Arc<DescribedType>,
}

impl JBossFixture {
    pub fn new() -> Self {
        let module_class_loader: TypeRef =
            DescribedType::new("org.jboss.modules.ModuleClassLoader").build();
        Self {
            runtime: Arc::new(DescribedRuntime::new()),
            local_loader: DescribedType::new("org.jboss.modules.ModuleClassLoader$1").build(),
            module: DescribedType::new("org.jboss.modules.Module").build(),
            module_loader: DescribedType::new("org.jboss.modules.ModuleLoader").build(),
            future_module: DescribedType::new("org.jboss.modules.ModuleLoader$FutureModule").build(),
            jar_resource_loader: DescribedType::new("org.jboss.modules.JarFileResourceLoader").build(),
            path_resource_loader: DescribedType::new("org.jboss.modules.PathResourceLoader").build(),
            vfs_resource_loader: DescribedType::new(
                "org.jboss.as.server.deployment.module.VFSResourceLoader",
            )
            .build(),
            virtual_file: DescribedType::new("org.jboss.vfs.VirtualFile").build(),
            module_class_loader,
        }
    }

    pub fn jar_resource_loader(&self, jar: &Path) -> ObjRef {
        DescribedObject::new(self.jar_resource_loader.clone())
            .with_field("fileOfJar", jar.to_path_buf())
            .build()
    }

    pub fn path_resource_loader(&self, dir: &Path) -> ObjRef {
        DescribedObject::new(self.path_resource_loader.clone())
            .with_field("root", dir.to_path_buf())
            .build()
    }

    pub fn vfs_resource_loader(&self, root: ObjRef) -> ObjRef {
        DescribedObject::new(self.vfs_resource_loader.clone())
            .with_field("root", root)
            .build()
    }

    /// A module and its class loader, wired to each other.
    pub fn module(&self, name: &str, resource_loaders: Vec<ObjRef>) -> FixtureModule {
        let module = DescribedObject::new(self.module.clone())
            .with_method("getName", name)
            .build();
        let loader = DescribedObject::new(self.module_class_loader.clone())
            .with_method("getResourceLoaders", list(resource_loaders))
            .build();
        let fixture = FixtureModule { module, loader };
        fixture.module.set_method("getClassLoader", fixture.loader());
        fixture.loader.set_method("getModule", fixture.module());
        fixture
    }

    /// A module loader holding every given module in its `moduleMap`, set as
    /// the caller module loader of each.
    pub fn module_loader(&self, modules: &[(&str, &ObjRef)]) -> ObjRef {
        let entries = modules
            .iter()
            .map(|(name, module)| {
                let future: ObjRef = DescribedObject::new(self.future_module.clone())
                    .with_method("getModule", (*module).clone())
                    .build();
                (Value::from(*name), Value::Object(future))
            })
            .collect();
        DescribedObject::new(self.module_loader.clone())
            .with_field("moduleMap", Value::Map(entries))
            .build()
    }

    /// A `ModuleClassLoader$1` local loader pointing back at `module_loader`.
    pub fn local_loader(&self, module_loader: &ObjRef) -> ObjRef {
        DescribedObject::new(self.local_loader.clone())
            .with_field("this$0", module_loader.clone())
            .build()
    }

    pub fn reflection(&self) -> ReflectionUtils {
        ReflectionUtils::new(self.runtime.clone())
    }

    /// A classpath accumulator that takes paths as given.
    pub fn raw_classpath(&self) -> ClasspathOrder {
        ClasspathOrder::new(
            self.reflection(),
            ScanSpec {
                canonicalize_entries: false,
                ..ScanSpec::default()
            },
        )
    }

    pub fn finder(&self, spec: ScanSpec) -> LoaderFinder {
        let registry = HandlerRegistry::new().with_handler(Arc::new(JBossClassLoaderHandler::new()));
        LoaderFinder::new(Arc::new(registry), self.runtime.clone(), spec)
    }
}

pub fn list(items: Vec<ObjRef>) -> Value {
    Value::List(items.into_iter().map(Value::Object).collect())
}

pub struct FixtureModule {
    pub module: Arc<DescribedObject>,
    pub loader: Arc<DescribedObject>,
}

impl FixtureModule {
    pub fn module(&self) -> ObjRef {
        self.module.clone()
    }

    pub fn loader(&self) -> ObjRef {
        self.loader.clone()
    }

    pub fn set_caller_module_loader(&self, module_loader: &ObjRef) {
        self.module.set_method("getCallerModuleLoader", module_loader.clone());
    }
}
