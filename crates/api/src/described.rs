//! Described objects: structural objects whose members are declared as data.
//!
//! This is the bridge used when the foreign runtime cannot be introspected
//! directly. A heap snapshot loader or a test builds the loader graph out of
//! these, declaring for each type and instance exactly the members a given
//! vendor version exposes. Members may be (re)assigned after construction so
//! that cyclic graphs (a module pointing at its loader pointing back at the
//! module) can be wired up.

use crate::error::{AccessError, AccessResult};
use crate::object::{ObjRef, ObjectKey, RuntimeObject, RuntimeType, TypeRef, Value};
use crate::runtime::Runtime;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A method body. Receives the call arguments.
pub type Method = Arc<dyn Fn(&[Value]) -> AccessResult<Value> + Send + Sync>;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn returning(value: Value) -> Method {
    Arc::new(move |_args: &[Value]| Ok(value.clone()))
}

pub struct DescribedType {
    name: String,
    superclass: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
    defining_loader: RwLock<Option<ObjRef>>,
    statics: RwLock<HashMap<String, Method>>,
}

impl DescribedType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            interfaces: Vec::new(),
            defining_loader: RwLock::new(None),
            statics: RwLock::new(HashMap::new()),
        }
    }

    pub fn extending(mut self, superclass: TypeRef) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn implementing(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn with_static_fn<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Value]) -> AccessResult<Value> + Send + Sync + 'static,
    {
        write(&self.statics).insert(name.into(), Arc::new(body));
        self
    }

    pub fn build(self) -> Arc<DescribedType> {
        Arc::new(self)
    }

    pub fn set_defining_loader(&self, loader: Option<ObjRef>) {
        *write(&self.defining_loader) = loader;
    }

    pub fn set_static(&self, name: impl Into<String>, body: Method) {
        write(&self.statics).insert(name.into(), body);
    }
}

impl fmt::Debug for DescribedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescribedType")
            .field("name", &self.name)
            .field("superclass", &self.superclass.as_ref().map(|t| t.name().to_string()))
            .finish_non_exhaustive()
    }
}

impl RuntimeType for DescribedType {
    fn name(&self) -> &str {
        &self.name
    }

    fn superclass(&self) -> Option<TypeRef> {
        self.superclass.clone()
    }

    fn interfaces(&self) -> Vec<TypeRef> {
        self.interfaces.clone()
    }

    fn defining_loader(&self) -> Option<ObjRef> {
        read(&self.defining_loader).clone()
    }

    fn invoke_static(&self, method: &str, args: &[Value]) -> AccessResult<Value> {
        let body = read(&self.statics).get(method).cloned();
        match body {
            Some(body) => body(args),
            None => Err(AccessError::missing(&self.name, method)),
        }
    }
}

pub struct DescribedObject {
    ty: TypeRef,
    fields: RwLock<HashMap<String, Value>>,
    methods: RwLock<HashMap<String, Method>>,
}

impl DescribedObject {
    pub fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            fields: RwLock::new(HashMap::new()),
            methods: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_field(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(name, value);
        self
    }

    /// Declare a method that ignores its arguments and returns `value`.
    pub fn with_method(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_method(name, value);
        self
    }

    pub fn with_method_fn<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Value]) -> AccessResult<Value> + Send + Sync + 'static,
    {
        self.set_method_fn(name, body);
        self
    }

    pub fn build(self) -> Arc<DescribedObject> {
        Arc::new(self)
    }

    pub fn set_field(&self, name: impl Into<String>, value: impl Into<Value>) {
        write(&self.fields).insert(name.into(), value.into());
    }

    pub fn set_method(&self, name: impl Into<String>, value: impl Into<Value>) {
        write(&self.methods).insert(name.into(), returning(value.into()));
    }

    pub fn set_method_fn<F>(&self, name: impl Into<String>, body: F)
    where
        F: Fn(&[Value]) -> AccessResult<Value> + Send + Sync + 'static,
    {
        write(&self.methods).insert(name.into(), Arc::new(body));
    }
}

impl fmt::Debug for DescribedObject {
    // Field values are left out: described graphs are routinely cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<String> = read(&self.fields).keys().cloned().collect();
        fields.sort();
        f.debug_struct("DescribedObject")
            .field("type", &self.ty.name())
            .field("fields", &fields)
            .finish_non_exhaustive()
    }
}

impl RuntimeObject for DescribedObject {
    fn runtime_type(&self) -> TypeRef {
        self.ty.clone()
    }

    fn field(&self, name: &str) -> AccessResult<Value> {
        read(&self.fields)
            .get(name)
            .cloned()
            .ok_or_else(|| AccessError::missing(self.ty.name(), name))
    }

    fn invoke(&self, method: &str, args: &[Value]) -> AccessResult<Value> {
        // Clone the body out so the lock is not held across the call.
        let body = read(&self.methods).get(method).cloned();
        match body {
            Some(body) => body(args),
            None => Err(AccessError::missing(self.ty.name(), method)),
        }
    }
}

/// A [`Runtime`] over described types.
#[derive(Default)]
pub struct DescribedRuntime {
    /// Each type with the single loader it is visible from (`None`: visible
    /// from every loader, including the bootstrap lookup).
    types: RwLock<Vec<(TypeRef, Option<ObjectKey>)>>,
    context_loader: RwLock<Option<ObjRef>>,
}

impl DescribedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&self, ty: TypeRef, visible_from: Option<&ObjRef>) {
        write(&self.types).push((ty, visible_from.map(ObjectKey::new)));
    }

    pub fn set_context_loader(&self, loader: Option<ObjRef>) {
        *write(&self.context_loader) = loader;
    }
}

impl Runtime for DescribedRuntime {
    fn load_type(&self, name: &str, loader: Option<&ObjRef>) -> AccessResult<TypeRef> {
        let requested = loader.map(ObjectKey::new);
        read(&self.types)
            .iter()
            .find(|(ty, visible_from)| {
                ty.name() == name
                    && match visible_from {
                        None => true,
                        Some(only) => requested.as_ref() == Some(only),
                    }
            })
            .map(|(ty, _)| ty.clone())
            .ok_or_else(|| AccessError::TypeNotFound(name.to_string()))
    }

    fn context_loader(&self) -> Option<ObjRef> {
        read(&self.context_loader).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::type_is_or_extends_or_implements;

    #[test]
    fn test_missing_members_are_reported_as_missing() {
        let ty: TypeRef = DescribedType::new("a.B").build();
        let obj = DescribedObject::new(ty).with_field("x", "y").build();

        assert_eq!(obj.field("x").unwrap().as_str(), Some("y"));
        assert!(obj.field("nope").unwrap_err().is_missing());
        assert!(obj.invoke("nope", &[]).unwrap_err().is_missing());
    }

    #[test]
    fn test_type_hierarchy_matching() {
        let iface: TypeRef = DescribedType::new("x.Loader").build();
        let base: TypeRef = DescribedType::new("x.Base").implementing(iface).build();
        let leaf: TypeRef = DescribedType::new("x.Leaf").extending(base).build();

        assert!(type_is_or_extends_or_implements(&leaf, "x.Leaf"));
        assert!(type_is_or_extends_or_implements(&leaf, "x.Base"));
        assert!(type_is_or_extends_or_implements(&leaf, "x.Loader"));
        assert!(!type_is_or_extends_or_implements(&leaf, "x.Other"));
    }

    #[test]
    fn test_type_visibility_is_per_loader() {
        let loader_ty: TypeRef = DescribedType::new("x.Loader").build();
        let a: ObjRef = DescribedObject::new(loader_ty.clone()).build();
        let b: ObjRef = DescribedObject::new(loader_ty).build();
        let vfs: TypeRef = DescribedType::new("org.jboss.vfs.VFS").build();

        let runtime = DescribedRuntime::new();
        runtime.register_type(vfs, Some(&a));

        assert!(runtime.load_type("org.jboss.vfs.VFS", Some(&a)).is_ok());
        assert!(runtime.load_type("org.jboss.vfs.VFS", Some(&b)).is_err());
        assert!(runtime.load_type("org.jboss.vfs.VFS", None).is_err());
    }
}
