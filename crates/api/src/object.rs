//! Structural object model for foreign-runtime objects.
//!
//! A Rust process cannot reflect over the objects of the runtime whose loaders
//! are being inspected, so every bridge (agent, heap dump, test double)
//! exposes them through [`RuntimeObject`] and [`RuntimeType`]. Member lookups
//! return [`crate::AccessError::MissingMember`] when the member does not exist
//! and `Ok(Value::Null)` when it exists but holds nothing.

use crate::error::AccessResult;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type ObjRef = Arc<dyn RuntimeObject>;
pub type TypeRef = Arc<dyn RuntimeType>;

/// A type in the foreign runtime (a class, in JVM terms).
pub trait RuntimeType: Send + Sync + fmt::Debug {
    /// Fully qualified name, e.g. `org.jboss.modules.ModuleClassLoader`.
    fn name(&self) -> &str;

    fn superclass(&self) -> Option<TypeRef>;

    fn interfaces(&self) -> Vec<TypeRef>;

    /// The loader that defined this type, if known.
    fn defining_loader(&self) -> Option<ObjRef>;

    fn invoke_static(&self, method: &str, args: &[Value]) -> AccessResult<Value>;
}

/// An instance in the foreign runtime.
pub trait RuntimeObject: Send + Sync + fmt::Debug {
    fn runtime_type(&self) -> TypeRef;

    fn field(&self, name: &str) -> AccessResult<Value>;

    fn invoke(&self, method: &str, args: &[Value]) -> AccessResult<Value>;
}

/// A value read from a field or returned from a method.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    /// A filesystem handle (`java.io.File` or `java.nio.file.Path`).
    File(PathBuf),
    Object(ObjRef),
    Type(TypeRef),
    List(Vec<Value>),
    /// Entries in the map's own iteration order.
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `None` for null, so that "absent" and "present but null" collapse.
    pub fn non_null(self) -> Option<Value> {
        if self.is_null() { None } else { Some(self) }
    }

    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<ObjRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&Path> {
        match self {
            Value::File(path) => Some(path),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_map(self) -> Option<Vec<(Value, Value)>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Short human-readable description used in log lines.
    pub fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Str(s) => format!("{s:?}"),
            Value::File(p) => p.display().to_string(),
            Value::Object(obj) => describe_object(obj),
            Value::Type(ty) => format!("type {}", ty.name()),
            Value::List(items) => format!("list[{}]", items.len()),
            Value::Map(entries) => format!("map[{}]", entries.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<PathBuf> for Value {
    fn from(path: PathBuf) -> Self {
        Value::File(path)
    }
}

impl From<ObjRef> for Value {
    fn from(obj: ObjRef) -> Self {
        Value::Object(obj)
    }
}

impl From<TypeRef> for Value {
    fn from(ty: TypeRef) -> Self {
        Value::Type(ty)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// `TypeName@address`, in the spirit of the foreign runtime's identity string.
pub fn describe_object(obj: &ObjRef) -> String {
    format!(
        "{}@{:x}",
        obj.runtime_type().name(),
        Arc::as_ptr(obj) as *const () as usize
    )
}

/// Walks `ty`, its superclass chain and every implemented interface, and
/// returns true if any of them is named `name`.
pub fn type_is_or_extends_or_implements(ty: &TypeRef, name: &str) -> bool {
    let mut stack = vec![ty.clone()];
    let mut seen: HashSet<TypeKey> = HashSet::new();
    while let Some(current) = stack.pop() {
        if !seen.insert(TypeKey(current.clone())) {
            continue;
        }
        if current.name() == name {
            return true;
        }
        if let Some(superclass) = current.superclass() {
            stack.push(superclass);
        }
        stack.extend(current.interfaces());
    }
    false
}

/// Reference-identity key for an [`ObjRef`].
///
/// Loader implementations may define value equality across distinct
/// instances, so every loader-keyed set or map goes through this wrapper.
/// The key holds the `Arc`, so the address cannot be reused while the key
/// lives.
#[derive(Clone)]
pub struct ObjectKey(pub ObjRef);

impl ObjectKey {
    pub fn new(obj: &ObjRef) -> Self {
        ObjectKey(obj.clone())
    }

    pub fn object(&self) -> &ObjRef {
        &self.0
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for ObjectKey {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl Eq for ObjectKey {}

impl Hash for ObjectKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&describe_object(&self.0))
    }
}

/// Identity key for a [`TypeRef`].
#[derive(Clone)]
struct TypeKey(TypeRef);

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const (),
            Arc::as_ptr(&other.0) as *const (),
        )
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const ()).hash(state);
    }
}

/// Identity set of runtime objects.
#[derive(Default, Clone, Debug)]
pub struct IdentitySet {
    inner: HashSet<ObjectKey>,
}

impl IdentitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the object was not already present.
    pub fn insert(&mut self, obj: &ObjRef) -> bool {
        self.inner.insert(ObjectKey::new(obj))
    }

    pub fn contains(&self, obj: &ObjRef) -> bool {
        self.inner.contains(&ObjectKey::new(obj))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjRef> {
        self.inner.iter().map(ObjectKey::object)
    }
}
