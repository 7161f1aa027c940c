//! Best-effort structural access.
//!
//! Every accessor returns `None` when the member is missing, when it holds
//! null, or when reading it failed. Missing members are expected (vendor
//! internals differ between versions) and only traced; invocation failures
//! are logged and swallowed.

use loaderscope_api::{AccessError, AccessResult, ObjRef, Runtime, TypeRef, Value, describe_object};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Clone)]
pub struct ReflectionUtils {
    runtime: Arc<dyn Runtime>,
}

impl ReflectionUtils {
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    /// Read field `name` of `obj`.
    pub fn get_field(&self, obj: &ObjRef, name: &str) -> Option<Value> {
        settle(obj.field(name), || describe_object(obj), name)
    }

    /// Invoke the no-argument-or-given-arguments method `name` on `obj`.
    pub fn invoke_method(&self, obj: &ObjRef, name: &str, args: &[Value]) -> Option<Value> {
        settle(obj.invoke(name, args), || describe_object(obj), name)
    }

    pub fn invoke_static_method(&self, ty: &TypeRef, name: &str, args: &[Value]) -> Option<Value> {
        settle(
            ty.invoke_static(name, args),
            || format!("type {}", ty.name()),
            name,
        )
    }

    /// [`Self::get_field`], keeping the result only if it is an object.
    pub fn field_object(&self, obj: &ObjRef, name: &str) -> Option<ObjRef> {
        self.get_field(obj, name).and_then(Value::into_object)
    }

    /// [`Self::invoke_method`] without arguments, keeping the result only if
    /// it is an object.
    pub fn invoke_object(&self, obj: &ObjRef, name: &str) -> Option<ObjRef> {
        self.invoke_method(obj, name, &[]).and_then(Value::into_object)
    }

    /// Resolve a type through `loader`. Unlike the member accessors this keeps
    /// the error, so callers can decide whether to retry elsewhere.
    pub fn load_type(&self, name: &str, loader: Option<&ObjRef>) -> AccessResult<TypeRef> {
        self.runtime.load_type(name, loader)
    }

    pub fn context_loader(&self) -> Option<ObjRef> {
        self.runtime.context_loader()
    }
}

fn settle(
    result: AccessResult<Value>,
    owner: impl FnOnce() -> String,
    member: &str,
) -> Option<Value> {
    match result {
        Ok(value) => value.non_null(),
        Err(e) if e.is_missing() => {
            trace!("{}: {}", owner(), e);
            None
        }
        Err(AccessError::InvocationFailed { reason, .. }) => {
            debug!("Failed to access `{}` on {}: {}", member, owner(), reason);
            None
        }
        Err(e) => {
            debug!("Failed to access `{}` on {}: {}", member, owner(), e);
            None
        }
    }
}
