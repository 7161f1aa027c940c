use crate::error::AccessResult;
use crate::object::{ObjRef, TypeRef};

/// The foreign runtime as a whole: type lookup through a given loader, and the
/// ambient context loader of the discovering thread.
pub trait Runtime: Send + Sync {
    /// Resolve `name` through `loader`, or through the bootstrap loader when
    /// `loader` is `None`. Returns [`crate::AccessError::TypeNotFound`] if the
    /// type is not visible from there.
    fn load_type(&self, name: &str, loader: Option<&ObjRef>) -> AccessResult<TypeRef>;

    fn context_loader(&self) -> Option<ObjRef>;
}
