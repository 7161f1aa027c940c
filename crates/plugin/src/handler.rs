//! Capability traits implemented by loader handlers and consumed by the core.

use crate::reflect::ReflectionUtils;
use loaderscope_api::{ObjRef, TypeRef, Value};

/// A strategy specialised for one loader implementation family.
///
/// Handlers are stateless and shared across concurrent discovery passes.
/// None of the methods may panic or fail on an unfamiliar object graph: a
/// member that is not there means "nothing from this path".
pub trait LoaderHandler: Send + Sync {
    /// Handler name (for logging/debugging)
    fn name(&self) -> &str;

    /// Structural match against the loader's runtime type. Implementations
    /// usually test the type itself and all of its supertypes by name.
    fn can_handle(&self, loader_type: &TypeRef) -> bool;

    /// Contribute `loader` (and, first, whatever it delegates to) to the
    /// delegation order.
    fn find_loader_order(&self, loader: &ObjRef, order: &mut dyn OrderBuilder);

    /// Push every classpath entry `loader` contributes into `out`.
    fn find_classpath_entries(&self, loader: &ObjRef, out: &dyn ClasspathSink);
}

/// The delegation order being built for one root loader.
pub trait OrderBuilder {
    /// Place `loader` at the current position, unless already placed.
    fn add(&mut self, loader: &ObjRef);

    /// Recurse into `loader` through its matching handlers. `None` is a no-op.
    /// With `is_parent`, the loader is recorded as a parent loader even if it
    /// has already been visited.
    fn delegate_to(&mut self, loader: Option<&ObjRef>, is_parent: bool);

    fn reflection(&self) -> &ReflectionUtils;
}

/// Receives classpath entries as they are discovered.
///
/// An entry is any structural value a handler recovered: a file, a path
/// string, or an object the sink knows how to turn into a path. Shared across
/// threads when several roots are scanned in parallel.
pub trait ClasspathSink: Send + Sync {
    /// Returns true if the entry was accepted as new. `None` is ignored.
    fn add_entry(&self, entry: Option<Value>, loader: &ObjRef) -> bool;

    fn reflection(&self) -> &ReflectionUtils;
}
