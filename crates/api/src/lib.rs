pub mod described;
pub mod error;
pub mod object;
pub mod runtime;

pub use described::{DescribedObject, DescribedRuntime, DescribedType, Method};
pub use error::{AccessError, AccessResult};
pub use object::{
    IdentitySet, ObjRef, ObjectKey, RuntimeObject, RuntimeType, TypeRef, Value, describe_object,
    type_is_or_extends_or_implements,
};
pub use runtime::Runtime;
