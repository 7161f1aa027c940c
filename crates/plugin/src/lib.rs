pub mod handler;
pub mod reflect;

pub use handler::{ClasspathSink, LoaderHandler, OrderBuilder};
pub use reflect::ReflectionUtils;

/// Error type for construction and handler-side failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
