//! Handler registry and the catch-all fallback handler.
//!
//! Vendor handlers live in their own crates (e.g. `loaderscope-jboss`) and
//! are registered by the runtime crate.

pub mod fallback;
pub mod registry;

pub use fallback::FallbackClassLoaderHandler;
pub use registry::HandlerRegistry;
