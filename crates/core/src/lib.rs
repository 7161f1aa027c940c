pub mod config;
pub mod error;
pub mod logging;

pub mod concurrency;
pub mod discovery;
pub mod handler;
pub mod snapshot;

pub use config::ScanSpec;
pub use discovery::{DiscoveryResult, LoaderFinder};
pub use error::{LoaderScopeError, Result};
