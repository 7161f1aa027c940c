//! Loader handler for JBoss Modules (WildFly, JBoss EAP).

pub mod handler;
pub mod vfs;

pub use handler::JBossClassLoaderHandler;
