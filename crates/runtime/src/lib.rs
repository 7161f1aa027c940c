use loaderscope_api::Runtime;
use loaderscope_core::discovery::{DiscoveryResult, LoaderFinder};
use loaderscope_core::handler::HandlerRegistry;
use loaderscope_core::snapshot::HeapSnapshot;
use loaderscope_core::{Result, ScanSpec};
use loaderscope_jboss::JBossClassLoaderHandler;
use loaderscope_plugin::LoaderHandler;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Every vendor handler this build knows about, in matching order.
pub fn default_handlers() -> Vec<Arc<dyn LoaderHandler>> {
    vec![Arc::new(JBossClassLoaderHandler::new())]
}

/// The default registry: all vendor handlers, backed by the fallback handler
/// for loaders none of them recognise.
pub fn build_default_registry() -> HandlerRegistry {
    HandlerRegistry::new().with_handlers(default_handlers())
}

/// Bootstraps a loader finder over `runtime` with the default registry.
pub fn build_default_finder(runtime: Arc<dyn Runtime>, spec: ScanSpec) -> LoaderFinder {
    LoaderFinder::new(Arc::new(build_default_registry()), runtime, spec)
}

/// Installs the process-wide subscriber; hold the guard until exit.
pub fn init_logging(component: &str, to_stderr: bool) -> Option<impl Drop> {
    loaderscope_core::logging::init_logging(component, to_stderr)
}

/// Load a heap snapshot and run discovery from its root loaders.
pub fn scan_snapshot(path: &Path, spec: ScanSpec, parallel: bool) -> Result<DiscoveryResult> {
    info!("Loading heap snapshot from {}", path.display());
    let loaded = HeapSnapshot::from_path(path)?.build()?;
    let finder = build_default_finder(loaded.runtime.clone(), spec);

    Ok(if parallel {
        finder.discover_parallel(&loaded.roots)
    } else {
        finder.discover(&loaded.roots)
    })
}
