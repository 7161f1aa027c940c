//! Discovery driver: loader order first, then classpath extraction.

use crate::config::ScanSpec;
use crate::discovery::classpath::{ClasspathEntry, ClasspathOrder};
use crate::discovery::order::{LoaderOrder, OrderEntry};
use crate::handler::HandlerRegistry;
use loaderscope_api::{IdentitySet, ObjRef, Runtime, describe_object};
use loaderscope_plugin::{OrderBuilder, ReflectionUtils};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, debug_span, info};

/// Result of a discovery pass
#[derive(Debug, Default, Clone)]
pub struct DiscoveryResult {
    /// Loaders in delegation order (after `ignore_parent_loaders`)
    pub loader_order: Vec<OrderEntry>,
    /// Every loader seen as another loader's parent
    pub parent_loaders: IdentitySet,
    /// Classpath entries in discovery order
    pub classpath: Vec<ClasspathEntry>,
    /// Time taken for the pass
    pub duration: Duration,
}

pub struct LoaderFinder {
    registry: Arc<HandlerRegistry>,
    reflection: ReflectionUtils,
    spec: ScanSpec,
}

impl LoaderFinder {
    pub fn new(registry: Arc<HandlerRegistry>, runtime: Arc<dyn Runtime>, spec: ScanSpec) -> Self {
        Self {
            registry,
            reflection: ReflectionUtils::new(runtime),
            spec,
        }
    }

    pub fn spec(&self) -> &ScanSpec {
        &self.spec
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Build one delegation order covering every root, in root order.
    pub fn find_loader_order(&self, roots: &[ObjRef]) -> LoaderOrder {
        let mut order = LoaderOrder::new(self.registry.clone(), self.reflection.clone());
        for root in roots {
            order.delegate_to(Some(root), false);
        }
        order
    }

    /// Run a full discovery pass over `roots`, single-threaded and
    /// deterministic.
    pub fn discover(&self, roots: &[ObjRef]) -> DiscoveryResult {
        let start = Instant::now();
        let (entries, parents) = self.find_loader_order(roots).into_parts();
        let loader_order = self.filter_parents(entries, &parents);

        let classpath = ClasspathOrder::new(self.reflection.clone(), self.spec.clone());
        for entry in &loader_order {
            Self::extract(entry, &classpath);
        }

        self.finish(loader_order, parents, classpath, start)
    }

    /// Like [`Self::discover`], but every root gets its own delegation order
    /// built on the rayon pool. Orders are merged in root order and parents
    /// are filtered against the merged parent set before any classpath is
    /// extracted, so a root that is another root's parent is dropped with
    /// its entries. Extraction also runs on the pool; the classpath order
    /// across loaders depends on scheduling.
    pub fn discover_parallel(&self, roots: &[ObjRef]) -> DiscoveryResult {
        let start = Instant::now();

        let per_root: Vec<(Vec<OrderEntry>, IdentitySet)> = roots
            .par_iter()
            .map(|root| {
                let mut order = LoaderOrder::new(self.registry.clone(), self.reflection.clone());
                order.delegate_to(Some(root), false);
                order.into_parts()
            })
            .collect();

        let mut parents = IdentitySet::new();
        for (_, root_parents) in &per_root {
            for parent in root_parents.iter() {
                parents.insert(parent);
            }
        }
        let mut seen = IdentitySet::new();
        let merged: Vec<OrderEntry> = per_root
            .into_iter()
            .flat_map(|(entries, _)| entries)
            .filter(|entry| seen.insert(&entry.loader))
            .collect();
        let loader_order = self.filter_parents(merged, &parents);

        let classpath = ClasspathOrder::new(self.reflection.clone(), self.spec.clone());
        loader_order
            .par_iter()
            .for_each(|entry| Self::extract(entry, &classpath));

        self.finish(loader_order, parents, classpath, start)
    }

    fn filter_parents(&self, entries: Vec<OrderEntry>, parents: &IdentitySet) -> Vec<OrderEntry> {
        if !self.spec.ignore_parent_loaders {
            return entries;
        }
        entries
            .into_iter()
            .filter(|entry| {
                let keep = !parents.contains(&entry.loader);
                if !keep {
                    debug!("Ignoring parent loader {}", describe_object(&entry.loader));
                }
                keep
            })
            .collect()
    }

    fn extract(entry: &OrderEntry, classpath: &ClasspathOrder) {
        let _span = debug_span!("classpath", loader = %describe_object(&entry.loader)).entered();
        for handler in &entry.handlers {
            debug!("Finding classpath entries with {}", handler.name());
            handler.find_classpath_entries(&entry.loader, classpath);
        }
    }

    fn finish(
        &self,
        loader_order: Vec<OrderEntry>,
        parent_loaders: IdentitySet,
        classpath: ClasspathOrder,
        start: Instant,
    ) -> DiscoveryResult {
        let result = DiscoveryResult {
            loader_order,
            parent_loaders,
            classpath: classpath.into_entries(),
            duration: start.elapsed(),
        };
        info!(
            "Loader discovery complete: {} loaders, {} parents, {} classpath entries in {:?}",
            result.loader_order.len(),
            result.parent_loaders.len(),
            result.classpath.len(),
            result.duration
        );
        result
    }
}
