//! Loader delegation order.

use crate::handler::HandlerRegistry;
use indexmap::IndexMap;
use loaderscope_api::{IdentitySet, ObjRef, ObjectKey, describe_object};
use loaderscope_plugin::{LoaderHandler, OrderBuilder, ReflectionUtils};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, debug_span};

/// A loader in the delegation order together with the handlers that matched it.
#[derive(Clone)]
pub struct OrderEntry {
    pub loader: ObjRef,
    /// Never empty: the registry falls back to its fallback handler.
    pub handlers: Vec<Arc<dyn LoaderHandler>>,
}

impl fmt::Debug for OrderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.handlers.iter().map(|h| h.name()).collect();
        f.debug_struct("OrderEntry")
            .field("loader", &describe_object(&self.loader))
            .field("handlers", &names)
            .finish()
    }
}

/// Builds the delegation order for one discovery pass.
///
/// Single-threaded and recursive; not meant to be shared. Loaders are keyed by
/// identity throughout, because some loader implementations report value
/// equality with the loader they delegate to.
pub struct LoaderOrder {
    registry: Arc<HandlerRegistry>,
    reflection: ReflectionUtils,
    /// Placed loaders, in delegation order.
    order: IndexMap<ObjectKey, Vec<Arc<dyn LoaderHandler>>>,
    /// Loaders already recursed into. Bounds recursion on delegation cycles.
    expanded: IdentitySet,
    /// Loaders seen as the parent of some other loader.
    parents: IdentitySet,
}

impl LoaderOrder {
    pub fn new(registry: Arc<HandlerRegistry>, reflection: ReflectionUtils) -> Self {
        Self {
            registry,
            reflection,
            order: IndexMap::new(),
            expanded: IdentitySet::new(),
            parents: IdentitySet::new(),
        }
    }

    /// The delegation order as a sequence.
    pub fn ordered_entries(&self) -> Vec<OrderEntry> {
        self.order
            .iter()
            .map(|(key, handlers)| OrderEntry {
                loader: key.object().clone(),
                handlers: handlers.clone(),
            })
            .collect()
    }

    pub fn parent_loaders(&self) -> &IdentitySet {
        &self.parents
    }

    pub fn into_parts(self) -> (Vec<OrderEntry>, IdentitySet) {
        let entries = self
            .order
            .into_iter()
            .map(|(key, handlers)| OrderEntry {
                loader: key.0,
                handlers,
            })
            .collect();
        (entries, self.parents)
    }

    pub fn contains(&self, loader: &ObjRef) -> bool {
        self.order.contains_key(&ObjectKey::new(loader))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl OrderBuilder for LoaderOrder {
    fn add(&mut self, loader: &ObjRef) {
        let key = ObjectKey::new(loader);
        if self.order.contains_key(&key) {
            return;
        }
        let handlers = self.registry.handlers_for(loader);
        debug!(
            "Placing {} at position {} (handlers: {})",
            describe_object(loader),
            self.order.len(),
            handlers
                .iter()
                .map(|h| h.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.order.insert(key, handlers);
    }

    fn delegate_to(&mut self, loader: Option<&ObjRef>, is_parent: bool) {
        let Some(loader) = loader else {
            return;
        };

        // Record parents before the cycle guard, so a loader first reached as
        // a root and later as someone's parent still counts as a parent.
        if is_parent {
            self.parents.insert(loader);
        }

        if !self.expanded.insert(loader) {
            return;
        }

        let _span = debug_span!("delegate", loader = %describe_object(loader)).entered();

        // Handlers delegate to their parents before adding themselves, which
        // yields parent-first order. The trailing add places the loader even
        // if a handler did not.
        for handler in self.registry.handlers_for(loader) {
            handler.find_loader_order(loader, self);
        }
        self.add(loader);
    }

    fn reflection(&self) -> &ReflectionUtils {
        &self.reflection
    }
}
