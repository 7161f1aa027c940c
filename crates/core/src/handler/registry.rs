use crate::handler::fallback::FallbackClassLoaderHandler;
use loaderscope_api::ObjRef;
use loaderscope_plugin::LoaderHandler;
use std::sync::Arc;
use tracing::trace;

/// Ordered set of loader handlers plus the fallback used when none match.
///
/// Read-only once built; shared by every discovery pass.
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn LoaderHandler>>,
    fallback: Arc<dyn LoaderHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            fallback: Arc::new(FallbackClassLoaderHandler),
        }
    }

    /// Add a handler after the ones already registered
    pub fn with_handler(mut self, handler: Arc<dyn LoaderHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Add multiple handlers
    pub fn with_handlers(
        mut self,
        handlers: impl IntoIterator<Item = Arc<dyn LoaderHandler>>,
    ) -> Self {
        self.handlers.extend(handlers);
        self
    }

    /// Replace the fallback handler
    pub fn with_fallback(mut self, fallback: Arc<dyn LoaderHandler>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn handlers(&self) -> &[Arc<dyn LoaderHandler>] {
        &self.handlers
    }

    pub fn fallback(&self) -> &Arc<dyn LoaderHandler> {
        &self.fallback
    }

    /// Every registered handler that can handle the loader's runtime type, in
    /// registration order; the fallback alone if none can. Never empty.
    pub fn handlers_for(&self, loader: &ObjRef) -> Vec<Arc<dyn LoaderHandler>> {
        let loader_type = loader.runtime_type();
        let matched: Vec<_> = self
            .handlers
            .iter()
            .filter(|handler| handler.can_handle(&loader_type))
            .cloned()
            .collect();

        if matched.is_empty() {
            trace!(
                "No handler for {}, using {}",
                loader_type.name(),
                self.fallback.name()
            );
            vec![self.fallback.clone()]
        } else {
            matched
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loaderscope_api::{DescribedObject, DescribedType, TypeRef, type_is_or_extends_or_implements};
    use loaderscope_plugin::{ClasspathSink, OrderBuilder};

    struct NamedHandler {
        name: &'static str,
        handles: &'static str,
    }

    impl LoaderHandler for NamedHandler {
        fn name(&self) -> &str {
            self.name
        }

        fn can_handle(&self, loader_type: &TypeRef) -> bool {
            type_is_or_extends_or_implements(loader_type, self.handles)
        }

        fn find_loader_order(&self, loader: &ObjRef, order: &mut dyn OrderBuilder) {
            order.add(loader);
        }

        fn find_classpath_entries(&self, _loader: &ObjRef, _out: &dyn ClasspathSink) {}
    }

    fn loader_of(ty: TypeRef) -> ObjRef {
        DescribedObject::new(ty).build()
    }

    #[test]
    fn test_all_matching_handlers_in_registration_order() {
        let base: TypeRef = DescribedType::new("x.Base").build();
        let leaf: TypeRef = DescribedType::new("x.Leaf").extending(base).build();

        let registry = HandlerRegistry::new()
            .with_handler(Arc::new(NamedHandler { name: "leaf", handles: "x.Leaf" }))
            .with_handler(Arc::new(NamedHandler { name: "other", handles: "y.Other" }))
            .with_handler(Arc::new(NamedHandler { name: "base", handles: "x.Base" }));

        let names: Vec<String> = registry
            .handlers_for(&loader_of(leaf))
            .iter()
            .map(|h| h.name().to_string())
            .collect();
        assert_eq!(names, vec!["leaf", "base"]);
    }

    #[test]
    fn test_fallback_when_nothing_matches() {
        let ty: TypeRef = DescribedType::new("z.Unknown").build();
        let registry = HandlerRegistry::new()
            .with_handler(Arc::new(NamedHandler { name: "leaf", handles: "x.Leaf" }));

        let handlers = registry.handlers_for(&loader_of(ty));
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].name(), "FallbackClassLoaderHandler");
    }
}
