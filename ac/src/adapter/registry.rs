//! Ordered adapter registry with guaranteed fallback

use tracing::debug;

use super::variants::{DefaultAdapter, FenceStrippingAdapter, ReasoningModelAdapter};
use super::ModelAdapter;

/// Resolves a [`ModelAdapter`] by model id
///
/// Registered adapters are consulted in registration order, first match wins.
/// The identity [`DefaultAdapter`] is held separately as the terminal
/// fallback, so `resolve` always returns an adapter.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn ModelAdapter>>,
    fallback: DefaultAdapter,
}

impl AdapterRegistry {
    /// Create an empty registry (fallback only)
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
            fallback: DefaultAdapter,
        }
    }

    /// Create a registry with the built-in variants registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(FenceStrippingAdapter::default()));
        registry.register(Box::new(ReasoningModelAdapter));
        registry
    }

    /// Append an adapter; earlier registrations take precedence
    pub fn register(&mut self, adapter: Box<dyn ModelAdapter>) {
        self.adapters.push(adapter);
    }

    /// Resolve the adapter for a model id (never fails)
    pub fn resolve(&self, model_id: &str) -> &dyn ModelAdapter {
        for adapter in &self.adapters {
            if adapter.matches(model_id) {
                return adapter.as_ref();
            }
        }
        debug!(%model_id, "AdapterRegistry::resolve: falling back to default adapter");
        &self.fallback
    }

    /// Number of registered adapters (excluding the fallback)
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether any adapters are registered beyond the fallback
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAdapter {
        prefix: &'static str,
        marker: &'static str,
    }

    impl ModelAdapter for FixedAdapter {
        fn matches(&self, model_id: &str) -> bool {
            model_id.starts_with(self.prefix)
        }

        fn adjust_system_prompt(&self, prompt: &str) -> String {
            format!("{}{}", prompt, self.marker)
        }
    }

    #[test]
    fn test_resolve_always_returns_an_adapter() {
        let registry = AdapterRegistry::with_defaults();
        let adapter = registry.resolve("some-model-nobody-registered");
        assert!(adapter.supports_images());
        assert_eq!(adapter.adjust_system_prompt("p"), "p");
    }

    #[test]
    fn test_resolve_is_first_match_wins() {
        let mut registry = AdapterRegistry::new();
        registry.register(Box::new(FixedAdapter {
            prefix: "m",
            marker: "-first",
        }));
        registry.register(Box::new(FixedAdapter {
            prefix: "model",
            marker: "-second",
        }));

        // Both match "model-x"; registration order decides.
        let adapter = registry.resolve("model-x");
        assert_eq!(adapter.adjust_system_prompt("p"), "p-first");
    }

    #[test]
    fn test_empty_registry_falls_back_to_identity() {
        let registry = AdapterRegistry::new();
        assert!(registry.is_empty());
        let adapter = registry.resolve("anything");
        assert_eq!(adapter.preprocess_diff("d"), "d");
    }

    #[test]
    fn test_defaults_resolve_known_families() {
        let registry = AdapterRegistry::with_defaults();
        assert!(!registry.resolve("o1-preview").supports_images());
        assert_eq!(
            registry.resolve("deepseek-chat").preprocess_command("$ echo hi"),
            "echo hi"
        );
    }
}
