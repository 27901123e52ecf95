//! Per-model behavioral adapters
//!
//! Some model families need their inputs shaped differently: extra system
//! prompt guidance, markdown fences stripped from diffs, or image content
//! withheld. Adapters capture those quirks behind one trait; the registry
//! resolves an adapter by model id with first-match-wins ordering and a
//! guaranteed identity fallback.

mod registry;
mod variants;

pub use registry::AdapterRegistry;
pub use variants::{DefaultAdapter, FenceStrippingAdapter, ReasoningModelAdapter};

/// Behavioral quirks for a model family
///
/// All transforms are pure text functions with no side effects. The default
/// implementations are identity transforms, so a variant only overrides what
/// its family actually needs.
pub trait ModelAdapter: Send + Sync {
    /// Whether this adapter applies to the given model id
    fn matches(&self, model_id: &str) -> bool;

    /// Shape the system prompt before sending
    fn adjust_system_prompt(&self, prompt: &str) -> String {
        prompt.to_string()
    }

    /// Normalize a model-produced diff before applying it
    fn preprocess_diff(&self, diff: &str) -> String {
        diff.to_string()
    }

    /// Normalize a model-produced shell command before running it
    fn preprocess_command(&self, command: &str) -> String {
        command.to_string()
    }

    /// Whether the model accepts image content; when false, images must be
    /// dropped upstream rather than sent
    fn supports_images(&self) -> bool {
        true
    }
}
