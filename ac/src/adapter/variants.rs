//! Built-in adapter variants

use tracing::debug;

use super::ModelAdapter;

/// Identity adapter - matches every model id and changes nothing
///
/// Always registered as the terminal fallback so resolution never fails.
pub struct DefaultAdapter;

impl ModelAdapter for DefaultAdapter {
    fn matches(&self, _model_id: &str) -> bool {
        true
    }
}

/// Adapter for model families that wrap structured output in markdown fences
///
/// Strips a surrounding code fence from diffs and a leading `$ ` from shell
/// commands, both of which otherwise break downstream application verbatim.
pub struct FenceStrippingAdapter {
    prefixes: Vec<String>,
}

impl FenceStrippingAdapter {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }
}

impl Default for FenceStrippingAdapter {
    fn default() -> Self {
        Self::new(vec!["deepseek".to_string(), "qwen".to_string()])
    }
}

impl ModelAdapter for FenceStrippingAdapter {
    fn matches(&self, model_id: &str) -> bool {
        let id = model_id.to_lowercase();
        self.prefixes.iter().any(|p| id.starts_with(p.as_str()))
    }

    fn preprocess_diff(&self, diff: &str) -> String {
        strip_fence(diff)
    }

    fn preprocess_command(&self, command: &str) -> String {
        let stripped = strip_fence(command);
        stripped.strip_prefix("$ ").unwrap_or(&stripped).to_string()
    }
}

/// Adapter for reasoning model families (o1/o3 style)
///
/// These models take no image input and respond better to a terse reminder
/// that tool use must be explicit rather than described in prose.
pub struct ReasoningModelAdapter;

const REASONING_PROMPT_SUFFIX: &str =
    "\n\nInvoke tools directly with their declared schema. Do not describe tool calls in prose.";

impl ModelAdapter for ReasoningModelAdapter {
    fn matches(&self, model_id: &str) -> bool {
        let id = model_id.to_lowercase();
        id.starts_with("o1") || id.starts_with("o3")
    }

    fn adjust_system_prompt(&self, prompt: &str) -> String {
        format!("{}{}", prompt, REASONING_PROMPT_SUFFIX)
    }

    fn supports_images(&self) -> bool {
        false
    }
}

/// Strip a single surrounding markdown code fence, if present
fn strip_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return text.to_string();
    }

    debug!("strip_fence: removing surrounding code fence");
    let without_open = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return text.to_string(),
    };
    without_open.trim_end().trim_end_matches("```").trim_end().to_string()
}
