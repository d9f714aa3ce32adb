//! Static model catalog.
//!
//! Models are immutable descriptors; selection is a foreign key held by the
//! caller. Capability flags drive adapter behavior (image blocks, extended
//! reasoning budgets) rather than per-call string checks.

use serde::{Deserialize, Serialize};

/// The backend family a model is served by.
///
/// `XAi` models speak the OpenAI-compatible wire format and are routed
/// through the OpenAI-style adapter with a different base URL and key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    #[serde(rename = "xai")]
    XAi,
}

/// A selectable backend model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    /// Provider-side model identifier (e.g. `gpt-4o`).
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    pub provider: ModelProvider,
    /// Whether image content blocks may be sent to this model.
    pub supports_images: bool,
    /// Whether the model exposes a native reasoning channel.
    pub supports_reasoning: bool,
    /// Context window size in tokens.
    pub context_window: u32,
}

impl Model {
    fn new(
        id: &str,
        name: &str,
        provider: ModelProvider,
        supports_images: bool,
        supports_reasoning: bool,
        context_window: u32,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            provider,
            supports_images,
            supports_reasoning,
            context_window,
        }
    }

    /// Look up a catalog model by its provider-side id.
    pub fn find(id: &str) -> Option<&'static Model> {
        AVAILABLE_MODELS.iter().find(|m| m.id == id)
    }
}

lazy_static::lazy_static! {
    /// The built-in model catalog, in display order.
    pub static ref AVAILABLE_MODELS: Vec<Model> = vec![
        Model::new("gpt-4o", "GPT-4o", ModelProvider::OpenAi, true, false, 128_000),
        Model::new(
            "claude-sonnet-4-20250514",
            "Claude Sonnet 4",
            ModelProvider::Anthropic,
            true,
            true,
            200_000,
        ),
        Model::new(
            "claude-opus-4-20250514",
            "Claude Opus 4",
            ModelProvider::Anthropic,
            true,
            true,
            200_000,
        ),
        Model::new("gpt-4o-mini", "GPT-4o Mini", ModelProvider::OpenAi, true, false, 128_000),
        Model::new("o1", "o1", ModelProvider::OpenAi, true, true, 200_000),
        Model::new("o1-mini", "o1 Mini", ModelProvider::OpenAi, true, true, 128_000),
        Model::new(
            "claude-3-5-haiku-20241022",
            "Claude Haiku 3.5",
            ModelProvider::Anthropic,
            true,
            false,
            200_000,
        ),
        Model::new("grok-2-latest", "Grok 2", ModelProvider::XAi, false, false, 131_072),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lookup_by_id() {
        let model = Model::find("gpt-4o").expect("gpt-4o in catalog");
        assert_eq!(model.provider, ModelProvider::OpenAi);
        assert!(model.supports_images);
        assert!(!model.supports_reasoning);
    }

    #[test]
    fn catalog_has_reasoning_models() {
        let sonnet = Model::find("claude-sonnet-4-20250514").unwrap();
        assert_eq!(sonnet.provider, ModelProvider::Anthropic);
        assert!(sonnet.supports_reasoning);
    }

    #[test]
    fn unknown_model_is_none() {
        assert!(Model::find("definitely-not-a-model").is_none());
    }
}
