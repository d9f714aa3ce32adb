//! OpenAI-compatible request shaping.
//!
//! Serves both OpenAI and xAI: the wire schema is identical, only the base
//! URL and key differ. This schema has no native document type, so document
//! parts are rewritten through the attachment normalizer before send
//! (inline text, upload-then-reference for PDFs, placeholder otherwise).
//!
//! Web search has no request flag here; when requested, the model id is
//! substituted for a search-capable variant if one is known, otherwise the
//! flag is dropped with a logged no-op.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::attachments::{AttachmentNormalizer, NormalizedPart};
use crate::error::ChatError;
use crate::providers::SendFlags;
use crate::types::{ChatMessage, ContentPart, MessageContent, Model};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_XAI_BASE_URL: &str = "https://api.x.ai/v1";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Known search-capable model substitutions.
const SEARCH_MODEL_VARIANTS: &[(&str, &str)] = &[
    ("gpt-4o", "gpt-4o-search-preview"),
    ("gpt-4o-mini", "gpt-4o-mini-search-preview"),
];

/// Adapter for OpenAI-compatible chat-completions backends.
#[derive(Clone)]
pub struct OpenAiAdapter {
    http_client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    /// Label used in logs (`openai` or `xai`).
    provider_label: &'static str,
}

impl OpenAiAdapter {
    pub fn new(
        http_client: reqwest::Client,
        base_url: String,
        api_key: SecretString,
        provider_label: &'static str,
    ) -> Self {
        Self {
            http_client,
            base_url,
            api_key,
            provider_label,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    /// Build the streaming chat-completions request.
    pub async fn prepare_stream_request(
        &self,
        history: &[ChatMessage],
        model: &Model,
        flags: &SendFlags,
        normalizer: &AttachmentNormalizer,
    ) -> Result<reqwest::RequestBuilder, ChatError> {
        let mut body = self.build_body(history, model, flags, normalizer).await?;
        body["stream"] = json!(true);
        Ok(self.request_builder(&body))
    }

    /// Build the non-streaming chat-completions request.
    pub async fn prepare_once_request(
        &self,
        history: &[ChatMessage],
        model: &Model,
        normalizer: &AttachmentNormalizer,
    ) -> Result<reqwest::RequestBuilder, ChatError> {
        let body = self
            .build_body(history, model, &SendFlags::default(), normalizer)
            .await?;
        Ok(self.request_builder(&body))
    }

    /// Extract the answer text from a non-streaming response body.
    pub fn parse_once_response(&self, body: &Value) -> Result<String, ChatError> {
        body.get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ChatError::Parse("response has no message content".into()))
    }

    fn request_builder(&self, body: &Value) -> reqwest::RequestBuilder {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        self.http_client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
    }

    async fn build_body(
        &self,
        history: &[ChatMessage],
        model: &Model,
        flags: &SendFlags,
        normalizer: &AttachmentNormalizer,
    ) -> Result<Value, ChatError> {
        if history.is_empty() {
            return Err(ChatError::InvalidInput("message history is empty".into()));
        }

        let mut messages = Vec::with_capacity(history.len());
        for message in history {
            messages.push(self.convert_message(message, model, normalizer).await);
        }

        let model_id = self.resolve_model_id(model, flags);
        Ok(json!({
            "model": model_id,
            "messages": messages,
            "max_tokens": DEFAULT_MAX_TOKENS,
        }))
    }

    fn resolve_model_id(&self, model: &Model, flags: &SendFlags) -> String {
        if !flags.web_search {
            return model.id.clone();
        }
        match SEARCH_MODEL_VARIANTS
            .iter()
            .find(|(id, _)| *id == model.id)
        {
            Some((_, variant)) => {
                tracing::debug!("substituting search variant {variant} for {}", model.id);
                (*variant).to_string()
            }
            None => {
                tracing::warn!(
                    "{} model {} has no search-capable variant, dropping web-search flag",
                    self.provider_label,
                    model.id
                );
                model.id.clone()
            }
        }
    }

    async fn convert_message(
        &self,
        message: &ChatMessage,
        model: &Model,
        normalizer: &AttachmentNormalizer,
    ) -> Value {
        let content = match &message.content {
            MessageContent::Text(text) => json!(text),
            MessageContent::Parts(parts) => {
                let mut converted = Vec::with_capacity(parts.len());
                for part in parts {
                    match part {
                        ContentPart::Text { text } => {
                            converted.push(json!({ "type": "text", "text": text }));
                        }
                        ContentPart::ImageUrl { url } => {
                            if model.supports_images {
                                converted.push(json!({
                                    "type": "image_url",
                                    "image_url": { "url": url },
                                }));
                            } else {
                                tracing::warn!(
                                    "dropping image part, {} does not support images",
                                    model.id
                                );
                            }
                        }
                        ContentPart::Document { document } => {
                            match normalizer.normalize_document(document).await {
                                NormalizedPart::Text(text) => {
                                    converted.push(json!({ "type": "text", "text": text }));
                                }
                                NormalizedPart::FileRef { file_id, .. } => {
                                    converted.push(json!({
                                        "type": "file",
                                        "file": { "file_id": file_id },
                                    }));
                                }
                            }
                        }
                    }
                }
                json!(converted)
            }
        };
        json!({ "role": message.role.as_str(), "content": content })
    }
}
