//! Anthropic-style request shaping.
//!
//! Vendor quirks reproduced here:
//! - the system prompt is a separate top-level field, and `system`-role
//!   entries are dropped from the message array;
//! - images and documents are typed content blocks carrying base64 payloads
//!   with the media type extracted from the data-URL prefix;
//! - models advertising reasoning get an extended-thinking budget;
//! - the web-search flag adds a server-side tool descriptor;
//! - any document block requires the PDF beta capability header.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::error::ChatError;
use crate::providers::SendFlags;
use crate::types::message::parse_data_url;
use crate::types::{ChatMessage, ContentPart, MessageContent, MessageRole, Model};

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PDF_BETA: &str = "pdfs-2024-09-25";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const THINKING_BUDGET_TOKENS: u32 = 1024;

/// Adapter for the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicAdapter {
    http_client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

struct ShapedRequest {
    body: Value,
    has_document: bool,
}

impl AnthropicAdapter {
    pub fn new(http_client: reqwest::Client, base_url: String, api_key: SecretString) -> Self {
        Self {
            http_client,
            base_url,
            api_key,
        }
    }

    /// Build the streaming messages request.
    pub fn prepare_stream_request(
        &self,
        history: &[ChatMessage],
        model: &Model,
        flags: &SendFlags,
    ) -> Result<reqwest::RequestBuilder, ChatError> {
        let mut shaped = self.shape_request(history, model, flags)?;
        shaped.body["stream"] = json!(true);
        Ok(self.request_builder(&shaped))
    }

    /// Build the non-streaming messages request.
    pub fn prepare_once_request(
        &self,
        history: &[ChatMessage],
        model: &Model,
    ) -> Result<reqwest::RequestBuilder, ChatError> {
        let shaped = self.shape_request(history, model, &SendFlags::default())?;
        Ok(self.request_builder(&shaped))
    }

    /// Extract the answer text from a non-streaming response body.
    pub fn parse_once_response(&self, body: &Value) -> Result<String, ChatError> {
        let blocks = body
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| ChatError::Parse("Anthropic response has no content array".into()))?;
        let text = blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("");
        Ok(text)
    }

    fn request_builder(&self, shaped: &ShapedRequest) -> reqwest::RequestBuilder {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let mut builder = self
            .http_client
            .post(url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&shaped.body);
        if shaped.has_document {
            builder = builder.header("anthropic-beta", PDF_BETA);
        }
        builder
    }

    fn shape_request(
        &self,
        history: &[ChatMessage],
        model: &Model,
        flags: &SendFlags,
    ) -> Result<ShapedRequest, ChatError> {
        if history.is_empty() {
            return Err(ChatError::InvalidInput("message history is empty".into()));
        }

        let mut has_document = false;
        let messages: Vec<Value> = history
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| {
                let content = match &m.content {
                    MessageContent::Text(text) => json!(text),
                    MessageContent::Parts(parts) => {
                        let blocks: Vec<Value> = parts
                            .iter()
                            .filter_map(|part| convert_part(part, &mut has_document))
                            .collect();
                        json!(blocks)
                    }
                };
                json!({ "role": m.role.as_str(), "content": content })
            })
            .collect();

        let mut body = json!({
            "model": model.id,
            "messages": messages,
            "max_tokens": DEFAULT_MAX_TOKENS,
        });

        let system = history
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_text());
        if let Some(system) = system
            && !system.is_empty()
        {
            body["system"] = json!(system);
        }

        if model.supports_reasoning {
            body["thinking"] = json!({
                "type": "enabled",
                "budget_tokens": THINKING_BUDGET_TOKENS,
            });
        }

        if flags.web_search {
            body["tools"] = json!([{
                "type": "web_search_20250305",
                "name": "web_search",
                "max_uses": 5,
            }]);
        }

        Ok(ShapedRequest { body, has_document })
    }
}

fn convert_part(part: &ContentPart, has_document: &mut bool) -> Option<Value> {
    match part {
        ContentPart::Text { text } => Some(json!({ "type": "text", "text": text })),
        ContentPart::ImageUrl { url } => {
            let Some((media_type, data)) = parse_data_url(url) else {
                tracing::warn!("dropping image part without a base64 data URL");
                return None;
            };
            Some(json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": media_type,
                    "data": data,
                },
            }))
        }
        ContentPart::Document { document } => {
            let Some((media_type, data)) = parse_data_url(&document.url) else {
                tracing::warn!("dropping document part without a base64 data URL");
                return None;
            };
            *has_document = true;
            Some(json!({
                "type": "document",
                "source": {
                    "type": "base64",
                    "media_type": media_type,
                    "data": data,
                },
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentSource;

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new(
            reqwest::Client::new(),
            DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            SecretString::from("sk-ant-test".to_string()),
        )
    }

    fn sonnet() -> Model {
        Model::find("claude-sonnet-4-20250514").unwrap().clone()
    }

    fn haiku() -> Model {
        Model::find("claude-3-5-haiku-20241022").unwrap().clone()
    }

    #[test]
    fn system_message_becomes_top_level_field() {
        let history = vec![
            ChatMessage::system("be terse"),
            ChatMessage::user("hello"),
        ];
        let shaped = adapter()
            .shape_request(&history, &haiku(), &SendFlags::default())
            .unwrap();
        assert_eq!(shaped.body["system"], "be terse");
        let messages = shaped.body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn image_data_url_becomes_base64_block() {
        let history = vec![ChatMessage::user_parts(vec![
            ContentPart::Text {
                text: "what is this?".into(),
            },
            ContentPart::ImageUrl {
                url: "data:image/png;base64,iVBORw0KGgo=".into(),
            },
        ])];
        let shaped = adapter()
            .shape_request(&history, &haiku(), &SendFlags::default())
            .unwrap();
        let blocks = shaped.body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(blocks[1]["type"], "image");
        assert_eq!(blocks[1]["source"]["media_type"], "image/png");
        assert_eq!(blocks[1]["source"]["data"], "iVBORw0KGgo=");
        assert!(!shaped.has_document);
    }

    #[test]
    fn document_block_sets_beta_flag() {
        let history = vec![ChatMessage::user_parts(vec![ContentPart::Document {
            document: DocumentSource {
                url: "data:application/pdf;base64,JVBERi0=".into(),
                name: "paper.pdf".into(),
                mime_type: "application/pdf".into(),
                source_uri: None,
            },
        }])];
        let shaped = adapter()
            .shape_request(&history, &haiku(), &SendFlags::default())
            .unwrap();
        assert!(shaped.has_document);
        let blocks = shaped.body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(blocks[0]["type"], "document");
        assert_eq!(blocks[0]["source"]["media_type"], "application/pdf");
    }

    #[test]
    fn reasoning_model_gets_thinking_budget() {
        let history = vec![ChatMessage::user("hi")];
        let shaped = adapter()
            .shape_request(&history, &sonnet(), &SendFlags::default())
            .unwrap();
        assert_eq!(shaped.body["thinking"]["type"], "enabled");
        assert_eq!(shaped.body["thinking"]["budget_tokens"], 1024);

        let shaped = adapter()
            .shape_request(&history, &haiku(), &SendFlags::default())
            .unwrap();
        assert!(shaped.body.get("thinking").is_none());
    }

    #[test]
    fn web_search_adds_tool_descriptor() {
        let history = vec![ChatMessage::user("latest news?")];
        let flags = SendFlags { web_search: true };
        let shaped = adapter().shape_request(&history, &haiku(), &flags).unwrap();
        assert_eq!(shaped.body["tools"][0]["type"], "web_search_20250305");
        assert_eq!(shaped.body["tools"][0]["name"], "web_search");
    }

    #[test]
    fn once_response_joins_text_blocks() {
        let body = json!({
            "content": [
                { "type": "thinking", "thinking": "hmm" },
                { "type": "text", "text": "Hello " },
                { "type": "text", "text": "world" },
            ]
        });
        assert_eq!(adapter().parse_once_response(&body).unwrap(), "Hello world");
    }

    #[test]
    fn empty_history_is_invalid() {
        let result = adapter().shape_request(&[], &haiku(), &SendFlags::default());
        assert!(matches!(result, Err(ChatError::InvalidInput(_))));
    }
}
