//! Provider wire-format parsing.
//!
//! Raw response bytes are decoded into SSE events by `eventsource-stream`
//! (UTF-8 boundaries, partial-line carry-over and the final flush at stream
//! end are handled there; lines without a `data:` field never surface).
//! This module turns one event's `data` payload into a provider-neutral
//! [`WireDelta`].
//!
//! Discriminator policy: Anthropic deltas are classified strictly by their
//! `type` field (`text_delta` vs `thinking_delta`). The older behavior of
//! treating any `delta.text` as content regardless of block type is
//! superseded because it misclassifies thinking deltas on responses that
//! carry text without the discriminator.

use serde::Deserialize;

/// Which vendor wire shape a stream uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// `choices[0].delta.{content,reasoning_content}` chat-completions
    /// chunks. Used by OpenAI and xAI.
    OpenAi,
    /// Typed `content_block_delta` events.
    Anthropic,
}

/// A provider-neutral incremental delta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireDelta {
    pub content: Option<String>,
    pub thinking: Option<String>,
}

impl WireDelta {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.thinking.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiChunk {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    #[serde(default)]
    delta: Option<OpenAiDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
    // Reasoning field names vary across OpenAI-compatible backends;
    // checked in priority order below.
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

impl OpenAiDelta {
    fn reasoning_text(&self) -> Option<&String> {
        [&self.reasoning_content, &self.thinking, &self.reasoning]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicChunk {
    r#type: String,
    #[serde(default)]
    delta: Option<AnthropicDelta>,
}

#[derive(Debug, Deserialize)]
struct AnthropicDelta {
    #[serde(rename = "type", default)]
    delta_type: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
}

/// Parses one SSE `data` payload for a fixed wire format.
#[derive(Debug, Clone, Copy)]
pub struct WireParser {
    format: WireFormat,
}

impl WireParser {
    pub fn new(format: WireFormat) -> Self {
        Self { format }
    }

    /// Parse one `data` payload.
    ///
    /// Returns `None` for `[DONE]`, for payloads carrying no delta, and for
    /// malformed JSON. A malformed line is logged and skipped; it never
    /// aborts the stream.
    pub fn parse_data(&self, data: &str) -> Option<WireDelta> {
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return None;
        }
        match self.format {
            WireFormat::OpenAi => self.parse_openai(data),
            WireFormat::Anthropic => self.parse_anthropic(data),
        }
    }

    fn parse_openai(&self, data: &str) -> Option<WireDelta> {
        let chunk: OpenAiChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(err) => {
                tracing::warn!("skipping malformed OpenAI-style SSE line: {err}");
                return None;
            }
        };
        let delta = chunk.choices.first()?.delta.as_ref()?;
        let wire = WireDelta {
            content: delta.content.clone().filter(|s| !s.is_empty()),
            thinking: delta.reasoning_text().cloned(),
        };
        (!wire.is_empty()).then_some(wire)
    }

    fn parse_anthropic(&self, data: &str) -> Option<WireDelta> {
        let chunk: AnthropicChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(err) => {
                tracing::warn!("skipping malformed Anthropic SSE line: {err}");
                return None;
            }
        };
        if chunk.r#type != "content_block_delta" {
            return None;
        }
        let delta = chunk.delta?;
        let wire = match delta.delta_type.as_deref() {
            Some("text_delta") => WireDelta {
                content: delta.text.filter(|s| !s.is_empty()),
                thinking: None,
            },
            Some("thinking_delta") => WireDelta {
                content: None,
                thinking: delta.thinking.filter(|s| !s.is_empty()),
            },
            _ => WireDelta::default(),
        };
        (!wire.is_empty()).then_some(wire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_content_delta() {
        let parser = WireParser::new(WireFormat::OpenAi);
        let delta = parser
            .parse_data(r#"{"choices":[{"delta":{"content":"Hello"}}]}"#)
            .unwrap();
        assert_eq!(delta.content.as_deref(), Some("Hello"));
        assert!(delta.thinking.is_none());
    }

    #[test]
    fn openai_reasoning_content_is_thinking() {
        let parser = WireParser::new(WireFormat::OpenAi);
        let delta = parser
            .parse_data(r#"{"choices":[{"delta":{"reasoning_content":"step 1"}}]}"#)
            .unwrap();
        assert_eq!(delta.thinking.as_deref(), Some("step 1"));
        assert!(delta.content.is_none());
    }

    #[test]
    fn openai_reasoning_field_priority() {
        let parser = WireParser::new(WireFormat::OpenAi);
        let delta = parser
            .parse_data(
                r#"{"choices":[{"delta":{"reasoning_content":"primary","reasoning":"fallback"}}]}"#,
            )
            .unwrap();
        assert_eq!(delta.thinking.as_deref(), Some("primary"));
    }

    #[test]
    fn anthropic_text_delta() {
        let parser = WireParser::new(WireFormat::Anthropic);
        let delta = parser
            .parse_data(r#"{"type":"content_block_delta","delta":{"type":"text_delta","text":"Hi"}}"#)
            .unwrap();
        assert_eq!(delta.content.as_deref(), Some("Hi"));
    }

    #[test]
    fn anthropic_thinking_delta() {
        let parser = WireParser::new(WireFormat::Anthropic);
        let delta = parser
            .parse_data(
                r#"{"type":"content_block_delta","delta":{"type":"thinking_delta","thinking":"considering..."}}"#,
            )
            .unwrap();
        assert_eq!(delta.thinking.as_deref(), Some("considering..."));
        assert!(delta.content.is_none());
    }

    #[test]
    fn anthropic_non_delta_events_are_ignored() {
        let parser = WireParser::new(WireFormat::Anthropic);
        assert!(
            parser
                .parse_data(r#"{"type":"message_start","message":{"id":"msg_1"}}"#)
                .is_none()
        );
    }

    #[test]
    fn anthropic_untyped_text_is_not_classified() {
        // Strict discriminator policy: a delta without a type field does not
        // contribute content even when it carries text.
        let parser = WireParser::new(WireFormat::Anthropic);
        assert!(
            parser
                .parse_data(r#"{"type":"content_block_delta","delta":{"text":"loose"}}"#)
                .is_none()
        );
    }

    #[test]
    fn malformed_json_is_swallowed() {
        for format in [WireFormat::OpenAi, WireFormat::Anthropic] {
            let parser = WireParser::new(format);
            assert!(parser.parse_data("{not json").is_none());
        }
    }

    #[test]
    fn done_marker_yields_nothing() {
        let parser = WireParser::new(WireFormat::OpenAi);
        assert!(parser.parse_data("[DONE]").is_none());
        assert!(parser.parse_data("  [DONE]  ").is_none());
    }
}
