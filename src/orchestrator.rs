//! Send orchestration.
//!
//! `ChatOrchestrator` is the single entry point: it resolves the provider
//! adapter for the selected model, optionally augments the history with
//! memory context, drives the SSE stream through the wire parser and the
//! thinking-tag machine, and feeds normalized events to the caller's sink
//! with exactly one terminal event per call.

use std::sync::Arc;

use futures_util::StreamExt;

use crate::attachments::AttachmentNormalizer;
use crate::error::ChatError;
use crate::files::{FileUploadClient, OpenAiFileUpload};
use crate::memory::{MemoryClient, MemoryMessage, format_memories_for_context};
use crate::providers::{
    AnthropicAdapter, OpenAiAdapter, ProviderAdapter, SendFlags, acquire_sse_stream, fetch_json,
};
use crate::sse::WireParser;
use crate::stream::{ErrorKind, EventSink, StreamAccumulator, StreamEvent};
use crate::thinking::{TagEvent, TagParser};
use crate::types::{ChatMessage, ContentPart, MessageContent, MessageRole, Model, ModelProvider};
use crate::utils::CancelHandle;

use secrecy::SecretString;

/// How many ranked facts a memory lookup requests.
const MEMORY_SEARCH_LIMIT: usize = 5;

/// Terminal outcome of one pipeline run, before sink delivery.
enum Terminal {
    Complete { content: String, thinking: String },
    Cancelled { content: String, thinking: String },
    Error(ChatError),
}

/// Builder for [`ChatOrchestrator`]. Providers are optional; sending to a
/// model whose provider was not configured fails with `InvalidInput`.
#[derive(Default)]
pub struct ChatOrchestratorBuilder {
    http_client: Option<reqwest::Client>,
    openai: Option<(String, SecretString)>,
    anthropic: Option<(String, SecretString)>,
    xai: Option<(String, SecretString)>,
    memory: Option<MemoryClient>,
    upload_client: Option<Arc<dyn FileUploadClient>>,
}

impl ChatOrchestratorBuilder {
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn openai(mut self, api_key: SecretString) -> Self {
        self.openai = Some((
            crate::providers::openai::DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key,
        ));
        self
    }

    pub fn openai_with_base_url(mut self, base_url: String, api_key: SecretString) -> Self {
        self.openai = Some((base_url, api_key));
        self
    }

    pub fn anthropic(mut self, api_key: SecretString) -> Self {
        self.anthropic = Some((
            crate::providers::anthropic::DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            api_key,
        ));
        self
    }

    pub fn anthropic_with_base_url(mut self, base_url: String, api_key: SecretString) -> Self {
        self.anthropic = Some((base_url, api_key));
        self
    }

    pub fn xai(mut self, api_key: SecretString) -> Self {
        self.xai = Some((
            crate::providers::openai::DEFAULT_XAI_BASE_URL.to_string(),
            api_key,
        ));
        self
    }

    pub fn xai_with_base_url(mut self, base_url: String, api_key: SecretString) -> Self {
        self.xai = Some((base_url, api_key));
        self
    }

    pub fn memory(mut self, memory: MemoryClient) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Override the file-upload collaborator (tests, constrained runtimes).
    pub fn upload_client(mut self, client: Arc<dyn FileUploadClient>) -> Self {
        self.upload_client = Some(client);
        self
    }

    pub fn build(self) -> ChatOrchestrator {
        let http_client = self.http_client.unwrap_or_default();

        let openai_adapter = self
            .openai
            .map(|(base_url, key)| OpenAiAdapter::new(http_client.clone(), base_url, key, "openai"));
        let anthropic = self.anthropic.map(|(base_url, key)| {
            ProviderAdapter::Anthropic(AnthropicAdapter::new(http_client.clone(), base_url, key))
        });
        let xai = self.xai.map(|(base_url, key)| {
            ProviderAdapter::OpenAi(OpenAiAdapter::new(http_client.clone(), base_url, key, "xai"))
        });

        // Default upload collaborator: the OpenAI files endpoint, when
        // OpenAI credentials exist. PDFs degrade to placeholders otherwise.
        let uploader: Option<Arc<dyn FileUploadClient>> = self.upload_client.or_else(|| {
            openai_adapter.as_ref().map(|adapter| {
                Arc::new(OpenAiFileUpload::new(
                    http_client.clone(),
                    adapter.base_url().to_string(),
                    adapter.api_key().clone(),
                )) as Arc<dyn FileUploadClient>
            })
        });

        ChatOrchestrator {
            openai: openai_adapter.map(ProviderAdapter::OpenAi),
            anthropic,
            xai,
            normalizer: AttachmentNormalizer::new(uploader),
            memory: self.memory,
        }
    }
}

/// The send-with-memory orchestrator (see module docs).
pub struct ChatOrchestrator {
    openai: Option<ProviderAdapter>,
    anthropic: Option<ProviderAdapter>,
    xai: Option<ProviderAdapter>,
    normalizer: AttachmentNormalizer,
    memory: Option<MemoryClient>,
}

impl ChatOrchestrator {
    pub fn builder() -> ChatOrchestratorBuilder {
        ChatOrchestratorBuilder::default()
    }

    fn adapter_for(&self, provider: ModelProvider) -> Result<&ProviderAdapter, ChatError> {
        let slot = match provider {
            ModelProvider::OpenAi => &self.openai,
            ModelProvider::Anthropic => &self.anthropic,
            ModelProvider::XAi => &self.xai,
        };
        slot.as_ref().ok_or_else(|| {
            ChatError::InvalidInput(format!("provider {provider:?} is not configured"))
        })
    }

    /// Stream one completion, feeding every normalized delta to `sink` in
    /// arrival order. Exactly one terminal event (`Complete`, `Cancelled`,
    /// or `Error`) is emitted, always last.
    pub async fn send(
        &self,
        history: &[ChatMessage],
        model: &Model,
        flags: &SendFlags,
        sink: &mut dyn EventSink,
        cancel: &CancelHandle,
    ) {
        let terminal = self.run_stream(history, model, flags, sink, cancel).await;
        self.emit_terminal(terminal, sink);
    }

    /// [`Self::send`] with best-effort memory augmentation: relevant facts
    /// for `scope_id` are merged into the system message before dispatch,
    /// and the completed turn is saved back afterwards. Memory failures
    /// never block or fail the send.
    pub async fn send_with_memory(
        &self,
        history: &[ChatMessage],
        model: &Model,
        flags: &SendFlags,
        scope_id: &str,
        sink: &mut dyn EventSink,
        cancel: &CancelHandle,
    ) {
        let utterance = latest_user_utterance(history);
        let history = match (&self.memory, utterance.as_deref()) {
            (Some(memory), Some(utterance)) if !utterance.is_empty() => {
                let hits = memory.search(utterance, scope_id, MEMORY_SEARCH_LIMIT).await;
                augment_with_memories(history, &hits)
            }
            _ => history.to_vec(),
        };

        let terminal = self
            .run_stream(&history, model, flags, sink, cancel)
            .await;

        let completed = match &terminal {
            Terminal::Complete { content, .. } => Some(content.clone()),
            _ => None,
        };
        self.emit_terminal(terminal, sink);

        if let (Some(memory), Some(answer), Some(utterance)) =
            (&self.memory, completed, utterance)
            && !answer.is_empty()
        {
            let turn = [
                MemoryMessage::user(utterance),
                MemoryMessage::assistant(answer),
            ];
            memory
                .add(&turn, scope_id, Some(serde_json::json!({ "model": model.name })))
                .await;
        }
    }

    /// Non-streaming request/response path.
    pub async fn send_once(
        &self,
        history: &[ChatMessage],
        model: &Model,
    ) -> Result<String, ChatError> {
        match self.adapter_for(model.provider)? {
            ProviderAdapter::OpenAi(adapter) => {
                let request = adapter
                    .prepare_once_request(history, model, &self.normalizer)
                    .await?;
                let body = fetch_json(request).await?;
                adapter.parse_once_response(&body)
            }
            ProviderAdapter::Anthropic(adapter) => {
                let request = adapter.prepare_once_request(history, model)?;
                let body = fetch_json(request).await?;
                adapter.parse_once_response(&body)
            }
        }
    }

    fn emit_terminal(&self, terminal: Terminal, sink: &mut dyn EventSink) {
        match terminal {
            Terminal::Complete { content, thinking } => {
                sink.emit(StreamEvent::Complete { content, thinking });
            }
            Terminal::Cancelled { content, thinking } => {
                tracing::debug!("stream cancelled with {} bytes of partial content", content.len());
                sink.emit(StreamEvent::Cancelled { content, thinking });
            }
            Terminal::Error(err) => {
                tracing::warn!("stream failed: {err}");
                sink.emit(StreamEvent::Error {
                    kind: ErrorKind::from(&err),
                    message: err.to_string(),
                });
            }
        }
    }

    async fn run_stream(
        &self,
        history: &[ChatMessage],
        model: &Model,
        flags: &SendFlags,
        sink: &mut dyn EventSink,
        cancel: &CancelHandle,
    ) -> Terminal {
        let mut acc = StreamAccumulator::new();
        if cancel.is_cancelled() {
            return cancelled(acc);
        }

        let adapter = match self.adapter_for(model.provider) {
            Ok(adapter) => adapter,
            Err(err) => return Terminal::Error(err),
        };

        let request = match adapter {
            ProviderAdapter::OpenAi(a) => {
                a.prepare_stream_request(history, model, flags, &self.normalizer)
                    .await
            }
            ProviderAdapter::Anthropic(a) => a.prepare_stream_request(history, model, flags),
        };
        let request = match request {
            Ok(request) => request,
            Err(err) => return Terminal::Error(err),
        };

        let mut events = match acquire_sse_stream(request).await {
            Ok(events) => events,
            Err(err) => return Terminal::Error(err),
        };

        let parser = WireParser::new(adapter.wire_format());
        let mut tags = TagParser::new();

        loop {
            if cancel.is_cancelled() {
                // Dropping the stream closes the connection.
                return cancelled(acc);
            }
            // Race the read against cancellation so a stalled connection
            // cannot hold the send open past its handle.
            let item = tokio::select! {
                _ = cancel.cancelled() => return cancelled(acc),
                item = events.next() => item,
            };
            let Some(item) = item else {
                break;
            };
            match item {
                Ok(event) => {
                    let Some(delta) = parser.parse_data(&event.data) else {
                        continue;
                    };
                    // Native thinking bypasses the tag machine; content is
                    // always passed through it, since in-band tags can
                    // appear regardless of native reasoning support.
                    if let Some(thinking) = delta.thinking {
                        deliver(sink, &mut acc, StreamEvent::ThinkingDelta { delta: thinking });
                    }
                    if let Some(content) = delta.content {
                        for tag_event in tags.push(&content) {
                            deliver(sink, &mut acc, tag_event_to_stream(tag_event));
                        }
                    }
                }
                Err(err) => {
                    return Terminal::Error(ChatError::Http(format!("stream error: {err}")));
                }
            }
        }

        for tag_event in tags.finish() {
            deliver(sink, &mut acc, tag_event_to_stream(tag_event));
        }
        let (content, thinking) = acc.finish();
        Terminal::Complete { content, thinking }
    }
}

fn cancelled(acc: StreamAccumulator) -> Terminal {
    let (content, thinking) = acc.finish();
    Terminal::Cancelled { content, thinking }
}

fn deliver(sink: &mut dyn EventSink, acc: &mut StreamAccumulator, event: StreamEvent) {
    acc.push(&event);
    sink.emit(event);
}

fn tag_event_to_stream(event: TagEvent) -> StreamEvent {
    match event {
        TagEvent::Content(delta) => StreamEvent::ContentDelta { delta },
        TagEvent::Thinking(delta) => StreamEvent::ThinkingDelta { delta },
    }
}

/// Text of the most recent user message, used as the memory search query.
fn latest_user_utterance(history: &[ChatMessage]) -> Option<String> {
    history
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .map(|m| m.content.as_text())
}

/// Merge a formatted memory block into the system message, creating one at
/// the front of the history if absent. No-op when there are no hits.
fn augment_with_memories(
    history: &[ChatMessage],
    hits: &[crate::memory::MemoryHit],
) -> Vec<ChatMessage> {
    let block = format_memories_for_context(hits);
    if block.is_empty() {
        return history.to_vec();
    }

    let mut augmented = history.to_vec();
    match augmented.iter_mut().find(|m| m.role == MessageRole::System) {
        Some(system) => match &mut system.content {
            MessageContent::Text(text) => text.push_str(&block),
            MessageContent::Parts(parts) => parts.push(ContentPart::Text {
                text: block.trim_start().to_string(),
            }),
        },
        None => {
            augmented.insert(
                0,
                ChatMessage::system(block.trim_start().to_string()),
            );
        }
    }
    augmented
}
