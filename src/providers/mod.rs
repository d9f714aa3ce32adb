//! Provider adapters.
//!
//! An adapter translates the provider-neutral request (message history,
//! model, feature flags) into one vendor's wire schema and acquires the SSE
//! response stream. Adapters never interpret streamed content; that is the
//! wire parser's job.
//!
//! Dispatch is a closed enum resolved once per model provider, not a string
//! comparison per call.

pub mod anthropic;
pub mod openai;

use std::pin::Pin;

use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::Stream;

use crate::error::ChatError;
use crate::sse::WireFormat;

pub use anthropic::AnthropicAdapter;
pub use openai::OpenAiAdapter;

/// Per-send feature toggles.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendFlags {
    pub web_search: bool,
}

/// Closed adapter dispatch. xAI is an `OpenAiAdapter` configured with the
/// xAI base URL and key.
pub enum ProviderAdapter {
    OpenAi(OpenAiAdapter),
    Anthropic(AnthropicAdapter),
}

impl ProviderAdapter {
    pub fn wire_format(&self) -> WireFormat {
        match self {
            Self::OpenAi(_) => WireFormat::OpenAi,
            Self::Anthropic(_) => WireFormat::Anthropic,
        }
    }
}

/// SSE event stream as surfaced by the transport layer.
pub(crate) type SseStream =
    Pin<Box<dyn Stream<Item = Result<Event, EventStreamError<reqwest::Error>>> + Send>>;

/// Send a prepared request and acquire its SSE stream.
///
/// A non-success status fails with the vendor body preserved; transport
/// failures map to `ChatError::Http`.
pub(crate) async fn acquire_sse_stream(
    request: reqwest::RequestBuilder,
) -> Result<SseStream, ChatError> {
    let response = request
        .send()
        .await
        .map_err(|e| ChatError::Http(format!("failed to send request: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ChatError::Api {
            status: status.as_u16(),
            body,
        });
    }

    Ok(Box::pin(response.bytes_stream().eventsource()))
}

/// Issue a non-streaming request and return the parsed JSON body.
pub(crate) async fn fetch_json(
    request: reqwest::RequestBuilder,
) -> Result<serde_json::Value, ChatError> {
    let response = request
        .send()
        .await
        .map_err(|e| ChatError::Http(format!("failed to send request: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ChatError::Api {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| ChatError::Parse(format!("invalid response body: {e}")))
}
