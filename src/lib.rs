//! polychat
//!
//! Provider-agnostic streaming core for multi-provider AI chat clients.
//!
//! Three vendor wire formats (OpenAI-style SSE, Anthropic-style typed SSE
//! events, and an in-band `<thinking>` tag convention) are normalized into a
//! single content/thinking event stream with abortable cancellation, plus a
//! best-effort memory layer and attachment normalization.
//!
//! ```rust,ignore
//! use polychat::prelude::*;
//!
//! let orchestrator = ChatOrchestrator::builder()
//!     .openai(api_key.into())
//!     .build();
//! let model = Model::find("gpt-4o").unwrap();
//! let cancel = CancelHandle::new();
//! let mut sink = |event: StreamEvent| match event {
//!     StreamEvent::ContentDelta { delta } => print!("{delta}"),
//!     StreamEvent::Complete { .. } => println!(),
//!     _ => {}
//! };
//! orchestrator
//!     .send(&history, model, &SendFlags::default(), &mut sink, &cancel)
//!     .await;
//! ```
#![deny(unsafe_code)]

pub mod attachments;
pub mod error;
pub mod files;
pub mod memory;
pub mod orchestrator;
pub mod providers;
pub mod sse;
pub mod stream;
pub mod thinking;
pub mod types;
pub mod utils;

pub use error::ChatError;
pub use orchestrator::{ChatOrchestrator, ChatOrchestratorBuilder};
pub use providers::SendFlags;
pub use stream::{CollectingSink, ErrorKind, EventSink, StreamEvent};
pub use types::{AVAILABLE_MODELS, ChatMessage, Model, ModelProvider};
pub use utils::CancelHandle;

/// Convenience re-exports for typical callers.
pub mod prelude {
    pub use crate::error::ChatError;
    pub use crate::memory::{MemoryClient, MemoryMessage};
    pub use crate::orchestrator::ChatOrchestrator;
    pub use crate::providers::SendFlags;
    pub use crate::stream::{CollectingSink, ErrorKind, EventSink, StreamEvent};
    pub use crate::types::{
        AVAILABLE_MODELS, ChatMessage, ContentPart, DocumentSource, MessageContent, MessageRole,
        Model, ModelProvider,
    };
    pub use crate::utils::CancelHandle;
}
