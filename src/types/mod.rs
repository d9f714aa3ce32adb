//! Core data types: the model catalog and chat message structures.

pub mod message;
pub mod model;

pub use message::{ChatMessage, ContentPart, DocumentSource, MessageContent, MessageRole};
pub use model::{AVAILABLE_MODELS, Model, ModelProvider};
