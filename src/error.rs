//! Error types for the streaming core.
//!
//! The taxonomy deliberately stays small: transport failures, provider HTTP
//! errors (with the vendor body preserved), and cancellation. Parse failures
//! on individual SSE lines are handled inline by the wire parsers and never
//! reach callers.

use thiserror::Error;

/// Errors produced by provider adapters and the orchestrator.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Network-level failure: the connection never produced a usable stream.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success HTTP status from a provider, body preserved verbatim.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Malformed payload where a parse failure cannot be skipped
    /// (e.g. a non-streaming response body).
    #[error("Parse error: {0}")]
    Parse(String),

    /// Caller handed us something unusable (unknown model, empty history).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The in-flight stream was aborted via its cancel handle.
    /// Not a failure; callers should preserve partial output.
    #[error("stream cancelled")]
    Cancelled,
}

impl ChatError {
    /// Whether this error is the cooperative-cancellation terminal state.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
