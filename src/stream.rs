//! Normalized stream event model.
//!
//! Every provider's wire format is reduced to the same event vocabulary:
//! incremental content and thinking deltas followed by exactly one terminal
//! event (`Complete`, `Cancelled`, or `Error`). Events are delivered to the
//! caller's sink in the order their source bytes arrived.

use crate::error::ChatError;

/// Coarse classification carried by an `Error` terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection-level failure; no usable response stream was produced.
    Transport,
    /// Non-success HTTP status from the provider.
    Provider { status: u16 },
    /// Anything else (invalid input, unparseable non-streaming body).
    Internal,
}

impl From<&ChatError> for ErrorKind {
    fn from(err: &ChatError) -> Self {
        match err {
            ChatError::Http(_) => Self::Transport,
            ChatError::Api { status, .. } => Self::Provider { status: *status },
            _ => Self::Internal,
        }
    }
}

/// A normalized incremental event.
///
/// `Complete`, `Cancelled` and `Error` are terminal: exactly one of them is
/// emitted per send call, always last. `Cancelled` is not a failure; it
/// carries the partial output accumulated before the abort so callers can
/// preserve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    ContentDelta {
        delta: String,
    },
    ThinkingDelta {
        delta: String,
    },
    Complete {
        content: String,
        thinking: String,
    },
    Cancelled {
        content: String,
        thinking: String,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl StreamEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete { .. } | Self::Cancelled { .. } | Self::Error { .. }
        )
    }
}

/// Caller-supplied receiver for normalized events.
///
/// Closures work directly: `&mut |event| { ... }`.
pub trait EventSink: Send {
    fn emit(&mut self, event: StreamEvent);
}

impl<F> EventSink for F
where
    F: FnMut(StreamEvent) + Send,
{
    fn emit(&mut self, event: StreamEvent) {
        self(event)
    }
}

/// A sink that collects events into a vector. Useful in tests and for
/// callers that want the whole event trace.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub events: Vec<StreamEvent>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for CollectingSink {
    fn emit(&mut self, event: StreamEvent) {
        self.events.push(event);
    }
}

/// Accumulates deltas into the final content/thinking strings handed to the
/// terminal event.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    thinking: String,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a delta event. Terminal events are ignored.
    pub fn push(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::ContentDelta { delta } => self.content.push_str(delta),
            StreamEvent::ThinkingDelta { delta } => self.thinking.push_str(delta),
            _ => {}
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    /// Consume the accumulator, returning `(content, thinking)`.
    pub fn finish(self) -> (String, String) {
        (self.content, self.thinking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_partitions_deltas() {
        let mut acc = StreamAccumulator::new();
        acc.push(&StreamEvent::ContentDelta { delta: "Hel".into() });
        acc.push(&StreamEvent::ThinkingDelta {
            delta: "hmm".into(),
        });
        acc.push(&StreamEvent::ContentDelta { delta: "lo".into() });
        let (content, thinking) = acc.finish();
        assert_eq!(content, "Hello");
        assert_eq!(thinking, "hmm");
    }

    #[test]
    fn terminal_classification() {
        assert!(
            StreamEvent::Complete {
                content: String::new(),
                thinking: String::new()
            }
            .is_terminal()
        );
        assert!(!StreamEvent::ContentDelta { delta: "x".into() }.is_terminal());
    }

    #[test]
    fn error_kind_mapping() {
        let err = ChatError::Api {
            status: 429,
            body: "rate limited".into(),
        };
        assert_eq!(ErrorKind::from(&err), ErrorKind::Provider { status: 429 });
        assert_eq!(
            ErrorKind::from(&ChatError::Http("reset".into())),
            ErrorKind::Transport
        );
    }
}
