//! Cooperative cancellation.
//!
//! One handle per in-flight stream, owned by the caller. The core observes
//! the token at every chunk boundary and races it against the pending
//! network read, so a cancel lands even while the connection is stalled.

use tokio_util::sync::CancellationToken;

/// A cloneable handle used to request cancellation of an in-flight stream.
///
/// Cancelling does not fail the stream: the orchestrator surfaces a distinct
/// `Cancelled` terminal event carrying whatever output was already streamed.
/// Dropping the cancelled stream closes the underlying HTTP connection so
/// the provider stops generating tokens.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Wakes any read currently pending on
    /// [`Self::cancelled`].
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation is requested. Raced against the transport
    /// read so a stalled connection cannot outlive its handle.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
