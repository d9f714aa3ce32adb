//! Shared utilities.

pub mod cancel;

pub use cancel::CancelHandle;
