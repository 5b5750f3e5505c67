//! Tower middleware adapting the boundary pipeline to an axum router.
//!
//! The stack is explicit and ordered; the host applies it with
//! `ServiceBuilder`, outermost first:
//! 1. `ContextLayer`: capture the request context, assign the request id
//! 2. `LoggingLayer`: entry/exit records around the inner service
//! 3. `EnvelopeLayer`: success enveloping and error normalization
//!
//! Requests flow context → logging → envelope → handler; responses
//! travel back in reverse, so exit logging observes the status the
//! normalizer resolved rather than the raw handler outcome.

pub mod context;
pub mod envelope;
pub mod logging;

pub use context::ContextLayer;
pub use envelope::EnvelopeLayer;
pub use logging::LoggingLayer;
