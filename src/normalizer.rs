//! Conversion of raised errors into canonical envelopes.

use tracing::{error, warn};

use crate::config::Environment;
use crate::context::RequestContext;
use crate::error::{error_chain, ApiError, ErrorClassification};
use crate::response::ResponseEnvelope;

/// Turns any raised [`ApiError`] into a classification and a canonical
/// error envelope.
///
/// Normalization is a pure function of the error value and the request
/// context; the same inputs always produce the same classification and
/// envelope fields.
#[derive(Debug, Clone)]
pub struct ExceptionNormalizer {
    mode: Environment,
}

impl ExceptionNormalizer {
    pub fn new(mode: Environment) -> Self {
        Self { mode }
    }

    /// Classify the error and build the client-facing envelope.
    ///
    /// The diagnostic chain is attached only outside production; clients
    /// in production get the sanitized message alone.
    pub fn normalize(
        &self,
        error: &ApiError,
        ctx: &RequestContext,
    ) -> (ErrorClassification, ResponseEnvelope) {
        let classification = error.classify();
        let stack = if self.mode.is_production() {
            None
        } else {
            Some(error_chain(error))
        };
        let envelope = ResponseEnvelope::failure(
            ctx,
            classification.status,
            classification.message.clone(),
            classification.errors.clone(),
            stack,
        );
        (classification, envelope)
    }

    /// Internal observability side effect.
    ///
    /// The full diagnostic chain is always logged, regardless of what
    /// the client-facing envelope carries.
    pub fn report(
        &self,
        error: &ApiError,
        classification: &ErrorClassification,
        ctx: &RequestContext,
    ) {
        let chain = error_chain(error);
        if classification.status.is_server_error() {
            error!(
                method = %ctx.method,
                path = %ctx.path,
                status = classification.status.as_u16(),
                error = %chain,
                "request failed"
            );
        } else {
            warn!(
                method = %ctx.method,
                path = %ctx.path,
                status = classification.status.as_u16(),
                error = %chain,
                "request rejected"
            );
        }
    }
}
