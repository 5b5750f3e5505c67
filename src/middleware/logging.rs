//! Entry/exit logging middleware.
//!
//! Wires an explicit [`RequestLogger`] handle around the inner service;
//! the handle is injected at construction rather than taken from global
//! state, so hosts control the sink configuration per pipeline.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use http::{Request, Response, StatusCode};
use tower::{Layer, Service};

use crate::context::RequestContext;
use crate::logger::{ExitOutcome, RequestLogger};

/// Tower layer for request/response logging.
///
/// Must sit outside the envelope layer so exit records carry the status
/// the normalizer resolved.
#[derive(Debug, Clone)]
pub struct LoggingLayer {
    logger: Arc<RequestLogger>,
}

impl LoggingLayer {
    pub fn new(logger: RequestLogger) -> Self {
        Self {
            logger: Arc::new(logger),
        }
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingMiddleware {
            inner,
            logger: Arc::clone(&self.logger),
        }
    }
}

/// Logging middleware service.
#[derive(Debug, Clone)]
pub struct LoggingMiddleware<S> {
    inner: S,
    logger: Arc<RequestLogger>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for LoggingMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let logger = Arc::clone(&self.logger);
        let ctx = req.extensions().get::<Arc<RequestContext>>().cloned();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let Some(ctx) = ctx else {
                // No captured context; nothing to log against.
                return inner.call(req).await;
            };

            logger.emit(&logger.on_entry(&ctx));

            let start = Instant::now();
            let response = inner.call(req).await?;
            let elapsed = start.elapsed();

            let outcome = response
                .extensions()
                .get::<ExitOutcome>()
                .cloned()
                .unwrap_or_else(|| default_outcome(response.status()));

            logger.emit(&logger.on_exit(&ctx, &outcome, elapsed));

            // `path` is deliberately not a metric label; unbounded
            // handler paths would explode cardinality.
            let labels = [
                ("method", ctx.method.to_string()),
                ("status", response.status().as_u16().to_string()),
            ];
            metrics::counter!("http_requests_total", &labels).increment(1);
            metrics::histogram!("http_request_duration_seconds", &labels)
                .record(elapsed.as_secs_f64());

            Ok(response)
        })
    }
}

/// Outcome for responses that bypassed the envelope layer.
fn default_outcome(status: StatusCode) -> ExitOutcome {
    if status.is_client_error() || status.is_server_error() {
        ExitOutcome::Failure {
            status,
            message: status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
        }
    } else {
        ExitOutcome::Success {
            status,
            bytes: None,
        }
    }
}
