//! Request context capture middleware.
//!
//! Must be the outermost pipeline layer: the logging and envelope layers
//! read the [`RequestContext`] this one stores in request extensions.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{to_bytes, Body};
use axum::response::{IntoResponse, Response};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderValue, Request, StatusCode};
use serde_json::Value;
use tower::{Layer, Service};
use tracing::debug;

use crate::config::Environment;
use crate::context::{extract_or_generate, RequestContext, RequestId, REQUEST_ID_HEADER};
use crate::error::ApiError;

/// Tower layer that captures a [`RequestContext`] into request
/// extensions and echoes the request id on the response.
#[derive(Debug, Clone)]
pub struct ContextLayer {
    mode: Environment,
    max_captured_body_bytes: usize,
}

impl ContextLayer {
    pub fn new(mode: Environment, max_captured_body_bytes: usize) -> Self {
        Self {
            mode,
            max_captured_body_bytes,
        }
    }
}

impl<S> Layer<S> for ContextLayer {
    type Service = ContextMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ContextMiddleware {
            inner,
            mode: self.mode,
            max_captured_body_bytes: self.max_captured_body_bytes,
        }
    }
}

/// Context capture middleware service.
#[derive(Debug, Clone)]
pub struct ContextMiddleware<S> {
    inner: S,
    mode: Environment,
    max_captured_body_bytes: usize,
}

impl<S> Service<Request<Body>> for ContextMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), S::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let capture_body = !self.mode.is_production();
        let limit = self.max_captured_body_bytes;

        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let request_id = extract_or_generate(&parts.headers);

            // Buffer the body for logging only outside production, only
            // for JSON with a known length under the cap. Chunked and
            // oversized bodies stream through uncaptured.
            let (body, captured) = if capture_body && json_body_within(&parts.headers, limit) {
                match to_bytes(body, limit).await {
                    Ok(bytes) => {
                        let parsed = serde_json::from_slice::<Value>(&bytes).ok();
                        (Body::from(bytes), parsed)
                    }
                    Err(err) => {
                        debug!(error = %err, "failed to buffer request body");
                        let mut response =
                            ApiError::http(StatusCode::BAD_REQUEST, "Failed to read request body")
                                .into_response();
                        set_request_id(&mut response, &request_id);
                        return Ok(response);
                    }
                }
            } else {
                (body, None)
            };

            let ctx = RequestContext::capture(&parts, captured, request_id.clone());
            let mut req = Request::from_parts(parts, body);
            req.extensions_mut().insert(Arc::new(ctx));

            let mut response = inner.call(req).await?;
            set_request_id(&mut response, &request_id);
            Ok(response)
        })
    }
}

/// True when the request advertises a JSON body small enough to buffer.
fn json_body_within(headers: &http::HeaderMap, limit: usize) -> bool {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    let length = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok());

    is_json && length.is_some_and(|len| len > 0 && len <= limit)
}

fn set_request_id(response: &mut Response, request_id: &RequestId) {
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
}
