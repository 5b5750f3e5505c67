//! Response enveloping and error normalization middleware.
//!
//! Wraps successful JSON responses in the canonical success envelope and
//! rebuilds raised [`ApiError`]s into error envelopes with full request
//! context. Non-JSON responses pass through untouched.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{to_bytes, Body, HttpBody};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderValue, Request};
use serde_json::Value;
use tower::{Layer, Service};

use crate::config::Environment;
use crate::context::RequestContext;
use crate::error::ApiError;
use crate::logger::ExitOutcome;
use crate::normalizer::ExceptionNormalizer;
use crate::response::ResponseEnveloper;

/// Upper bound on buffered response bodies. Larger or unsized (streaming)
/// JSON bodies pass through unwrapped.
const MAX_BUFFERED_RESPONSE_BYTES: usize = 2 * 1024 * 1024;

/// Tower layer applying the enveloper and the exception normalizer.
#[derive(Debug, Clone)]
pub struct EnvelopeLayer {
    normalizer: Arc<ExceptionNormalizer>,
    enveloper: ResponseEnveloper,
}

impl EnvelopeLayer {
    pub fn new(mode: Environment) -> Self {
        Self {
            normalizer: Arc::new(ExceptionNormalizer::new(mode)),
            enveloper: ResponseEnveloper::new(),
        }
    }
}

impl<S> Layer<S> for EnvelopeLayer {
    type Service = EnvelopeMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        EnvelopeMiddleware {
            inner,
            normalizer: Arc::clone(&self.normalizer),
            enveloper: self.enveloper,
        }
    }
}

/// Enveloping middleware service.
#[derive(Debug, Clone)]
pub struct EnvelopeMiddleware<S> {
    inner: S,
    normalizer: Arc<ExceptionNormalizer>,
    enveloper: ResponseEnveloper,
}

impl<S> Service<Request<Body>> for EnvelopeMiddleware<S>
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
        let normalizer = Arc::clone(&self.normalizer);
        let enveloper = self.enveloper;
        let ctx = req.extensions().get::<Arc<RequestContext>>().cloned();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(req).await?;
            let Some(ctx) = ctx else {
                return Ok(response);
            };

            // Error path: a raised ApiError travels in response
            // extensions; rebuild its body with full request context.
            if let Some(error) = response.extensions().get::<Arc<ApiError>>().cloned() {
                let (classification, envelope) = normalizer.normalize(&error, &ctx);
                normalizer.report(&error, &classification, &ctx);

                let mut rebuilt = (classification.status, Json(envelope)).into_response();
                rebuilt.extensions_mut().insert(ExitOutcome::Failure {
                    status: classification.status,
                    message: classification.message,
                });
                return Ok(rebuilt);
            }

            // Success path: wrap 2xx JSON bodies with a known size.
            if !response.status().is_success() || !is_json(response.headers()) {
                return Ok(response);
            }

            let status = response.status();
            let (mut parts, body) = response.into_parts();

            let sized = HttpBody::size_hint(&body)
                .exact()
                .is_some_and(|n| n as usize <= MAX_BUFFERED_RESPONSE_BYTES);
            if !sized {
                return Ok(Response::from_parts(parts, body));
            }

            let bytes = match to_bytes(body, MAX_BUFFERED_RESPONSE_BYTES).await {
                Ok(bytes) => bytes,
                // The body already failed mid-stream; nothing left to
                // forward.
                Err(_) => return Ok(Response::from_parts(parts, Body::empty())),
            };

            let Ok(payload) = serde_json::from_slice::<Value>(&bytes) else {
                // Declared JSON but does not parse; forward verbatim.
                return Ok(Response::from_parts(parts, Body::from(bytes)));
            };

            let envelope = enveloper.envelope(payload, &ctx, status);
            let enveloped = match serde_json::to_vec(&envelope) {
                Ok(buf) => buf,
                Err(_) => return Ok(Response::from_parts(parts, Body::from(bytes))),
            };

            let size = enveloped.len();
            parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
            let mut rebuilt = Response::from_parts(parts, Body::from(enveloped));
            rebuilt.extensions_mut().insert(ExitOutcome::Success {
                status,
                bytes: Some(size),
            });
            Ok(rebuilt)
        })
    }
}

fn is_json(headers: &http::HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::middleware::ContextLayer;
    use axum::routing::get;
    use axum::Router;
    use http::StatusCode;
    use serde_json::json;
    use tower::{ServiceBuilder, ServiceExt};

    async fn conflict() -> Result<Json<Value>, ApiError> {
        Err(StorageError::unique(["email"]).into())
    }

    fn app(mode: Environment) -> Router {
        Router::new()
            .route("/items", get(|| async { Json(json!([1, 2, 3])) }))
            .route("/plain", get(|| async { "just text" }))
            .route("/conflict", get(conflict))
            .route(
                "/wrapped",
                get(|| async {
                    Json(json!({
                        "data": ["a"],
                        "meta": {"page": 1, "limit": 1, "total": 9, "totalPages": 9}
                    }))
                }),
            )
            .layer(
                ServiceBuilder::new()
                    .layer(ContextLayer::new(mode, 16 * 1024))
                    .layer(EnvelopeLayer::new(mode)),
            )
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn success_json_is_enveloped_with_meta() {
        let response = app(Environment::Production)
            .oneshot(get_request("/items?page=2&limit=5"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["statusCode"], json!(200));
        assert_eq!(body["path"], json!("/items?page=2&limit=5"));
        assert_eq!(body["method"], json!("GET"));
        assert_eq!(body["data"], json!([1, 2, 3]));
        assert_eq!(
            body["meta"],
            json!({"page": 2, "limit": 5, "total": 3, "totalPages": 1})
        );
    }

    #[tokio::test]
    async fn wrapped_payload_meta_passes_through() {
        let response = app(Environment::Production)
            .oneshot(get_request("/wrapped"))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"], json!(["a"]));
        assert_eq!(body["meta"]["total"], json!(9));
    }

    #[tokio::test]
    async fn raised_error_becomes_error_envelope() {
        let response = app(Environment::Production)
            .oneshot(get_request("/conflict"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["statusCode"], json!(400));
        assert_eq!(body["path"], json!("/conflict"));
        assert_eq!(
            body["message"],
            json!("A record with this value already exists")
        );
        assert_eq!(body["errors"], json!({"field": ["email"]}));
        assert!(body.get("data").is_none());
        assert!(body.get("stack").is_none());
    }

    #[tokio::test]
    async fn error_envelope_carries_stack_outside_production() {
        let response = app(Environment::Development)
            .oneshot(get_request("/conflict"))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert!(body.get("stack").is_some());
    }

    #[tokio::test]
    async fn non_json_responses_pass_through() {
        let response = app(Environment::Production)
            .oneshot(get_request("/plain"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(bytes.as_ref(), b"just text");
    }
}
