//! Per-request context captured at the boundary.
//!
//! A [`RequestContext`] is built once when a request enters the pipeline
//! and stored in request extensions. It is immutable for the request's
//! lifetime and dropped when the request completes; no cross-request
//! state is retained.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use chrono::{DateTime, Utc};
use http::request::Parts;
use http::{HeaderMap, Method};
use serde_json::Value;
use uuid::Uuid;

/// Header name for request ID propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Maximum accepted length for an inbound request ID.
const MAX_REQUEST_ID_LENGTH: usize = 64;

/// Header priority for client IP extraction (highest to lowest).
const IP_HEADERS: &[&str] = &[
    "cf-connecting-ip", // Cloudflare
    "x-real-ip",        // Nginx
    "x-forwarded-for",  // Standard proxy header (first IP in chain)
];

/// Request ID for the current request.
#[derive(Debug, Clone)]
pub struct RequestId(Arc<str>);

impl RequestId {
    /// Generate a new random request ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string().into())
    }

    /// Get as string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable snapshot of an inbound request.
#[derive(Debug)]
pub struct RequestContext {
    pub method: Method,
    /// Path including the query string, as received.
    pub path: String,
    pub client_ip: Option<IpAddr>,
    pub headers: HeaderMap,
    /// Decoded query parameters (last value wins on duplicates).
    pub query: HashMap<String, String>,
    /// Parsed JSON request body; captured only outside production.
    pub body: Option<Value>,
    pub request_id: RequestId,
    pub received_at: DateTime<Utc>,
}

impl RequestContext {
    /// Capture a context from request parts.
    pub fn capture(parts: &Parts, body: Option<Value>, request_id: RequestId) -> Self {
        let path = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_string(), |pq| pq.to_string());
        let query = parts
            .uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        Self {
            method: parts.method.clone(),
            path,
            client_ip: client_ip(&parts.headers, &parts.extensions),
            headers: parts.headers.clone(),
            query,
            body,
            request_id,
            received_at: Utc::now(),
        }
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers
            .get(http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
    }
}

/// Reuse an inbound request ID when present and sane, otherwise generate.
pub(crate) fn extract_or_generate(headers: &HeaderMap) -> RequestId {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= MAX_REQUEST_ID_LENGTH)
        .map(RequestId::from)
        .unwrap_or_else(RequestId::generate)
}

/// Extract the client IP from proxy headers, falling back to the socket
/// peer address set by `into_make_service_with_connect_info`.
fn client_ip(headers: &HeaderMap, extensions: &http::Extensions) -> Option<IpAddr> {
    for header in IP_HEADERS {
        let ip = headers
            .get(*header)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .and_then(|ip_str| ip_str.parse::<IpAddr>().ok());

        if ip.is_some() {
            return ip;
        }
    }

    extensions.get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0.ip())
}
