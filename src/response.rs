//! Canonical response envelopes and pagination metadata.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::RequestContext;

/// Default page number when the `page` parameter is unparseable.
const DEFAULT_PAGE: u64 = 1;

/// Default page size when the `limit` parameter is missing or unparseable.
const DEFAULT_PAGE_LIMIT: u64 = 10;

/// Pagination metadata attached to list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl PaginationMeta {
    pub fn compute(page: u64, limit: u64, total: u64) -> Self {
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit),
        }
    }
}

/// Uniform wrapper around every JSON response body.
///
/// Failure envelopes never carry `data`; success envelopes never carry
/// `errors` or `stack`. The constructors enforce this.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub success: bool,
    pub status_code: u16,
    pub timestamp: DateTime<Utc>,
    pub path: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ResponseEnvelope {
    pub fn success(
        ctx: &RequestContext,
        status: StatusCode,
        data: Value,
        meta: Option<Value>,
    ) -> Self {
        Self {
            success: true,
            status_code: status.as_u16(),
            timestamp: Utc::now(),
            path: ctx.path.clone(),
            method: ctx.method.to_string(),
            data: Some(data),
            message: None,
            errors: None,
            stack: None,
            meta,
        }
    }

    pub fn failure(
        ctx: &RequestContext,
        status: StatusCode,
        message: String,
        errors: Option<Value>,
        stack: Option<String>,
    ) -> Self {
        Self {
            success: false,
            status_code: status.as_u16(),
            timestamp: Utc::now(),
            path: ctx.path.clone(),
            method: ctx.method.to_string(),
            data: None,
            message: Some(message),
            errors,
            stack,
            meta: None,
        }
    }
}

/// Wraps success payloads, inferring pagination metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseEnveloper;

impl ResponseEnveloper {
    pub fn new() -> Self {
        Self
    }

    /// Build the success envelope for a handler payload.
    ///
    /// Payloads already shaped as `{data, meta}` pass their metadata
    /// through verbatim. Bare arrays requested with a `page` query
    /// parameter get computed metadata; `total` there is the length of
    /// the returned slice, not a true row count, so handlers that know
    /// the real total must use the `{data, meta}` shape instead.
    pub fn envelope(
        &self,
        payload: Value,
        ctx: &RequestContext,
        status: StatusCode,
    ) -> ResponseEnvelope {
        match payload {
            Value::Object(mut map) if map.contains_key("data") && map.contains_key("meta") => {
                let meta = map.remove("meta");
                let data = map.remove("data").unwrap_or(Value::Null);
                ResponseEnvelope::success(ctx, status, data, meta)
            }
            Value::Array(items) if ctx.query.contains_key("page") => {
                let meta = infer_meta(&ctx.query, items.len() as u64);
                let meta = serde_json::to_value(meta).ok();
                ResponseEnvelope::success(ctx, status, Value::Array(items), meta)
            }
            other => ResponseEnvelope::success(ctx, status, other, None),
        }
    }
}

fn infer_meta(query: &HashMap<String, String>, total: u64) -> PaginationMeta {
    let page = positive_param(query.get("page"), DEFAULT_PAGE);
    let limit = positive_param(query.get("limit"), DEFAULT_PAGE_LIMIT);
    PaginationMeta::compute(page, limit, total)
}

/// Parse a positive integer parameter, falling back on absent,
/// unparseable, or zero values.
fn positive_param(raw: Option<&String>, default: u64) -> u64 {
    raw.and_then(|s| s.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestId;
    use http::Request;
    use serde_json::json;

    fn ctx(uri: &str) -> RequestContext {
        let req = Request::builder().uri(uri).body(()).unwrap();
        let (parts, ()) = req.into_parts();
        RequestContext::capture(&parts, None, RequestId::generate())
    }

    #[test]
    fn plain_payload_round_trips() {
        let enveloper = ResponseEnveloper::new();
        let payload = json!({"id": 1, "name": "squat"});
        let envelope = enveloper.envelope(payload.clone(), &ctx("/workouts/1"), StatusCode::OK);

        assert!(envelope.success);
        assert_eq!(envelope.status_code, 200);
        assert_eq!(envelope.data, Some(payload));
        assert!(envelope.meta.is_none());
        assert!(envelope.errors.is_none());
    }

    #[test]
    fn data_meta_shape_passes_through_verbatim() {
        let enveloper = ResponseEnveloper::new();
        let payload = json!({
            "data": [1, 2],
            "meta": {"page": 3, "limit": 2, "total": 41, "totalPages": 21}
        });
        let envelope = enveloper.envelope(payload, &ctx("/items"), StatusCode::OK);

        assert_eq!(envelope.data, Some(json!([1, 2])));
        assert_eq!(
            envelope.meta,
            Some(json!({"page": 3, "limit": 2, "total": 41, "totalPages": 21}))
        );
    }

    #[test]
    fn array_with_page_param_gets_computed_meta() {
        let enveloper = ResponseEnveloper::new();
        let items = json!([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
        let envelope = enveloper.envelope(items, &ctx("/items?page=2&limit=5"), StatusCode::OK);

        assert_eq!(
            envelope.meta,
            Some(json!({"page": 2, "limit": 5, "total": 11, "totalPages": 3}))
        );
    }

    #[test]
    fn array_without_page_param_gets_no_meta() {
        let enveloper = ResponseEnveloper::new();
        let envelope = enveloper.envelope(json!([1, 2, 3]), &ctx("/items"), StatusCode::OK);
        assert_eq!(envelope.data, Some(json!([1, 2, 3])));
        assert!(envelope.meta.is_none());
    }

    #[test]
    fn unparseable_params_fall_back_to_defaults() {
        let enveloper = ResponseEnveloper::new();
        let envelope =
            enveloper.envelope(json!([1, 2, 3]), &ctx("/items?page=abc"), StatusCode::OK);
        assert_eq!(
            envelope.meta,
            Some(json!({"page": 1, "limit": 10, "total": 3, "totalPages": 1}))
        );
    }

    #[test]
    fn zero_params_fall_back_to_defaults() {
        let enveloper = ResponseEnveloper::new();
        let envelope = enveloper.envelope(
            json!([1, 2, 3]),
            &ctx("/items?page=0&limit=0"),
            StatusCode::OK,
        );
        assert_eq!(
            envelope.meta,
            Some(json!({"page": 1, "limit": 10, "total": 3, "totalPages": 1}))
        );
    }

    #[test]
    fn envelope_serializes_camel_case() {
        let enveloper = ResponseEnveloper::new();
        let envelope = enveloper.envelope(json!({"a": 1}), &ctx("/x"), StatusCode::CREATED);
        let wire = serde_json::to_value(&envelope).unwrap();

        assert_eq!(wire["success"], json!(true));
        assert_eq!(wire["statusCode"], json!(201));
        assert!(wire.get("timestamp").is_some());
        assert!(wire.get("errors").is_none());
        assert!(wire.get("stack").is_none());
    }

    #[test]
    fn total_pages_rounds_up() {
        let meta = PaginationMeta::compute(1, 5, 11);
        assert_eq!(meta.total_pages, 3);
        let exact = PaginationMeta::compute(1, 5, 10);
        assert_eq!(exact.total_pages, 2);
    }
}
