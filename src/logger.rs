//! Request/response logging with redaction and severity routing.
//!
//! The logger is an explicit handle constructed once and passed into the
//! pipeline; it holds no per-request state. `on_entry`/`on_exit` build
//! [`LogRecord`] value objects, and `emit` writes them through `tracing`
//! best-effort: nothing here can fail the request.

use std::time::Duration;

use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn, Level};

use crate::config::Environment;
use crate::context::RequestContext;
use crate::redact::{redact_body, redact_headers};

/// Outcome of a completed request, as seen at the boundary.
///
/// Carries the status the normalizer resolved, not whatever the raw
/// handler produced.
#[derive(Debug, Clone)]
pub enum ExitOutcome {
    Success {
        status: StatusCode,
        /// Serialized response size, when the enveloper measured it.
        bytes: Option<usize>,
    },
    Failure {
        status: StatusCode,
        message: String,
    },
}

impl ExitOutcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Success { status, .. } | Self::Failure { status, .. } => *status,
        }
    }
}

/// A single structured log record, entry or exit variant.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogRecord {
    #[serde(rename_all = "camelCase")]
    Entry {
        method: String,
        path: String,
        client_ip: Option<String>,
        request_id: String,
        user_agent: Option<String>,
        timestamp: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        headers: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    Exit {
        method: String,
        path: String,
        status: u16,
        duration_ms: u64,
        request_id: String,
        timestamp: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        response_bytes: Option<usize>,
    },
}

impl LogRecord {
    /// Severity for emission. Exit records route by status: 5xx at
    /// error, 4xx at warning, everything else informational.
    pub fn severity(&self) -> Level {
        match self {
            Self::Entry { .. } => Level::INFO,
            Self::Exit { status, .. } if *status >= 500 => Level::ERROR,
            Self::Exit { status, .. } if *status >= 400 => Level::WARN,
            Self::Exit { .. } => Level::INFO,
        }
    }

    fn summary(&self) -> String {
        match self {
            Self::Entry { method, path, .. } => format!("--> {method} {path}"),
            Self::Exit {
                method,
                path,
                status,
                duration_ms,
                ..
            } => format!("<-- {method} {path} {status} ({duration_ms}ms)"),
        }
    }
}

/// Logger handle for the boundary pipeline.
#[derive(Debug, Clone)]
pub struct RequestLogger {
    mode: Environment,
}

impl RequestLogger {
    pub fn new(mode: Environment) -> Self {
        Self { mode }
    }

    /// Build the entry record for a captured context.
    ///
    /// Header and body detail is included only outside production, and
    /// always redacted.
    pub fn on_entry(&self, ctx: &RequestContext) -> LogRecord {
        let verbose = !self.mode.is_production();
        LogRecord::Entry {
            method: ctx.method.to_string(),
            path: ctx.path.clone(),
            client_ip: ctx.client_ip.map(|ip| ip.to_string()),
            request_id: ctx.request_id.to_string(),
            user_agent: ctx.user_agent().map(str::to_string),
            timestamp: ctx.received_at,
            headers: if verbose {
                Some(redact_headers(&ctx.headers))
            } else {
                None
            },
            body: if verbose {
                ctx.body.as_ref().map(redact_body)
            } else {
                None
            },
        }
    }

    /// Build the exit record for a completed request.
    pub fn on_exit(
        &self,
        ctx: &RequestContext,
        outcome: &ExitOutcome,
        elapsed: Duration,
    ) -> LogRecord {
        let (error, response_bytes) = match outcome {
            ExitOutcome::Success { bytes, .. } => {
                let bytes = if self.mode.is_production() {
                    None
                } else {
                    *bytes
                };
                (None, bytes)
            }
            ExitOutcome::Failure { message, .. } => (Some(message.clone()), None),
        };

        LogRecord::Exit {
            method: ctx.method.to_string(),
            path: ctx.path.clone(),
            status: outcome.status().as_u16(),
            duration_ms: elapsed.as_millis() as u64,
            request_id: ctx.request_id.to_string(),
            timestamp: Utc::now(),
            error,
            response_bytes,
        }
    }

    /// Write a record to the log sink.
    ///
    /// Serialization problems degrade to a placeholder string; emission
    /// never propagates an error to the caller.
    pub fn emit(&self, record: &LogRecord) {
        let payload = serde_json::to_string(record)
            .unwrap_or_else(|_| "<unserializable log record>".to_string());
        let summary = record.summary();
        let severity = record.severity();

        if severity == Level::ERROR {
            error!(record = %payload, "{summary}");
        } else if severity == Level::WARN {
            warn!(record = %payload, "{summary}");
        } else {
            info!(record = %payload, "{summary}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestId;
    use http::Request;
    use serde_json::json;

    fn ctx_with_secrets() -> RequestContext {
        let req = Request::builder()
            .uri("/auth/login")
            .method("POST")
            .header("authorization", "Bearer xyz")
            .header("user-agent", "test-agent")
            .body(())
            .unwrap();
        let (parts, ()) = req.into_parts();
        RequestContext::capture(
            &parts,
            Some(json!({"email": "a@b.com", "password": "p1"})),
            RequestId::from("rid-1"),
        )
    }

    #[test]
    fn entry_record_redacts_in_development() {
        let logger = RequestLogger::new(Environment::Development);
        let record = logger.on_entry(&ctx_with_secrets());

        let LogRecord::Entry { headers, body, .. } = record else {
            panic!("expected entry record");
        };
        let headers = headers.expect("headers present in development");
        let body = body.expect("body present in development");
        assert_eq!(headers["authorization"], "[REDACTED]");
        assert_eq!(body["password"], "[REDACTED]");
        assert_eq!(body["email"], "a@b.com");
    }

    #[test]
    fn entry_record_omits_detail_in_production() {
        let logger = RequestLogger::new(Environment::Production);
        let record = logger.on_entry(&ctx_with_secrets());

        let LogRecord::Entry {
            headers,
            body,
            user_agent,
            ..
        } = record
        else {
            panic!("expected entry record");
        };
        assert!(headers.is_none());
        assert!(body.is_none());
        assert_eq!(user_agent.as_deref(), Some("test-agent"));
    }

    #[test]
    fn exit_severity_routes_by_status() {
        let logger = RequestLogger::new(Environment::Production);
        let ctx = ctx_with_secrets();

        let ok = logger.on_exit(
            &ctx,
            &ExitOutcome::Success {
                status: StatusCode::OK,
                bytes: None,
            },
            Duration::from_millis(5),
        );
        assert_eq!(ok.severity(), Level::INFO);

        let client = logger.on_exit(
            &ctx,
            &ExitOutcome::Failure {
                status: StatusCode::NOT_FOUND,
                message: "Record not found".to_string(),
            },
            Duration::from_millis(5),
        );
        assert_eq!(client.severity(), Level::WARN);

        let server = logger.on_exit(
            &ctx,
            &ExitOutcome::Failure {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "boom".to_string(),
            },
            Duration::from_millis(5),
        );
        assert_eq!(server.severity(), Level::ERROR);
    }

    #[test]
    fn exit_record_carries_error_message() {
        let logger = RequestLogger::new(Environment::Production);
        let record = logger.on_exit(
            &ctx_with_secrets(),
            &ExitOutcome::Failure {
                status: StatusCode::BAD_REQUEST,
                message: "Foreign key constraint failed".to_string(),
            },
            Duration::from_millis(12),
        );

        let LogRecord::Exit { status, error, duration_ms, .. } = record else {
            panic!("expected exit record");
        };
        assert_eq!(status, 400);
        assert_eq!(error.as_deref(), Some("Foreign key constraint failed"));
        assert_eq!(duration_ms, 12);
    }

    #[test]
    fn response_size_hint_only_outside_production() {
        let ctx = ctx_with_secrets();
        let outcome = ExitOutcome::Success {
            status: StatusCode::OK,
            bytes: Some(128),
        };

        let dev = RequestLogger::new(Environment::Development)
            .on_exit(&ctx, &outcome, Duration::ZERO);
        let LogRecord::Exit { response_bytes, .. } = dev else {
            panic!("expected exit record");
        };
        assert_eq!(response_bytes, Some(128));

        let prod = RequestLogger::new(Environment::Production)
            .on_exit(&ctx, &outcome, Duration::ZERO);
        let LogRecord::Exit { response_bytes, .. } = prod else {
            panic!("expected exit record");
        };
        assert!(response_bytes.is_none());
    }
}
