//! Correlation headers for portal API requests.
//!
//! `ApiClient::dispatch` stamps every round trip with its own `x-request-id`, so a
//! request, the refresh it triggers and its replay can be told apart in backend
//! logs. When an OpenTelemetry span is active the W3C `traceparent` and
//! `tracestate` headers of that span go along (https://www.w3.org/TR/trace-context/).

use opentelemetry::trace::{SpanContext, TraceContextExt};
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{Span, debug};
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const TRACEPARENT_HEADER: &str = "traceparent";
pub const TRACESTATE_HEADER: &str = "tracestate";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Stamp `headers` with `request_id` and the current span's trace context.
pub fn inject_trace_headers(headers: &mut HeaderMap, request_id: &str) {
    let context = Span::current().context();
    insert_span_context(headers, context.span().span_context());
    insert(headers, REQUEST_ID_HEADER, request_id);
}

fn insert_span_context(headers: &mut HeaderMap, span_context: &SpanContext) {
    if !span_context.is_valid() {
        return;
    }

    insert(headers, TRACEPARENT_HEADER, &traceparent(span_context));

    let tracestate = span_context.trace_state().header();
    if !tracestate.is_empty() {
        insert(headers, TRACESTATE_HEADER, &tracestate);
    }
}

/// `version-trace_id-span_id-flags`, always version 00.
fn traceparent(span_context: &SpanContext) -> String {
    format!(
        "00-{}-{}-{:02x}",
        span_context.trace_id(),
        span_context.span_id(),
        span_context.trace_flags().to_u8()
    )
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => debug!(header = name, "Skipping unencodable header value"),
    }
}
