use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use std::time::Instant;
use tracing::{Instrument, Level, debug, info, info_span};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Request bodies at most this large are logged at debug level when they
/// are JSON. They can carry emails and chat text.
const MAX_LOGGED_BODY_BYTES: usize = 1024;

/// Per-request span, `x-trace-id` propagation and latency logging.
///
/// Response bodies are passed through untouched so streamed responses are
/// never buffered.
pub async fn trace_middleware(req: Request, next: Next) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!("→ request started");
        let header_value = HeaderValue::from_str(&trace_id.to_string()).ok();

        let mut req = if tracing::enabled!(Level::DEBUG) && is_small_json(req.headers()) {
            let (parts, body) = req.into_parts();
            let bytes = buffer_and_log(body).await;
            Request::from_parts(parts, Body::from(bytes))
        } else {
            req
        };
        if let Some(v) = &header_value {
            req.headers_mut().insert(X_TRACE_ID, v.clone());
        }

        let mut response = next.run(req).await;
        if let Some(v) = header_value {
            response.headers_mut().insert(X_TRACE_ID, v);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response finished"
        );
        response
    }
    .instrument(span)
    .await
}

fn is_small_json(headers: &HeaderMap) -> bool {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    let small = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len <= MAX_LOGGED_BODY_BYTES);
    is_json && small
}

async fn buffer_and_log(body: Body) -> Bytes {
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return Bytes::new(),
    };
    if let Ok(text) = std::str::from_utf8(&bytes) {
        debug!(body = %text, "request body");
    }
    bytes
}
