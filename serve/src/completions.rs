//! `POST /v1/chat/completions`: parse, dispatch to the gateway, map the
//! reply onto HTTP.
//!
//! Streaming replies become a `text/event-stream` body fed from the
//! gateway's SSE line channel; buffered replies are plain JSON. Context
//! headers are set whenever compaction dropped or summarized messages.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tracing::warn;

use trellis::{ChatCompletionRequest, ContextStats, GatewayReply};

use super::app::AppState;

pub(crate) async fn chat_completions(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Response {
    let request: ChatCompletionRequest = match serde_json::from_value(body) {
        Ok(req) => req,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                &format!("request body does not match the chat.completions shape: {e}"),
            );
        }
    };

    match state.gateway.handle(request).await {
        Ok(GatewayReply::Buffered { completion, stats }) => {
            let mut response = Json(completion).into_response();
            apply_context_headers(&mut response, &stats);
            response
        }
        Ok(GatewayReply::Streaming { lines, stats }) => {
            let body = Body::from_stream(lines.map(|line| Ok::<_, std::convert::Infallible>(Bytes::from(line))));
            let mut response = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/event-stream")
                .header(header::CACHE_CONTROL, "no-cache")
                .body(body)
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
            apply_context_headers(&mut response, &stats);
            response
        }
        Err(err) => {
            warn!(kind = err.kind(), error = %err, "request failed");
            let status = if err.is_fatal() {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            error_response(status, err.kind(), &err.to_string())
        }
    }
}

fn error_response(status: StatusCode, kind: &str, message: &str) -> Response {
    let body = json!({
        "error": { "message": message, "type": kind }
    });
    (status, Json(body)).into_response()
}

fn apply_context_headers(response: &mut Response, stats: &ContextStats) {
    if stats.dropped_messages == 0 && !stats.summary_added {
        return;
    }
    let headers = response.headers_mut();
    let mut set = |name: &'static str, value: String| {
        if let Ok(v) = HeaderValue::from_str(&value) {
            headers.insert(name, v);
        }
    };
    set("x-proxy-context-used", stats.used_tokens.to_string());
    set("x-proxy-context-total", stats.total_tokens.to_string());
    set("x-proxy-context-dropped", stats.dropped_messages.to_string());
    set("x-proxy-context-summary", stats.summary_added.to_string());
}
