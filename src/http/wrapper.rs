//! Per-request handler wrapper.
//!
//! # Data Flow
//! ```text
//! axum request
//!     → buffer body, read path params → RequestContext
//!     → record request (JSON bodies under 1 MiB are logged)
//!     → login checker (routes that need login)
//!     → handler → record response
//!     → file download | raw body | JSON envelope
//!     → `trace-Id` response header
//! ```
//!
//! # Design Decisions
//! - Everything runs inside the context span, so every log line carries `trace_id`
//! - A panicking handler is caught and answered with HTTP 500; the server keeps running
//! - Handler failures are business errors: HTTP 200 with the error in the envelope

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequestParts, RawPathParams, Request};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::FutureExt;
use serde_json::Value;
use tracing::Instrument;

use crate::context::{Context, Contexts, RequestContext, ResponseState};
use crate::decode::{self, DecodeError, MIME_JSON};
use crate::errors::ApiError;
use crate::http::envelope::{Envelope, EnvelopeStyle};
use crate::http::route::{ContentType, Handler};
use crate::http::TRACE_ID;
use crate::observability::log;

/// Request bodies at or above this size are not logged.
const RECORD_BODY_LIMIT: usize = 1024 * 1024;

/// A route resolved for serving.
pub(crate) struct Endpoint {
    pub(crate) method: Method,
    pub(crate) route_path: String,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) need_login: bool,
    /// Present only when the route needs login.
    pub(crate) login_checker: Option<Arc<dyn Handler>>,
    pub(crate) produces: ContentType,
    pub(crate) envelope: EnvelopeStyle,
    pub(crate) body_limit: usize,
}

pub(crate) async fn dispatch(endpoint: Arc<Endpoint>, request: Request) -> Response {
    let (mut parts, body) = request.into_parts();
    let path_params = path_params(&mut parts).await;

    // 1. Buffer the body; a failure is reported once the context exists
    let (body, body_error) = match axum::body::to_bytes(body, endpoint.body_limit).await {
        Ok(bytes) => (bytes, None),
        Err(e) => (Bytes::new(), Some(e)),
    };
    let ctx = RequestContext::new(parts.into(), body, endpoint.route_path.clone(), path_params);
    let span = ctx.span();

    async move {
        let mut response = match body_error {
            Some(e) => {
                tracing::warn!(error = %e, limit = endpoint.body_limit, "Failed to read request body");
                let err = DecodeError::Body(e.to_string()).into_api_error();
                Envelope::fail(endpoint.envelope, err.code(), err.message(), Value::Null).into_response()
            }
            None => {
                record_request(&ctx);
                match AssertUnwindSafe(run(&endpoint, &ctx)).catch_unwind().await {
                    Ok(result) => render(&endpoint, ctx.take_response(), result),
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        tracing::error!(panic = %message, "Handler panicked");
                        (StatusCode::INTERNAL_SERVER_ERROR, Json(Value::String(message))).into_response()
                    }
                }
            }
        };

        // 2. Echo the request id
        if let Ok(value) = HeaderValue::from_str(ctx.request_id()) {
            response.headers_mut().insert(TRACE_ID, value);
        }
        response
    }
    .instrument(span)
    .await
}

async fn path_params(parts: &mut Parts) -> HashMap<String, String> {
    match RawPathParams::from_request_parts(parts, &()).await {
        Ok(params) => params
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        Err(e) => {
            tracing::debug!(error = %e, "No usable path parameters");
            HashMap::new()
        }
    }
}

async fn run(endpoint: &Endpoint, ctx: &RequestContext) -> Result<(), ApiError> {
    // 3. Login
    if let Some(checker) = &endpoint.login_checker {
        checker.call(ctx.clone()).await?;
    }

    // 4. Handler
    let result = endpoint.handler.call(ctx.clone()).await;
    record_response(ctx, &result);
    result
}

fn render(endpoint: &Endpoint, state: ResponseState, result: Result<(), ApiError>) -> Response {
    let ResponseState {
        data,
        extra,
        file,
        raw,
        headers,
    } = state;

    let mut response = match result {
        Err(err) => Envelope::fail(endpoint.envelope, err.code(), err.message(), data).into_response(),
        Ok(()) => match (file, raw) {
            (Some(file), _) => {
                let disposition = format!("attachment; filename={}", file.file_name);
                let mut response = Response::new(Body::from(file.content.clone()));
                let headers = response.headers_mut();
                if let Ok(value) = HeaderValue::from_str(&disposition) {
                    headers.insert(CONTENT_DISPOSITION, value);
                }
                headers.insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static(ContentType::OCTET_STREAM.as_str()),
                );
                headers.insert(CONTENT_LENGTH, HeaderValue::from(file.content.len()));
                response
            }
            (None, Some(raw)) => {
                let content_type = if raw.content_type.is_empty() {
                    endpoint.produces.as_str().to_string()
                } else {
                    raw.content_type
                };
                let mut response = Response::new(Body::from(raw.body.clone()));
                let headers = response.headers_mut();
                if let Ok(value) = HeaderValue::from_str(&content_type) {
                    headers.insert(CONTENT_TYPE, value);
                }
                headers.insert(CONTENT_LENGTH, HeaderValue::from(raw.body.len()));
                response
            }
            (None, None) => Envelope::ok(endpoint.envelope, data).extra(extra).into_response(),
        },
    };

    // Headers added by the handler
    let mut name = None;
    for (key, value) in headers {
        if key.is_some() {
            name = key;
        }
        if let Some(name) = &name {
            response.headers_mut().append(name.clone(), value);
        }
    }
    response
}

fn record_request(ctx: &RequestContext) {
    let head = ctx.request();
    let parent = ctx.parent_request_id().unwrap_or("");
    let body = ctx.http_body();
    let media_type = decode::media_type(&head.headers);

    if body.len() >= RECORD_BODY_LIMIT {
        tracing::info!(
            method = %head.method,
            uri = %head.uri,
            parent_request_id = %parent,
            "Request record: body larger than 1MB"
        );
    } else if media_type == MIME_JSON {
        let text = log::strip_newlines(&String::from_utf8_lossy(&body));
        tracing::info!(
            method = %head.method,
            uri = %head.uri,
            parent_request_id = %parent,
            body = %text,
            "Request record"
        );
    } else {
        tracing::info!(
            method = %head.method,
            uri = %head.uri,
            parent_request_id = %parent,
            content_type = %media_type,
            "Request record: body not logged for this content type"
        );
    }
}

fn record_response(ctx: &RequestContext, result: &Result<(), ApiError>) {
    match result {
        Err(err) => tracing::error!(
            code = err.code(),
            message = %err.message(),
            raw_error = %err.raw_error_string(),
            caller = ?err.caller(),
            "Response record"
        ),
        Ok(()) => tracing::info!(data = %crate::observability::log::json(&ctx.data()), "Response record"),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
