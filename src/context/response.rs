//! What a handler leaves behind for the response writer.

use axum::body::Bytes;
use axum::http::HeaderMap;
use serde_json::{Map, Value};

/// File download set by a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFile {
    pub file_name: String,
    pub content: Bytes,
}

/// Body returned verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// May be empty; the route's declared content type is used then.
    pub content_type: String,
    pub body: Bytes,
}

/// File part read from a `multipart/form-data` request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub content: Bytes,
}

/// Response data accumulated during a request.
///
/// A file download wins over a raw response, which wins over the envelope.
#[derive(Debug, Default)]
pub struct ResponseState {
    pub data: Value,
    pub extra: Map<String, Value>,
    pub file: Option<ResponseFile>,
    pub raw: Option<RawResponse>,
    pub headers: HeaderMap,
}
