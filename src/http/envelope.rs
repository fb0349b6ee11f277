//! JSON response envelope.
//!
//! Every JSON reply has the same outer shape:
//!
//! ```text
//! {"retcode": 0, "message": "", "data": ...}     EnvelopeStyle::Retcode
//! {"code": 0, "message": "", "data": ...}        EnvelopeStyle::Code
//! ```
//!
//! Business failures are reported inside the envelope with HTTP 200;
//! only a panic in a handler produces a 5xx.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ApiError;

/// Name of the status field in the envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStyle {
    #[default]
    Retcode,
    Code,
}

impl EnvelopeStyle {
    pub fn code_key(self) -> &'static str {
        match self {
            EnvelopeStyle::Retcode => "retcode",
            EnvelopeStyle::Code => "code",
        }
    }
}

/// Envelope builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    style: EnvelopeStyle,
    code: i32,
    message: String,
    data: Value,
    extra: Map<String, Value>,
}

impl Envelope {
    /// Success envelope, code 0 and an empty message.
    pub fn ok(style: EnvelopeStyle, data: Value) -> Self {
        Self {
            style,
            code: 0,
            message: String::new(),
            data,
            extra: Map::new(),
        }
    }

    pub fn fail(style: EnvelopeStyle, code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            style,
            code,
            message: message.into(),
            data,
            extra: Map::new(),
        }
    }

    /// Extra top-level fields. The envelope's own keys take precedence.
    pub fn extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    pub fn to_value(&self) -> Value {
        let mut out = self.extra.clone();
        out.insert(self.style.code_key().to_string(), Value::from(self.code));
        out.insert("message".to_string(), Value::from(self.message.clone()));
        out.insert("data".to_string(), self.data.clone());
        Value::Object(out)
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self.to_value())).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        Envelope::fail(EnvelopeStyle::default(), self.code(), self.message(), Value::Null)
            .into_response()
    }
}
