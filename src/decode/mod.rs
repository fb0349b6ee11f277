//! Request decoding.
//!
//! # Data Flow
//! ```text
//! query string            (base layer)
//!     → form / JSON body   (overrides by key)
//!     → declared headers   (overrides by key)
//!     → URI path params    (overrides by key)
//!     → serde deserialize into T
//!     → T::set_defaults → validator rules → T::check
//! ```
//!
//! # Design Decisions
//! - Later sources replace a key as a whole; values are never concatenated across sources
//! - Only headers a target declares are merged, so stray headers never shadow fields
//! - JSON `null` counts as absent and does not override an earlier source
//! - First error wins; nothing after a failing step runs

mod de;

use std::collections::{BTreeMap, HashMap};

use axum::http::{header::CONTENT_TYPE, HeaderMap, Uri};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::errors::{code, ApiError};

pub use de::{FieldError, FieldValue};

pub const MIME_JSON: &str = "application/json";
pub const MIME_POST_FORM: &str = "application/x-www-form-urlencoded";
pub const MIME_MULTIPART_POST_FORM: &str = "multipart/form-data";

/// A request target that can be filled from every part of a request.
///
/// Field names follow the target's serde names. Query and form keys bind
/// by that name, as do path parameters; headers bind only through
/// [`header_fields`](Decode::header_fields).
pub trait Decode: DeserializeOwned + Validate {
    /// `(header name, field name)` pairs to merge from request headers.
    fn header_fields() -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Fill in values the request left unset. Runs before validation.
    fn set_defaults(&mut self) {}

    /// Checks that do not fit declarative rules. Runs after validation.
    fn check(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Error returned by the decoders.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid json body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("json body must be an object")]
    NotAnObject,

    #[error("{0}")]
    Field(#[from] FieldError),

    #[error("{0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{0}")]
    Check(ApiError),

    #[error("read request body: {0}")]
    Body(String),
}

impl DecodeError {
    /// Convert into the error a handler returns.
    ///
    /// A failed [`Decode::check`] keeps its own error; everything else is
    /// reported as [`code::JSON_DECODE`].
    #[track_caller]
    pub fn into_api_error(self) -> ApiError {
        match self {
            DecodeError::Check(err) => err,
            other => {
                let err = ApiError::from_code(code::JSON_DECODE, &[&other]);
                err.with_source(other)
            }
        }
    }
}

/// Media type of the request, lowercased and without parameters.
pub fn media_type(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Decode `T` from every source of a request, in precedence order.
pub fn auto_decode<T: Decode>(
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
    path_params: &HashMap<String, String>,
) -> Result<T, DecodeError> {
    let mut fields = Fields::default();

    // 1. Query string
    if let Some(query) = uri.query() {
        fields.merge_pairs(url::form_urlencoded::parse(query.as_bytes()).into_owned());
    }

    // 2. Body
    match media_type(headers).as_str() {
        MIME_POST_FORM => {
            fields.merge_pairs(url::form_urlencoded::parse(body).into_owned());
        }
        MIME_JSON if !body.is_empty() => match serde_json::from_slice::<Value>(body)? {
            Value::Object(object) => fields.merge_json(object),
            _ => return Err(DecodeError::NotAnObject),
        },
        _ => {}
    }

    // 3. Declared headers
    for (header, field) in T::header_fields() {
        let values: Vec<String> = headers
            .get_all(*header)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        if !values.is_empty() {
            fields.insert(field, FieldValue::Text(values));
        }
    }

    // 4. Path parameters
    for (name, value) in path_params {
        fields.insert(name, FieldValue::Text(vec![value.clone()]));
    }

    let target = T::deserialize(de::FieldsDeserializer(fields.0))?;
    finish(target)
}

/// Decode `T` from a JSON body only. An empty body decodes as `{}`.
pub fn decode_json<T: Decode>(body: &[u8]) -> Result<T, DecodeError> {
    let body: &[u8] = if body.is_empty() { b"{}" } else { body };
    let target: T = serde_json::from_slice(body)?;
    finish(target)
}

fn finish<T: Decode>(mut target: T) -> Result<T, DecodeError> {
    target.set_defaults();
    target.validate()?;
    target.check().map_err(DecodeError::Check)?;
    Ok(target)
}

/// Merged fields, keyed by target field name.
#[derive(Debug, Default)]
struct Fields(BTreeMap<String, FieldValue>);

impl Fields {
    fn insert(&mut self, key: &str, value: FieldValue) {
        self.0.insert(key.to_string(), value);
    }

    /// Merge one text source. Repeated keys within the source collect every value.
    fn merge_pairs(&mut self, pairs: impl Iterator<Item = (String, String)>) {
        let mut layer: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in pairs {
            layer.entry(key).or_default().push(value);
        }
        for (key, values) in layer {
            self.0.insert(key, FieldValue::Text(values));
        }
    }

    fn merge_json(&mut self, object: serde_json::Map<String, Value>) {
        for (key, value) in object {
            if value.is_null() {
                continue;
            }
            self.0.insert(key, FieldValue::Json(value));
        }
    }
}
