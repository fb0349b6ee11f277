//! Request contexts.
//!
//! # Data Flow
//! ```text
//! axum request
//!     → http::wrapper buffers the body, resolves the route
//!     → RequestContext (request id, span, cancellation, response state)
//!     → handler reads input (decode, query, path params, files)
//!     → handler sets output (data, extra fields, file, raw body, headers)
//!     → http::wrapper renders the response from ResponseState
//! ```
//!
//! # Design Decisions
//! - [`Context`] is what every context can do, with or without a request;
//!   [`Contexts`] adds the request-bound part
//! - Contexts are cheap to clone; clones share the response state
//! - Derived contexts (`sub_context`, `with_span*`, `with_timeout_ctx`) get a
//!   child cancellation token, so cancelling them never cancels the parent
//! - Logging goes through [`Context::span`], which carries `trace_id` and `span_id`

mod background;
pub mod ids;
mod request;
mod response;
mod scope;

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::decode::Decode;
use crate::errors::{code, ApiError, ErrorFactory};

pub use background::BackgroundContext;
pub use request::{RequestContext, RequestHead};
pub use response::{RawResponse, ResponseFile, ResponseState, UploadedFile};
pub use scope::Scope;

/// Operations available on every context.
pub trait Context: Clone + Send + Sync + 'static {
    #[doc(hidden)]
    fn scope(&self) -> &Scope;

    #[doc(hidden)]
    fn scope_mut(&mut self) -> &mut Scope;

    /// Same context with a different scope.
    #[doc(hidden)]
    fn with_scope(&self, scope: Scope) -> Self;

    /// Request headers; empty outside a request.
    fn headers(&self) -> &HeaderMap;

    fn request_id(&self) -> &str {
        &self.scope().request_id
    }

    fn span_id(&self) -> &str {
        &self.scope().span_id
    }

    /// Cookies sent with the request, in header order.
    fn cookies(&self) -> Vec<(String, String)> {
        self.headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                Some((name.to_string(), value.trim_matches('"').to_string()))
            })
            .collect()
    }

    /// Span carrying this context's ids. Log inside it with
    /// `ctx.span().in_scope(|| tracing::info!(...))` or `.instrument(ctx.span())`.
    fn span(&self) -> tracing::Span {
        tracing::info_span!("ctx", trace_id = %self.request_id(), span_id = %self.span_id())
    }

    fn errors(&self) -> ErrorFactory {
        ErrorFactory
    }

    /// True once cancelled or past the deadline.
    fn is_done(&self) -> bool {
        self.scope().is_done()
    }

    fn cancel(&self) {
        self.scope().token.cancel();
    }

    /// Resolves when the context is cancelled or its deadline passes.
    fn cancelled(&self) -> impl Future<Output = ()> + Send + '_ {
        self.scope().done()
    }

    /// Bound this context by `timeout` in place.
    fn with_timeout(&mut self, timeout: Duration) {
        self.scope_mut().shorten_deadline(timeout);
    }

    /// Derived context bounded by `timeout`; this one is unaffected.
    fn with_timeout_ctx(&self, timeout: Duration) -> Self {
        let mut scope = self.scope().derive();
        scope.shorten_deadline(timeout);
        self.with_scope(scope)
    }

    /// Derived context whose request id is `<request id>:<suffix>`.
    fn sub_context(&self, suffix: &str) -> Self {
        self.with_scope(self.scope().sub(suffix))
    }

    /// Derived context with a fresh span id.
    fn with_span(&self) -> Self {
        self.with_scope(self.scope().with_span_id(ids::new_request_id()))
    }

    /// Derived context with span id `<prefix>-<fresh id>`.
    fn with_span_prefix(&self, prefix: &str) -> Self {
        let id = format!("{}-{}", prefix, ids::new_request_id());
        self.with_scope(self.scope().with_span_id(id))
    }

    fn with_span_id(&self, id: &str) -> Self {
        self.with_scope(self.scope().with_span_id(id.to_string()))
    }

    /// Store a value, keyed by its type.
    fn with_value<T: Any + Send + Sync>(&mut self, value: T) {
        self.scope_mut().insert(value);
    }

    fn value<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.scope().get::<T>()
    }

    /// Convert `src` into `D` through their serde representations.
    ///
    /// Fields are matched by serialized name. A failure is logged and
    /// reported as [`code::MAPPER_ACTION`].
    fn mapper<S, D>(&self, action: &str, src: &S) -> Result<D, ApiError>
    where
        S: Serialize + ?Sized,
        D: DeserializeOwned,
    {
        let converted = serde_json::to_value(src).and_then(serde_json::from_value);
        converted.map_err(|e| {
            self.span().in_scope(|| {
                tracing::error!(action = %action, src = %crate::observability::log::json(src), error = %e, "Mapper failed");
            });
            let err = ApiError::from_code(code::MAPPER_ACTION, &[&action, &e]);
            err.with_source(e)
        })
    }
}

/// Operations bound to an HTTP request.
pub trait Contexts: Context {
    fn request(&self) -> &RequestHead;

    /// Decode from query, body, declared headers and path parameters.
    fn decode<T: Decode>(&self) -> Result<T, ApiError>;

    /// Decode from the JSON body only.
    fn json_decode<T: Decode>(&self) -> Result<T, ApiError>;

    /// File part `name` of a `multipart/form-data` body.
    fn form_file(&self, name: &str) -> impl Future<Output = Result<UploadedFile, ApiError>> + Send;

    /// Every value of query parameter `name`.
    fn query(&self, name: &str) -> Vec<String>;

    fn path_parameter(&self, name: &str) -> Option<&str>;

    fn path_parameters(&self) -> &std::collections::HashMap<String, String>;

    /// Route pattern that matched, including the root prefix.
    fn selected_route_path(&self) -> &str;

    fn http_body(&self) -> Bytes;

    /// Set the `data` field of the success envelope.
    fn set_data<T: Serialize + ?Sized>(&self, data: &T) -> Result<(), ApiError>;

    fn data(&self) -> Value;

    /// Extra top-level field of the success envelope.
    fn set_extra_response<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), ApiError>;

    /// Shorthand for the `page` extra field.
    fn set_page_response<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), ApiError> {
        self.set_extra_response("page", value)
    }

    fn extra_response(&self) -> Map<String, Value>;

    /// Reply with a file download instead of the envelope.
    fn set_response_file(&self, file_name: &str, content: impl Into<Bytes>);

    fn response_file(&self) -> Option<ResponseFile>;

    /// Reply with `body` as is instead of the envelope.
    fn set_raw_response(&self, content_type: &str, body: impl Into<Bytes>);

    fn raw_response(&self) -> Option<RawResponse>;

    /// Append a header to the response.
    fn add_response_header(&self, name: &str, value: &str) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_sub_context_ids() {
        let ctx = BackgroundContext::with_request_id("svc:root");
        let sub = ctx.sub_context("job");
        assert_eq!(sub.request_id(), "svc:root:job");
        assert_eq!(ctx.request_id(), "svc:root");
        assert_eq!(sub.sub_context("a").request_id(), "svc:root:job:a");
    }

    #[test]
    fn test_span_ids() {
        let ctx = BackgroundContext::new();
        assert_eq!(ctx.span_id(), "");

        let span = ctx.with_span();
        assert!(span.span_id().starts_with("svc:"));
        assert_eq!(span.request_id(), ctx.request_id());

        let prefixed = ctx.with_span_prefix("cron");
        assert!(prefixed.span_id().starts_with("cron-svc:"));

        assert_eq!(ctx.with_span_id("fixed").span_id(), "fixed");
    }

    #[test]
    fn test_cancel_does_not_reach_parent() {
        let ctx = BackgroundContext::new();
        let child = ctx.with_timeout_ctx(Duration::from_secs(60));
        child.cancel();
        assert!(child.is_done());
        assert!(!ctx.is_done());

        let child = ctx.sub_context("x");
        ctx.cancel();
        assert!(child.is_done());
    }

    #[tokio::test]
    async fn test_with_timeout_in_place() {
        let mut ctx = BackgroundContext::new();
        ctx.with_timeout(Duration::from_millis(20));
        assert!(!ctx.is_done());
        ctx.cancelled().await;
        assert!(ctx.is_done());
    }

    #[test]
    fn test_values() {
        #[derive(Debug, PartialEq)]
        struct Tenant(&'static str);

        let mut ctx = BackgroundContext::new();
        ctx.with_value(Tenant("acme"));
        let sub = ctx.sub_context("s");
        assert_eq!(*sub.value::<Tenant>().unwrap(), Tenant("acme"));
        assert!(ctx.value::<u8>().is_none());
    }

    #[derive(Serialize)]
    struct Row {
        id: u64,
        name: String,
        internal: bool,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct View {
        id: u64,
        name: String,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Strict {
        id: String,
    }

    #[test]
    fn test_mapper() {
        let ctx = BackgroundContext::new();
        let row = Row {
            id: 7,
            name: "a".into(),
            internal: true,
        };

        let view: View = ctx.mapper("row to view", &row).unwrap();
        assert_eq!(view, View { id: 7, name: "a".into() });

        let err = ctx.mapper::<_, Strict>("row to strict", &row).unwrap_err();
        assert_eq!(err.code(), code::MAPPER_ACTION);
        assert!(err.message().starts_with("mapper error. action: row to strict, err: "));
    }
}
