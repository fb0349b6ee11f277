use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart};
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::context::{
    ids, Context, Contexts, RawResponse, ResponseFile, ResponseState, Scope, UploadedFile,
};
use crate::decode::{self, Decode, MIME_MULTIPART_POST_FORM};
use crate::errors::{code, ApiError};
use crate::http::TRACE_ID;

/// Request line and headers, detached from the body.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

impl From<Parts> for RequestHead {
    fn from(parts: Parts) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
        }
    }
}

#[derive(Debug)]
struct RequestData {
    head: RequestHead,
    body: Bytes,
    parent_request_id: Option<String>,
    route_path: String,
    path_params: HashMap<String, String>,
}

/// Context of one HTTP request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    scope: Scope,
    request: Arc<RequestData>,
    response: Arc<Mutex<ResponseState>>,
}

impl RequestContext {
    /// Context for a request whose body has already been read.
    ///
    /// A fresh request id is always generated; an incoming `trace-Id`
    /// header is kept as the parent id.
    pub fn new(
        head: RequestHead,
        body: Bytes,
        route_path: impl Into<String>,
        path_params: HashMap<String, String>,
    ) -> Self {
        let parent_request_id = head
            .headers
            .get(&TRACE_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self {
            scope: Scope::new(ids::new_request_id()),
            request: Arc::new(RequestData {
                head,
                body,
                parent_request_id,
                route_path: route_path.into(),
                path_params,
            }),
            response: Arc::new(Mutex::new(ResponseState::default())),
        }
    }

    /// `trace-Id` sent by the caller, if any.
    pub fn parent_request_id(&self) -> Option<&str> {
        self.request.parent_request_id.as_deref()
    }

    pub(crate) fn take_response(&self) -> ResponseState {
        std::mem::take(&mut *self.state())
    }

    fn state(&self) -> MutexGuard<'_, ResponseState> {
        self.response.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn read_form_file(&self, name: &str) -> Result<UploadedFile, ApiError> {
        let not_found = || ApiError::from_code(code::FILE_NOT_FOUND, &[&name]);

        if decode::media_type(self.headers()) != MIME_MULTIPART_POST_FORM {
            return Err(not_found());
        }

        let mut request = Request::new(Body::from(self.request.body.clone()));
        if let Some(content_type) = self.headers().get(CONTENT_TYPE) {
            request.headers_mut().insert(CONTENT_TYPE, content_type.clone());
        }
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| not_found().with_source(e.body_text()))?;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| not_found().with_source(e.body_text()))?
        {
            if field.name() != Some(name) {
                continue;
            }
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let content = field
                .bytes()
                .await
                .map_err(|e| not_found().with_source(e.body_text()))?;
            return Ok(UploadedFile {
                field_name: name.to_string(),
                file_name,
                content_type,
                content,
            });
        }
        Err(not_found())
    }
}

impl Context for RequestContext {
    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    fn with_scope(&self, scope: Scope) -> Self {
        Self {
            scope,
            request: Arc::clone(&self.request),
            response: Arc::clone(&self.response),
        }
    }

    fn headers(&self) -> &HeaderMap {
        &self.request.head.headers
    }
}

impl Contexts for RequestContext {
    fn request(&self) -> &RequestHead {
        &self.request.head
    }

    fn decode<T: Decode>(&self) -> Result<T, ApiError> {
        let head = &self.request.head;
        decode::auto_decode(&head.uri, &head.headers, &self.request.body, &self.request.path_params)
            .map_err(decode::DecodeError::into_api_error)
    }

    fn json_decode<T: Decode>(&self) -> Result<T, ApiError> {
        decode::decode_json(&self.request.body).map_err(decode::DecodeError::into_api_error)
    }

    fn form_file(&self, name: &str) -> impl Future<Output = Result<UploadedFile, ApiError>> + Send {
        let this = self.clone();
        let name = name.to_string();
        async move { this.read_form_file(&name).await }
    }

    fn query(&self, name: &str) -> Vec<String> {
        let Some(query) = self.request.head.uri.query() else {
            return Vec::new();
        };
        url::form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .collect()
    }

    fn path_parameter(&self, name: &str) -> Option<&str> {
        self.request.path_params.get(name).map(String::as_str)
    }

    fn path_parameters(&self) -> &HashMap<String, String> {
        &self.request.path_params
    }

    fn selected_route_path(&self) -> &str {
        &self.request.route_path
    }

    fn http_body(&self) -> Bytes {
        self.request.body.clone()
    }

    fn set_data<T: Serialize + ?Sized>(&self, data: &T) -> Result<(), ApiError> {
        let value = serde_json::to_value(data)
            .map_err(|e| ApiError::new(code::INTERNAL, "response data is not serializable").with_source(e))?;
        self.state().data = value;
        Ok(())
    }

    fn data(&self) -> Value {
        self.state().data.clone()
    }

    fn set_extra_response<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), ApiError> {
        let value = serde_json::to_value(value).map_err(|e| {
            ApiError::message_of(code::INTERNAL, format_args!("extra response `{}` is not serializable", key))
                .with_source(e)
        })?;
        self.state().extra.insert(key.to_string(), value);
        Ok(())
    }

    fn extra_response(&self) -> Map<String, Value> {
        self.state().extra.clone()
    }

    fn set_response_file(&self, file_name: &str, content: impl Into<Bytes>) {
        self.state().file = Some(ResponseFile {
            file_name: file_name.to_string(),
            content: content.into(),
        });
    }

    fn response_file(&self) -> Option<ResponseFile> {
        self.state().file.clone()
    }

    fn set_raw_response(&self, content_type: &str, body: impl Into<Bytes>) {
        self.state().raw = Some(RawResponse {
            content_type: content_type.to_string(),
            body: body.into(),
        });
    }

    fn raw_response(&self) -> Option<RawResponse> {
        self.state().raw.clone()
    }

    fn add_response_header(&self, name: &str, value: &str) -> Result<(), ApiError> {
        let invalid = || ApiError::message_of(code::INTERNAL, format_args!("invalid response header `{}`", name));
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid().with_source(e))?;
        let value = HeaderValue::from_str(value).map_err(|e| invalid().with_source(e))?;
        self.state().headers.append(name, value);
        Ok(())
    }
}
